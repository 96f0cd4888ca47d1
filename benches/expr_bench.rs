//! Expression evaluator throughput probe
//!
//! Run with: cargo bench --bench expr_bench

use std::time::Instant;
use tabflow::expr::evaluate;
use tabflow::{Record, Value};

fn record() -> Record {
    let mut r = Record::new();
    r.insert("price".to_string(), Value::Number(120.0));
    r.insert("qty".to_string(), Value::Number(3.0));
    r.insert("name".to_string(), Value::String("widget".to_string()));
    r
}

fn bench(label: &str, expression: &str, iterations: u32) {
    let row = record();
    // warmup
    for _ in 0..1_000 {
        let _ = evaluate(expression, &row);
    }
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = evaluate(expression, &row);
    }
    let elapsed = start.elapsed();
    let per_call = elapsed.as_nanos() / iterations as u128;
    println!("{label:<32} {iterations:>8} iters  {per_call:>7} ns/call");
}

fn main() {
    println!("expression evaluator benchmarks\n");
    bench("number literal", "42", 100_000);
    bench("column access", "row.price", 100_000);
    bench("arithmetic chain", "row.price * row.qty - 10", 50_000);
    bench("comparison + ternary", "row.price > 100 ? 'high' : 'low'", 50_000);
    bench("nested parens", "((row.price + 5) * (row.qty - 1)) / 2", 50_000);
    bench("function call", "Math.round(row.price * 1.2)", 50_000);
    bench("string functions", "toUpperCase(row.name)", 50_000);
}
