//! tabflow CLI - run and inspect tabular dataflow pipelines

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use tabflow::{
    Executor, FixSuggestion, NodeKind, Pipeline, PipelineGraph, TabflowError, Table, TableCatalog,
    Value,
};

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "tabflow - pipeline execution core for tabular dataflow graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline file
    Run {
        /// Path to the pipeline .yaml file
        file: String,

        /// Dataset to register, as name=path (.json or .yaml table file);
        /// repeatable
        #[arg(short, long = "data")]
        data: Vec<String>,

        /// Materialize only this node instead of the whole pipeline
        #[arg(short, long)]
        node: Option<String>,

        /// Print result tables as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a pipeline file without executing it
    Validate {
        /// Path to the pipeline .yaml file
        file: String,
    },

    /// Print the pipeline's nodes, edges and evaluation order
    Inspect {
        /// Path to the pipeline .yaml file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { file, data, node, json } => run(&file, &data, node.as_deref(), json).await,
        Commands::Validate { file } => validate(&file).await,
        Commands::Inspect { file } => inspect(&file).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn load_pipeline(file: &str) -> Result<Pipeline, TabflowError> {
    let yaml = tokio::fs::read_to_string(file).await?;
    Ok(serde_yaml::from_str(&yaml)?)
}

/// Parse one `name=path` dataset argument and register its table
async fn register_dataset(catalog: &TableCatalog, arg: &str) -> Result<(), TabflowError> {
    let (name, path) = arg.split_once('=').ok_or_else(|| {
        TabflowError::validation(format!(
            "dataset argument '{arg}' must look like name=path"
        ))
    })?;
    let raw = tokio::fs::read_to_string(path).await?;
    let table: Table = if PathBuf::from(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    {
        serde_json::from_str(&raw)?
    } else {
        serde_yaml::from_str(&raw)?
    };
    catalog.register(name, table);
    Ok(())
}

async fn run(
    file: &str,
    data: &[String],
    node: Option<&str>,
    json: bool,
) -> Result<(), TabflowError> {
    let pipeline = load_pipeline(file).await?;
    let catalog = TableCatalog::new();
    for arg in data {
        register_dataset(&catalog, arg).await?;
    }

    println!(
        "{} Running pipeline '{}' ({} nodes, {} edges)",
        "→".cyan(),
        pipeline.name.cyan().bold(),
        pipeline.nodes.len(),
        pipeline.edges.len()
    );

    let executor = Executor::new(pipeline, Arc::new(catalog));

    if let Some(node_id) = node {
        let table = executor.materialize(node_id).await?;
        print_table(node_id, &table, json)?;
        return Ok(());
    }

    let report = executor.execute_all().await;
    if !report.success {
        return Err(TabflowError::validation(report.message));
    }
    println!("{} {}", "✓".green(), report.message);
    for (node_id, table) in &report.results {
        print_table(node_id, table, json)?;
    }
    Ok(())
}

async fn validate(file: &str) -> Result<(), TabflowError> {
    let pipeline = load_pipeline(file).await?;
    let graph = PipelineGraph::from_pipeline(&pipeline);
    graph.topological_order()?;

    for edge in &pipeline.edges {
        for end in [&edge.source, &edge.target] {
            if pipeline.node(end).is_none() {
                return Err(TabflowError::NodeNotFound {
                    node_id: end.clone(),
                });
            }
        }
    }
    for node in &pipeline.nodes {
        match node.kind {
            NodeKind::Dataset if node.config.source_id.is_none() => {
                return Err(TabflowError::validation(format!(
                    "dataset node '{}' has no source configured",
                    node.id
                )));
            }
            NodeKind::Join if node.config.join.is_none() => {
                return Err(TabflowError::join(format!(
                    "join node '{}' is not configured",
                    node.id
                )));
            }
            _ => {}
        }
    }

    println!("{} Pipeline '{}' is valid", "✓".green(), pipeline.name);
    println!("  Nodes: {}", pipeline.nodes.len());
    println!("  Edges: {}", pipeline.edges.len());
    Ok(())
}

async fn inspect(file: &str) -> Result<(), TabflowError> {
    let pipeline = load_pipeline(file).await?;
    let graph = PipelineGraph::from_pipeline(&pipeline);

    println!("{}", pipeline.name.cyan().bold());
    println!("{}", "Nodes:".cyan());
    for node in &pipeline.nodes {
        let detail = match node.kind {
            NodeKind::Dataset => format!(
                "source={}",
                node.config.source_id.as_deref().unwrap_or("(unset)")
            ),
            NodeKind::Transform => format!("{} transforms", node.config.transforms.len()),
            NodeKind::Join => node
                .config
                .join
                .as_ref()
                .map(|j| format!("{:?}", j.kind).to_lowercase())
                .unwrap_or_else(|| "(unconfigured)".to_string()),
            NodeKind::Output => String::new(),
        };
        println!("  {} [{:?}] {}", node.id.bold(), node.kind, detail);
    }
    println!("{}", "Edges:".cyan());
    for edge in &pipeline.edges {
        let port = edge
            .target_port
            .as_deref()
            .map(|p| format!(" ({p})"))
            .unwrap_or_default();
        println!("  {} → {}{}", edge.source, edge.target, port);
    }
    match graph.topological_order() {
        Ok(order) => println!("{} {}", "Order:".cyan(), order.join(" → ")),
        Err(e) => println!("{} {}", "Order:".cyan(), e.to_string().red()),
    }
    Ok(())
}

fn print_table(node_id: &str, table: &Table, json: bool) -> Result<(), TabflowError> {
    println!("{} {} ({} rows)", "Result:".cyan().bold(), node_id, table.len());
    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
        return Ok(());
    }
    let Some(first) = table.first() else {
        println!("  (empty)");
        return Ok(());
    };

    let columns: Vec<&String> = first.keys().collect();
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in table {
        for (i, column) in columns.iter().enumerate() {
            let cell = row.get(*column).map(Value::to_text).unwrap_or_default();
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect::<Vec<_>>()
        .join("  ");
    println!("  {}", header.bold());
    for row in table {
        let line = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let cell = row.get(*c).map(Value::to_text).unwrap_or_default();
                format!("{:width$}", cell, width = widths[i])
            })
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {line}");
    }
    Ok(())
}
