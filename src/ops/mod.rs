//! Per-family transform implementations
//!
//! Each function takes the incoming table and the raw params object,
//! validates, and returns a new table. Tables are never mutated in place.

pub mod columns;
pub mod compute;
pub mod dates;
pub mod filter;
pub mod group;
pub mod numeric;
pub mod pivot;
pub mod text;
pub mod window;
