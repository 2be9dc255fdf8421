//! Suite resolution
//!
//! Execution order from case dependencies, and `${name}` placeholder
//! substitution from the suite's variable table.

mod dependency;
mod variables;

pub use dependency::execution_order;
pub use variables::{plain_text, resolve, resolve_headers, resolve_value};
