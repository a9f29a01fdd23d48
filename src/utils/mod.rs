//! Shared utilities: graph infrastructure and Graphviz output helpers.

pub mod dot;
pub mod graph;

pub use dot::escape_dot;
