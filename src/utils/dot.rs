//! DOT format utilities for graph visualization.
//!
//! This module provides utilities for generating DOT format output,
//! which can be rendered using Graphviz tools.

use std::fmt::Write;

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Quotes, backslashes, newlines, angle and curly brackets are escaped; carriage returns are
/// dropped.
///
/// # Examples
///
/// ```rust
/// use tacopt::utils::escape_dot;
///
/// assert_eq!(escape_dot("say \"hi\""), "say \\\"hi\\\"");
/// assert_eq!(escape_dot("ptr<int>"), "ptr\\<int\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            '<' | '>' | '{' | '}' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Node highlighting used by [`DotGraph::node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStyle {
    /// No fill.
    Plain,
    /// Entry node highlighting.
    Entry,
    /// Exit node highlighting.
    Exit,
}

/// Incremental writer for a `digraph` with boxed, left-aligned multi-line node labels.
#[derive(Debug)]
pub struct DotGraph {
    out: String,
}

impl DotGraph {
    /// Starts a new graph, optionally with a title.
    #[must_use]
    pub fn new(name: &str, title: Option<&str>) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(name));
        if let Some(title) = title {
            let _ = writeln!(out, "    label=\"{}\";", escape_dot(title));
            out.push_str("    labelloc=t;\n");
        }
        out.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        out.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");
        Self { out }
    }

    /// Adds a node whose label is the given lines, left aligned.
    pub fn node<I, S>(&mut self, id: &str, lines: I, style: NodeStyle)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut label = String::new();
        for line in lines {
            label.push_str(&escape_dot(line.as_ref()));
            label.push_str("\\l");
        }
        let fill = match style {
            NodeStyle::Plain => "",
            NodeStyle::Entry => ", style=filled, fillcolor=lightgreen",
            NodeStyle::Exit => ", style=filled, fillcolor=lightcoral",
        };
        let _ = writeln!(
            self.out,
            "    \"{}\" [label=\"{label}\"{fill}];",
            escape_dot(id)
        );
    }

    /// Adds an edge, optionally labelled.
    pub fn edge(&mut self, from: &str, to: &str, label: Option<&str>) {
        let _ = write!(
            self.out,
            "    \"{}\" -> \"{}\"",
            escape_dot(from),
            escape_dot(to)
        );
        if let Some(label) = label {
            let _ = write!(self.out, " [label=\"{}\"]", escape_dot(label));
        }
        self.out.push_str(";\n");
    }

    /// Closes the graph and returns the DOT source.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_basic() {
        assert_eq!(escape_dot("hello"), "hello");
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_escape_dot_brackets() {
        assert_eq!(escape_dot("{a}<b>"), "\\{a\\}\\<b\\>");
    }

    #[test]
    fn test_dot_graph_output() {
        let mut graph = DotGraph::new("cfg", Some("main"));
        graph.node("entry", ["x = const 1;"], NodeStyle::Entry);
        graph.node("exit", ["ret;"], NodeStyle::Exit);
        graph.edge("entry", "exit", Some("T"));
        let dot = graph.finish();

        assert!(dot.starts_with("digraph \"cfg\" {"));
        assert!(dot.contains("label=\"main\";"));
        assert!(dot.contains("\"entry\" [label=\"x = const 1;\\l\", style=filled, fillcolor=lightgreen];"));
        assert!(dot.contains("\"entry\" -> \"exit\" [label=\"T\"];"));
        assert!(dot.ends_with("}\n"));
    }
}
