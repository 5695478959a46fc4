//! Expression DAG to DOT (Graphviz) conversion.
//!
//! The generated DOT output follows these conventions:
//! - **Leaves** (variables and constants) are grouped at the bottom (sink rank)
//! - **Operator nodes** are labelled with the operator and its attributes, e.g. `bit[2]`
//! - **Edges** go from an operator to its operands; operands of non-commutative
//!   operators carry their position as edge label
//! - **Root nodes** are rendered as rectangles at the top (source rank)
//!
//! Shared subexpressions are drawn once.
//!
//! # Examples
//!
//! ```
//! use tseitin_rs::context::Context;
//!
//! let ctx = Context::default();
//! let x = ctx.mk_bool_var("x").unwrap();
//! let y = ctx.mk_bool_var("y").unwrap();
//! let f = ctx.apply_and(&[x, y]).unwrap();
//!
//! let dot = ctx.to_dot(&[f]).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::context::Context;
use crate::node::NodeKind;
use crate::reference::Expr;
use crate::types::ValueDomain;

/// Configuration options for DOT output generation.
///
/// ```
/// use tseitin_rs::context::Context;
/// use tseitin_rs::dot::DotConfig;
///
/// let ctx = Context::default();
/// let x = ctx.mk_bool_var("x").unwrap();
/// let config = DotConfig {
///     show_valtypes: true,
///     ..DotConfig::default()
/// };
/// let dot = ctx.to_dot_with_config(&[x], &config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for operator nodes (default: "ellipse")
    pub op_shape: &'static str,
    /// Shape for variable nodes (default: "box")
    pub variable_shape: &'static str,
    /// Shape for constant nodes (default: "plaintext")
    pub constant_shape: &'static str,
    /// Shape for root nodes (default: "rect")
    pub root_shape: &'static str,
    /// Style for operand edges (default: "solid")
    pub edge_style: &'static str,
    /// Whether to append the valtype to every node label (default: false)
    pub show_valtypes: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            op_shape: "ellipse",
            variable_shape: "box",
            constant_shape: "plaintext",
            root_shape: "rect",
            edge_style: "solid",
            show_valtypes: false,
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Context {
    /// Converts the DAG rooted at `roots` to DOT format.
    pub fn to_dot(&self, roots: &[Expr]) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(roots, &DotConfig::default())
    }

    /// Converts the DAG rooted at `roots` to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, roots: &[Expr], config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape={}];", config.op_shape)?;

        let all_nodes = self.descendants(roots.iter().copied());

        let label = |e: Expr| -> String {
            let node = self.node(e);
            let text = match &node.kind {
                NodeKind::Variable(name) => name.to_string(),
                NodeKind::Constant(value) => node.valtype.display(value),
                NodeKind::Apply { op, .. } => op.to_string(),
            };
            if config.show_valtypes {
                escape(&format!("{} : {}", text, node.valtype))
            } else {
                escape(&text)
            }
        };

        // Leaves
        writeln!(dot, "{{ rank=sink")?;
        for &e in all_nodes.iter() {
            if self.is_variable(e) {
                writeln!(dot, "{} [shape={}, label=\"{}\"];", e.index(), config.variable_shape, label(e))?;
            } else if self.constant(e).is_some() {
                writeln!(dot, "{} [shape={}, label=\"{}\"];", e.index(), config.constant_shape, label(e))?;
            }
        }
        writeln!(dot, "}}")?;

        // Operators and their operand edges
        for &e in all_nodes.iter() {
            let Some(op) = self.op(e) else {
                continue;
            };
            writeln!(dot, "{} [label=\"{}\"];", e.index(), label(e))?;
            for (i, x) in self.operands(e).iter().enumerate() {
                if op.is_commutative() {
                    writeln!(dot, "{} -> {} [style={}];", e.index(), x.index(), config.edge_style)?;
                } else {
                    writeln!(
                        dot,
                        "{} -> {} [style={}, label=\"{}\"];",
                        e.index(),
                        x.index(),
                        config.edge_style,
                        i
                    )?;
                }
            }
        }

        // Roots
        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape={}, label=\"{}\"];", i, config.root_shape, root)?;
        }
        writeln!(dot, "}}")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} -> {};", i, root.index())?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
