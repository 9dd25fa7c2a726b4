//! Control-structure parser for weft templates.
//!
//! This crate turns template source into a [`Tree`] of [`Node`]s that the
//! `weft` crate renders against a variable context. Control regions are
//! delimited by `{%`/`%}`; comments use `{# ... #}` and are always
//! stripped.
//!
//! # Supported constructs
//!
//! | Construct | Syntax |
//! |-----------|--------|
//! | Print | `{%= expr \| mod(args) ... [prefix P] [suffix S] %}` |
//! | Context | `{% context name = expr [as kind] %}` |
//! | Counter | `{% counter n [= 5] %}`, `{% counter n++ %}` |
//! | Conditional | `{% if l OP r %} ... {% else %} ... {% endif %}` |
//! | Range loop | `{% for [k,]v := range src [separator S] %} ... {% endfor %}` |
//! | Counting loop | `{% for i := 0; i < n; i++ %} ... {% endfor %}` |
//! | Switch | `{% switch [arg] %} {% case ... %} {% default %} {% endswitch %}` |
//! | Loop control | `{% break %}`, `{% continue %}` |
//! | Early exit | `{% exit %}` |
//!
//! Print expressions take an optional output-mode prefix (`j`/`q`/`h`/`u`
//! for JSON-escape, JSON-quote, HTML-escape and URL-encode, `f[.N]`/`F[.N]`
//! for rounding), lowered into the leading modifiers of the chain.
//!
//! # Example
//!
//! ```rust
//! let tree = weft_parser::parse(
//!     "{% for v := range items separator \", \" %}{%= v %}{% endfor %}",
//!     false,
//! ).unwrap();
//! assert_eq!(tree.nodes().len(), 1);
//! ```

mod ast;
mod builder;
mod classify;
mod error;

pub use ast::{CondTest, CounterOp, ModCall, Node, Op, Operand, Step, Tree};
pub use builder::{parse, parse_file};
pub use error::{ParseError, Result};
