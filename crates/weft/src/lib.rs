//! Dynamic text templating rendered straight against host values.
//!
//! weft compiles a control-structure syntax embedded in literal text —
//! print expressions with modifier chains, conditionals, range and
//! counting loops, switch/case, context bindings, counters and early
//! exit — into a tree (see [`weft_parser`]), then renders that tree
//! against caller-owned values directly into an output byte stream. No
//! intermediate value model is built at render time: the renderer reads
//! the caller's data in place through the [`Inspect`] trait family.
//!
//! # Example
//!
//! ```rust
//! use weft::{Ctx, Engine};
//!
//! let engine = Engine::new();
//! let tree = weft::parse(
//!     "{% for v := range items separator \", \" %}{%= v %}{% endfor %}",
//!     false,
//! ).unwrap();
//! engine.register_template("list", tree);
//!
//! let items: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
//! let mut ctx = Ctx::new();
//! ctx.set("items", &items);
//!
//! let out = engine.render("list", &mut ctx).unwrap();
//! assert_eq!(out, b"a, b, c");
//! ```
//!
//! Structured data works the same way through the `serde_json::Value`
//! implementation of [`Inspect`]:
//!
//! ```rust
//! use weft::{Ctx, Engine};
//!
//! let engine = Engine::new();
//! let tree = weft::parse(
//!     "{% if user.admin %}{%= user.name %}{% else %}guest{% endif %}",
//!     false,
//! ).unwrap();
//! engine.register_template("who", tree);
//!
//! let user = serde_json::json!({"user": {"name": "alice", "admin": true}});
//! let mut ctx = Ctx::new();
//! ctx.set("user", &user["user"]);
//!
//! assert_eq!(engine.render("who", &mut ctx).unwrap(), b"alice");
//! ```
//!
//! # Concurrency
//!
//! Registered trees are immutable and shared as `Arc`s: any number of
//! threads may render the same template concurrently, each with its own
//! [`Ctx`]. Registries are lock-guarded; registration overwrites.
//!
//! # Process-wide default engine
//!
//! Libraries that want a zero-setup surface can use the free functions,
//! which delegate to a lazily-created shared [`Engine`].

use std::io::Write;

use once_cell::sync::Lazy;

mod cond;
mod context;
mod engine;
mod error;
mod inspect;
mod loops;
mod mods;
mod render;

pub use cond::CondFn;
pub use context::{Bound, Ctx, KindFn};
pub use engine::{Engine, Tpl};
pub use error::{RenderError, Result};
pub use inspect::{resolve_path, Inspect, Map, Scalar, Seq, Val, ValueView};
pub use mods::ModFn;

// Parsing surface, re-exported so most callers need only this crate.
pub use weft_parser::{parse, parse_file, Node, Op, ParseError, Tree};

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(Engine::new);

/// The process-wide default engine behind the free functions.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// Registers a template with the default engine.
pub fn register_template(name: impl Into<String>, tree: Tree) {
    DEFAULT_ENGINE.register_template(name, tree);
}

/// Renders a template registered with the default engine.
pub fn render(name: &str, ctx: &mut Ctx<'_>) -> Result<Vec<u8>> {
    DEFAULT_ENGINE.render(name, ctx)
}

/// Renders a template registered with the default engine into a sink.
pub fn render_to(w: &mut dyn Write, name: &str, ctx: &mut Ctx<'_>) -> Result<()> {
    DEFAULT_ENGINE.render_to(w, name, ctx)
}

/// Registers a value modifier with the default engine.
pub fn register_mod_fn(name: &str, alias: Option<&str>, func: ModFn) {
    DEFAULT_ENGINE.register_mod_fn(name, alias, func);
}

/// Registers a condition helper with the default engine.
pub fn register_cond_fn(name: &str, func: CondFn) {
    DEFAULT_ENGINE.register_cond_fn(name, func);
}
