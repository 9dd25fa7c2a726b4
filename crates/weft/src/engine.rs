//! Engine facade and registries.
//!
//! An [`Engine`] owns the four name registries — templates, value
//! modifiers, condition helpers and binding kinds — behind read-write
//! locks. Registration overwrites any existing entry under the same name;
//! there is no duplicate detection. Trees are stored as `Arc`s, so
//! concurrent renders of the same template share one read-only tree.
//!
//! Most callers use one `Engine` per process; the crate root exposes a
//! lazily-created default instance behind free functions for them.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, RwLock};

use weft_parser::Tree;

use crate::cond::{self, CondFn};
use crate::context::{self, Ctx, KindFn};
use crate::error::{RenderError, Result};
use crate::mods::{self, ModFn};
use crate::render;

/// A registered template: its name and its parsed tree.
#[derive(Debug)]
pub struct Tpl {
    name: String,
    tree: Tree,
}

impl Tpl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }
}

/// Template engine instance: registries plus the render entry points.
pub struct Engine {
    templates: RwLock<HashMap<String, Arc<Tpl>>>,
    mods: RwLock<HashMap<String, ModFn>>,
    conds: RwLock<HashMap<String, CondFn>>,
    kinds: RwLock<HashMap<String, KindFn>>,
}

impl Engine {
    /// Creates an engine with the builtin modifiers, condition helpers
    /// and binding kinds registered.
    pub fn new() -> Self {
        let engine = Engine {
            templates: RwLock::new(HashMap::new()),
            mods: RwLock::new(HashMap::new()),
            conds: RwLock::new(HashMap::new()),
            kinds: RwLock::new(HashMap::new()),
        };
        mods::register_builtins(&engine);
        cond::register_builtins(&engine);
        context::register_builtin_kinds(&engine);
        engine
    }

    /// Registers a parsed tree under a name, replacing any previous
    /// registration.
    pub fn register_template(&self, name: impl Into<String>, tree: Tree) {
        let name = name.into();
        let tpl = Arc::new(Tpl {
            name: name.clone(),
            tree,
        });
        self.templates
            .write()
            .expect("template registry lock poisoned")
            .insert(name, tpl);
    }

    /// Looks up a registered template.
    pub fn template(&self, name: &str) -> Option<Arc<Tpl>> {
        self.templates
            .read()
            .expect("template registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Renders a registered template into a byte buffer.
    pub fn render(&self, name: &str, ctx: &mut Ctx<'_>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.render_to(&mut out, name, ctx)?;
        Ok(out)
    }

    /// Renders a registered template into the given sink.
    ///
    /// # Errors
    ///
    /// Fails if no template is registered under `name`, or with the first
    /// evaluation error the renderer hits. Output written before the
    /// failure stays in the sink.
    pub fn render_to(&self, w: &mut dyn Write, name: &str, ctx: &mut Ctx<'_>) -> Result<()> {
        let tpl = self
            .template(name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;
        render::render_tree(self, tpl.tree(), ctx, w)
    }

    /// Registers a value modifier under a name and an optional alias.
    pub fn register_mod_fn(&self, name: &str, alias: Option<&str>, func: ModFn) {
        let mut mods = self.mods.write().expect("modifier registry lock poisoned");
        mods.insert(name.to_string(), func);
        if let Some(alias) = alias {
            mods.insert(alias.to_string(), func);
        }
    }

    /// Registers a condition helper.
    pub fn register_cond_fn(&self, name: &str, func: CondFn) {
        self.conds
            .write()
            .expect("condition registry lock poisoned")
            .insert(name.to_string(), func);
    }

    /// Registers a binding kind for `context ... as KIND` clauses.
    pub fn register_kind(&self, name: &str, func: KindFn) {
        self.kinds
            .write()
            .expect("kind registry lock poisoned")
            .insert(name.to_string(), func);
    }

    pub(crate) fn mod_fn(&self, name: &str) -> Option<ModFn> {
        self.mods
            .read()
            .expect("modifier registry lock poisoned")
            .get(name)
            .copied()
    }

    pub(crate) fn cond_fn(&self, name: &str) -> Option<CondFn> {
        self.conds
            .read()
            .expect("condition registry lock poisoned")
            .get(name)
            .copied()
    }

    pub(crate) fn kind_fn(&self, name: &str) -> Option<KindFn> {
        self.kinds
            .read()
            .expect("kind registry lock poisoned")
            .get(name)
            .copied()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_unregistered_template() {
        let engine = Engine::new();
        let mut ctx = Ctx::new();
        assert!(matches!(
            engine.render("nope", &mut ctx),
            Err(RenderError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_register_and_render() {
        let engine = Engine::new();
        let tree = weft_parser::parse("hello {%= who %}", false).unwrap();
        engine.register_template("greet", tree);

        let mut ctx = Ctx::new();
        ctx.set_str("who", "world");
        let out = engine.render("greet", &mut ctx).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn test_registration_overwrites() {
        let engine = Engine::new();
        engine.register_template("t", weft_parser::parse("one", false).unwrap());
        engine.register_template("t", weft_parser::parse("two", false).unwrap());

        let mut ctx = Ctx::new();
        assert_eq!(engine.render("t", &mut ctx).unwrap(), b"two");
    }

    #[test]
    fn test_custom_modifier() {
        fn shout(val: &crate::Val<'_>, _args: &[crate::Val<'_>]) -> Result<Option<crate::Val<'static>>> {
            Ok(val
                .to_text()
                .map(|t| crate::Val::Str(t.to_uppercase().into())))
        }

        let engine = Engine::new();
        engine.register_mod_fn("shout", None, shout);
        engine.register_template("t", weft_parser::parse("{%= v|shout %}", false).unwrap());

        let mut ctx = Ctx::new();
        ctx.set_str("v", "quiet");
        assert_eq!(engine.render("t", &mut ctx).unwrap(), b"QUIET");
    }

    #[test]
    fn test_tree_shared_across_threads() {
        let engine = Arc::new(Engine::new());
        engine.register_template(
            "t",
            weft_parser::parse("{%= n %}", false).unwrap(),
        );

        let handles: Vec<_> = (0..4i64)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let mut ctx = Ctx::new();
                    ctx.set_int("n", i);
                    engine.render("t", &mut ctx).unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), i.to_string().into_bytes());
        }
    }
}
