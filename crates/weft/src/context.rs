//! Per-render variable environment.
//!
//! A [`Ctx`] holds the variable bindings for one render: references into
//! caller-owned data (read through [`Inspect`]), plus owned scalars for
//! counters, loop cursors and literal context bindings. It also carries a
//! reusable scratch buffer for value-to-text conversions and the pool of
//! loop-iteration states (see [`crate::loops`]).
//!
//! A context may be reused across renders on the same thread: call
//! [`Ctx::clear`] between them to drop the bindings while keeping the
//! allocations.

use std::cmp::Ordering;
use std::collections::HashMap;

use weft_parser::Op;

use crate::engine::Engine;
use crate::error::{RenderError, Result};
use crate::inspect::{resolve_path, Inspect, Scalar, Val};
use crate::loops::LoopState;

/// One variable binding.
#[derive(Debug, Clone)]
pub enum Bound<'a> {
    /// Owned string (literal context bindings, map keys).
    Str(String),
    /// Owned integer (counters, loop cursors and indices).
    Int(i64),
    /// Owned float (kind-coerced bindings).
    Float(f64),
    /// Owned boolean (kind-coerced bindings).
    Bool(bool),
    /// Reference into caller-owned data.
    Value(&'a dyn Inspect),
}

/// Coerces a resolved value into an owned binding; what an `as KIND`
/// clause names.
pub type KindFn = fn(&Val<'_>) -> Result<Bound<'static>>;

/// The per-render variable environment.
#[derive(Debug, Default)]
pub struct Ctx<'a> {
    vars: HashMap<String, Bound<'a>>,
    buf: String,
    pool: Vec<LoopState>,
}

impl<'a> Ctx<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a variable to caller-owned data.
    ///
    /// The value must outlive the context; rebinding an existing name
    /// overwrites it.
    pub fn set(&mut self, name: impl Into<String>, value: &'a dyn Inspect) {
        self.vars.insert(name.into(), Bound::Value(value));
    }

    /// Binds a variable to an owned string.
    pub fn set_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), Bound::Str(value.into()));
    }

    /// Binds a variable to an owned integer.
    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.vars.insert(name.into(), Bound::Int(value));
    }

    /// Binds a variable to an owned float.
    pub fn set_float(&mut self, name: impl Into<String>, value: f64) {
        self.vars.insert(name.into(), Bound::Float(value));
    }

    /// Binds a variable to an owned boolean.
    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.vars.insert(name.into(), Bound::Bool(value));
    }

    /// Drops all bindings, keeping allocations for reuse.
    pub fn clear(&mut self) {
        self.vars.clear();
        self.buf.clear();
    }

    pub(crate) fn set_bound(&mut self, name: String, bound: Bound<'a>) {
        self.vars.insert(name, bound);
    }

    /// Resolves a dotted path to a pipeline value; missing paths resolve
    /// to [`Val::None`].
    pub(crate) fn val<'c>(&'c self, path: &str) -> Val<'c> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match (self.vars.get(head), rest) {
            (None, _) => Val::None,
            (Some(Bound::Value(value)), Some(rest)) => match resolve_path(*value, rest) {
                Some(found) => Val::Value(found),
                None => Val::None,
            },
            (Some(Bound::Value(value)), None) => Val::Value(*value),
            (Some(_), Some(_)) => Val::None,
            (Some(Bound::Str(s)), None) => Val::Str(s.as_str().into()),
            (Some(Bound::Int(i)), None) => Val::Int(*i),
            (Some(Bound::Float(f)), None) => Val::Float(*f),
            (Some(Bound::Bool(b)), None) => Val::Bool(*b),
        }
    }

    /// Resolves a dotted path to a reference with the full context
    /// lifetime, for re-binding (context bindings, loop element values).
    /// Only paths rooted in caller-owned data have one.
    pub(crate) fn value_ref(&self, path: &str) -> Option<&'a dyn Inspect> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match self.vars.get(head)? {
            Bound::Value(value) => match rest {
                Some(rest) => resolve_path(*value, rest),
                None => Some(*value),
            },
            _ => None,
        }
    }

    /// Captures the textual form of a dynamic value into the scratch
    /// buffer; missing values capture as the empty string.
    pub(crate) fn capture(&mut self, path: &str) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        if let Some(text) = self.val(path).to_text() {
            buf.push_str(&text);
        }
        self.buf = buf;
    }

    pub(crate) fn scratch(&self) -> &str {
        &self.buf
    }

    /// Compares a dynamic value against a literal. The dynamic operand
    /// drives the comparison's type: numbers compare numerically, strings
    /// lexicographically, booleans by equality only. Missing values never
    /// match.
    pub(crate) fn cmp(&self, path: &str, op: Op, rhs: &str) -> bool {
        match self.val(path).scalar() {
            Some(scalar) => cmp_scalar_lit(scalar, op, rhs),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Loop-state pool
    // ------------------------------------------------------------------------

    /// Takes the state slot for the given nesting depth out of the free
    /// list, growing it on first use, and resets it.
    pub(crate) fn loop_acquire(&mut self, depth: usize) {
        if self.pool.len() <= depth {
            self.pool.resize_with(depth + 1, LoopState::default);
        }
        self.pool[depth].reset();
    }

    pub(crate) fn loop_count(&self, depth: usize) -> usize {
        self.pool[depth].cntr
    }

    pub(crate) fn loop_bump(&mut self, depth: usize) {
        self.pool[depth].cntr += 1;
    }
}

fn cmp_scalar_lit(l: Scalar<'_>, op: Op, rhs: &str) -> bool {
    let rhs = rhs.trim();
    match l {
        Scalar::Int(i) => {
            if let Ok(r) = rhs.parse::<i64>() {
                ord_matches(i.cmp(&r), op)
            } else if let Ok(r) = rhs.parse::<f64>() {
                float_cmp(i as f64, op, r)
            } else {
                false
            }
        }
        Scalar::Float(f) => match rhs.parse::<f64>() {
            Ok(r) => float_cmp(f, op, r),
            Err(_) => false,
        },
        Scalar::Bool(b) => match (rhs.parse::<bool>(), op) {
            (Ok(r), Op::Eq) => b == r,
            (Ok(r), Op::Ne) => b != r,
            _ => false,
        },
        Scalar::Str(s) => ord_matches(s.cmp(rhs), op),
        Scalar::Bytes(b) => ord_matches(b.cmp(rhs.as_bytes()), op),
        Scalar::Null => match op {
            Op::Eq => rhs.is_empty(),
            Op::Ne => !rhs.is_empty(),
            _ => false,
        },
    }
}

pub(crate) fn ord_matches(ord: Ordering, op: Op) -> bool {
    match op {
        Op::Eq => ord == Ordering::Equal,
        Op::Ne => ord != Ordering::Equal,
        Op::Gt => ord == Ordering::Greater,
        Op::Ge => ord != Ordering::Less,
        Op::Lt => ord == Ordering::Less,
        Op::Le => ord != Ordering::Greater,
    }
}

fn float_cmp(l: f64, op: Op, r: f64) -> bool {
    match op {
        Op::Eq => l == r,
        Op::Ne => l != r,
        Op::Gt => l > r,
        Op::Ge => l >= r,
        Op::Lt => l < r,
        Op::Le => l <= r,
    }
}

// ============================================================================
// Binding kinds
// ============================================================================

pub(crate) fn register_builtin_kinds(engine: &Engine) {
    engine.register_kind("str", kind_str);
    engine.register_kind("int", kind_int);
    engine.register_kind("float", kind_float);
    engine.register_kind("bool", kind_bool);
}

fn kind_str(val: &Val<'_>) -> Result<Bound<'static>> {
    Ok(Bound::Str(
        val.to_text().map(|t| t.into_owned()).unwrap_or_default(),
    ))
}

fn kind_int(val: &Val<'_>) -> Result<Bound<'static>> {
    let n = match val.scalar() {
        Some(Scalar::Int(i)) => i,
        Some(Scalar::Float(f)) => f as i64,
        Some(Scalar::Bool(b)) => i64::from(b),
        Some(Scalar::Str(s)) => s
            .trim()
            .parse()
            .map_err(|_| RenderError::Conversion("int"))?,
        Some(Scalar::Null) => 0,
        _ => return Err(RenderError::Conversion("int")),
    };
    Ok(Bound::Int(n))
}

fn kind_float(val: &Val<'_>) -> Result<Bound<'static>> {
    let f = match val.scalar() {
        Some(Scalar::Float(f)) => f,
        Some(Scalar::Int(i)) => i as f64,
        Some(Scalar::Str(s)) => s
            .trim()
            .parse()
            .map_err(|_| RenderError::Conversion("float"))?,
        Some(Scalar::Null) => 0.0,
        _ => return Err(RenderError::Conversion("float")),
    };
    Ok(Bound::Float(f))
}

fn kind_bool(val: &Val<'_>) -> Result<Bound<'static>> {
    let b = match val.scalar() {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Str(s)) => s
            .trim()
            .parse()
            .map_err(|_| RenderError::Conversion("bool"))?,
        Some(Scalar::Int(i)) => i != 0,
        Some(Scalar::Null) => false,
        _ => return Err(RenderError::Conversion("bool")),
    };
    Ok(Bound::Bool(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_owned_bindings() {
        let mut ctx = Ctx::new();
        ctx.set_str("name", "alice");
        ctx.set_int("count", 3);

        assert!(matches!(ctx.val("name"), Val::Str(s) if s == "alice"));
        assert!(matches!(ctx.val("count"), Val::Int(3)));
        assert!(matches!(ctx.val("missing"), Val::None));
        // A dotted path into an owned scalar resolves to nothing.
        assert!(matches!(ctx.val("count.deeper"), Val::None));
    }

    #[test]
    fn test_lookup_dotted_path_into_value() {
        let data = json!({"user": {"id": 7}});
        let mut ctx = Ctx::new();
        ctx.set("data", &data);

        assert!(matches!(ctx.val("data.user.id"), Val::Int(7)));
        assert!(matches!(ctx.val("data.user.name"), Val::None));
    }

    #[test]
    fn test_last_write_wins() {
        let mut ctx = Ctx::new();
        ctx.set_int("x", 1);
        ctx.set_int("x", 2);
        assert!(matches!(ctx.val("x"), Val::Int(2)));
    }

    #[test]
    fn test_cmp_numeric_and_string() {
        let mut ctx = Ctx::new();
        ctx.set_int("n", 5);
        ctx.set_str("s", "abc");

        assert!(ctx.cmp("n", Op::Eq, "5"));
        assert!(ctx.cmp("n", Op::Gt, "4"));
        assert!(!ctx.cmp("n", Op::Lt, "4"));
        assert!(ctx.cmp("n", Op::Lt, "5.5"));
        assert!(ctx.cmp("s", Op::Eq, "abc"));
        assert!(ctx.cmp("s", Op::Gt, "abb"));
        assert!(!ctx.cmp("missing", Op::Eq, "anything"));
    }

    #[test]
    fn test_capture_fills_scratch() {
        let mut ctx = Ctx::new();
        ctx.set_int("n", 42);
        ctx.capture("n");
        assert_eq!(ctx.scratch(), "42");
        ctx.capture("missing");
        assert_eq!(ctx.scratch(), "");
    }

    #[test]
    fn test_kind_coercions() {
        assert!(matches!(
            kind_int(&Val::Str("12".into())).unwrap(),
            Bound::Int(12)
        ));
        assert!(matches!(
            kind_float(&Val::Int(2)).unwrap(),
            Bound::Float(f) if f == 2.0
        ));
        assert!(matches!(
            kind_bool(&Val::Str("true".into())).unwrap(),
            Bound::Bool(true)
        ));
        assert!(kind_int(&Val::Str("not a number".into())).is_err());
    }

    #[test]
    fn test_loop_pool_grows_and_resets() {
        let mut ctx = Ctx::new();
        ctx.loop_acquire(0);
        ctx.loop_bump(0);
        ctx.loop_bump(0);
        assert_eq!(ctx.loop_count(0), 2);

        ctx.loop_acquire(1);
        assert_eq!(ctx.loop_count(1), 0);

        // Re-acquiring the same depth resets the counter.
        ctx.loop_acquire(0);
        assert_eq!(ctx.loop_count(0), 0);
    }
}
