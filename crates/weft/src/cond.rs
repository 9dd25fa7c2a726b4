//! Condition helpers.
//!
//! `{% if helper(args) %}` calls a registered boolean helper with its
//! resolved arguments. The builtins test the length of a value, the one
//! property a comparison operator cannot reach.

use crate::engine::Engine;
use crate::inspect::{Scalar, Val, ValueView};

/// A boolean condition helper.
pub type CondFn = fn(args: &[Val<'_>]) -> bool;

pub(crate) fn register_builtins(engine: &Engine) {
    engine.register_cond_fn("lenEq0", cond_len_eq0);
    engine.register_cond_fn("lenGt0", cond_len_gt0);
    engine.register_cond_fn("lenGtq0", cond_len_gtq0);
}

/// Length of a value, when it has one: strings and byte sequences by
/// bytes, sequences and mappings by element count, missing/null as zero.
fn len_of(val: &Val<'_>) -> Option<usize> {
    match val {
        Val::None => Some(0),
        Val::Str(s) => Some(s.len()),
        Val::Bytes(b) => Some(b.len()),
        Val::Int(_) | Val::Float(_) | Val::Bool(_) => None,
        Val::Value(v) => match v.view() {
            ValueView::Scalar(Scalar::Str(s)) => Some(s.len()),
            ValueView::Scalar(Scalar::Bytes(b)) => Some(b.len()),
            ValueView::Scalar(Scalar::Null) => Some(0),
            ValueView::Scalar(_) => None,
            ValueView::Seq(s) => Some(s.len()),
            ValueView::Map(m) => Some(m.len()),
        },
    }
}

fn cond_len_eq0(args: &[Val<'_>]) -> bool {
    args.first().and_then(len_of) == Some(0)
}

fn cond_len_gt0(args: &[Val<'_>]) -> bool {
    matches!(args.first().and_then(len_of), Some(n) if n > 0)
}

fn cond_len_gtq0(args: &[Val<'_>]) -> bool {
    args.first().and_then(len_of).is_some()
}
