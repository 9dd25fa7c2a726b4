//! Loop execution.
//!
//! Range loops iterate a sequence- or mapping-shaped value by index,
//! binding the optional key (element index, or map key) and the element
//! value into the context for each pass over the body. Counting loops keep
//! an integer cursor, re-evaluate their limit every iteration and step the
//! cursor afterwards.
//!
//! The declared separator is written before every iteration except the
//! first, decided by iteration count — a `continue` that skips a body does
//! not skip the separator of the following iteration.
//!
//! Iteration state lives in a per-context free list keyed by loop nesting
//! depth ([`Ctx::loop_acquire`]); states are reset on acquire and reused
//! across iterations and renders instead of being allocated per loop.

use std::io::Write;

use weft_parser::{Node, Op, Operand, Step};

use crate::context::{ord_matches, Bound, Ctx};
use crate::engine::Engine;
use crate::error::Result;
use crate::inspect::{Scalar, ValueView};
use crate::render::{render_nodes, Flow};

/// One reusable loop-iteration state.
#[derive(Debug, Default)]
pub(crate) struct LoopState {
    pub(crate) cntr: usize,
}

impl LoopState {
    pub(crate) fn reset(&mut self) {
        self.cntr = 0;
    }
}

/// Runs a range loop over the value at `src`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_range<'a>(
    engine: &Engine,
    key: Option<&str>,
    val_name: &str,
    src: &Operand,
    sep: Option<&str>,
    body: &[Node],
    ctx: &mut Ctx<'a>,
    w: &mut dyn Write,
    depth: usize,
) -> Result<Flow> {
    // A literal or missing source has nothing to iterate.
    let Operand::Var(path) = src else {
        return Ok(Flow::Done);
    };
    let Some(root) = ctx.value_ref(path) else {
        return Ok(Flow::Done);
    };

    ctx.loop_acquire(depth);
    match root.view() {
        ValueView::Seq(seq) => {
            for idx in 0..seq.len() {
                let Some(elem) = seq.at(idx) else { continue };
                emit_sep(ctx, w, sep, depth)?;
                if let Some(key) = key {
                    ctx.set_bound(key.to_string(), Bound::Int(idx as i64));
                }
                ctx.set_bound(val_name.to_string(), Bound::Value(elem));
                match render_nodes(engine, body, ctx, w, depth + 1)? {
                    Flow::Break => break,
                    Flow::Interrupt => return Ok(Flow::Interrupt),
                    Flow::Continue | Flow::Done => {}
                }
            }
        }
        ValueView::Map(map) => {
            for idx in 0..map.len() {
                let Some(entry_key) = map.key_at(idx) else { continue };
                let Some(elem) = map.get(entry_key) else { continue };
                emit_sep(ctx, w, sep, depth)?;
                if let Some(key) = key {
                    ctx.set_bound(key.to_string(), Bound::Str(entry_key.to_string()));
                }
                ctx.set_bound(val_name.to_string(), Bound::Value(elem));
                match render_nodes(engine, body, ctx, w, depth + 1)? {
                    Flow::Break => break,
                    Flow::Interrupt => return Ok(Flow::Interrupt),
                    Flow::Continue | Flow::Done => {}
                }
            }
        }
        ValueView::Scalar(_) => {}
    }
    Ok(Flow::Done)
}

/// Runs a counting loop.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_count(
    engine: &Engine,
    var: &str,
    init: &Operand,
    cond_op: Op,
    limit: &Operand,
    step: Step,
    sep: Option<&str>,
    body: &[Node],
    ctx: &mut Ctx<'_>,
    w: &mut dyn Write,
    depth: usize,
) -> Result<Flow> {
    let mut cursor = resolve_int(ctx, init);
    ctx.loop_acquire(depth);
    loop {
        // The limit may be dynamic; it is re-read every iteration.
        let limit = resolve_int(ctx, limit);
        if !ord_matches(cursor.cmp(&limit), cond_op) {
            break;
        }
        emit_sep(ctx, w, sep, depth)?;
        ctx.set_bound(var.to_string(), Bound::Int(cursor));
        match render_nodes(engine, body, ctx, w, depth + 1)? {
            Flow::Break => break,
            Flow::Interrupt => return Ok(Flow::Interrupt),
            Flow::Continue | Flow::Done => {}
        }
        match step {
            Step::Inc => cursor += 1,
            Step::Dec => cursor -= 1,
        }
    }
    Ok(Flow::Done)
}

fn emit_sep(ctx: &mut Ctx<'_>, w: &mut dyn Write, sep: Option<&str>, depth: usize) -> Result<()> {
    if ctx.loop_count(depth) > 0 {
        if let Some(sep) = sep {
            w.write_all(sep.as_bytes())?;
        }
    }
    ctx.loop_bump(depth);
    Ok(())
}

/// Integer value of a loop operand: literals parse directly, variables
/// resolve through the context. Anything else counts from zero.
fn resolve_int(ctx: &Ctx<'_>, operand: &Operand) -> i64 {
    match operand {
        Operand::Lit(s) => s.trim().parse().unwrap_or(0),
        Operand::Var(path) => match ctx.val(path).scalar() {
            Some(Scalar::Int(i)) => i,
            Some(Scalar::Float(f)) => f as i64,
            Some(Scalar::Str(s)) => s.trim().parse().unwrap_or(0),
            Some(Scalar::Bool(b)) => i64::from(b),
            _ => 0,
        },
    }
}
