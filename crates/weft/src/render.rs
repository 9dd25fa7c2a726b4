//! Tree-walking renderer.
//!
//! Each node evaluates to a [`Flow`]: the normal case is `Done`, while
//! break/continue/exit travel up the walk as flow results — matched and
//! consumed by the construct they belong to — instead of masquerading as
//! errors. True failures use [`RenderError`] and abort the render; output
//! already written stays written.

use std::borrow::Cow;
use std::io::Write;

use weft_parser::{CondTest, CounterOp, ModCall, Node, Op, Operand, Tree};

use crate::context::{Bound, Ctx};
use crate::engine::Engine;
use crate::error::{RenderError, Result};
use crate::inspect::{Scalar, Val, ValueView};
use crate::loops;

/// Control-flow result of evaluating one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Normal completion; continue with the next sibling.
    Done,
    /// Stop the nearest enclosing loop.
    Break,
    /// Skip to the nearest enclosing loop's next iteration.
    Continue,
    /// Terminate the whole render; success at the top level.
    Interrupt,
}

/// Renders a whole tree. Exit interrupts downgrade to success here;
/// break/continue escaping all loops are template errors.
pub(crate) fn render_tree(
    engine: &Engine,
    tree: &Tree,
    ctx: &mut Ctx<'_>,
    w: &mut dyn Write,
) -> Result<()> {
    match render_nodes(engine, tree.nodes(), ctx, w, 0)? {
        Flow::Done | Flow::Interrupt => Ok(()),
        Flow::Break | Flow::Continue => Err(RenderError::StrayCtl),
    }
}

/// Renders a node list in order; any non-`Done` flow stops the walk and
/// bubbles to the caller.
pub(crate) fn render_nodes(
    engine: &Engine,
    nodes: &[Node],
    ctx: &mut Ctx<'_>,
    w: &mut dyn Write,
    depth: usize,
) -> Result<Flow> {
    for node in nodes {
        match render_node(engine, node, ctx, w, depth)? {
            Flow::Done => {}
            other => return Ok(other),
        }
    }
    Ok(Flow::Done)
}

fn render_node(
    engine: &Engine,
    node: &Node,
    ctx: &mut Ctx<'_>,
    w: &mut dyn Write,
    depth: usize,
) -> Result<Flow> {
    match node {
        Node::Raw(text) => {
            w.write_all(text.as_bytes())?;
            Ok(Flow::Done)
        }

        Node::Print {
            operand,
            prefix,
            suffix,
            mods,
        } => render_print(
            engine,
            operand,
            prefix.as_deref(),
            suffix.as_deref(),
            mods,
            ctx,
            w,
        ),

        Node::CtxSet { var, src, kind } => render_ctx_set(engine, var, src, kind.as_deref(), ctx),

        Node::Counter { name, op } => {
            let current = match ctx.val(name) {
                Val::Int(i) => i,
                _ => 0,
            };
            let next = match op {
                CounterOp::Init(n) => *n,
                CounterOp::Add(n) => current + n,
                CounterOp::Sub(n) => current - n,
            };
            ctx.set_bound(name.clone(), Bound::Int(next));
            Ok(Flow::Done)
        }

        Node::Cond { test, children } => {
            let pass = eval_test(engine, test, ctx)?;
            let branch = if pass { children.first() } else { children.get(1) };
            match branch {
                Some(branch) => render_node(engine, branch, ctx, w, depth),
                None => Ok(Flow::Done),
            }
        }

        Node::CondTrue(children) | Node::CondFalse(children) | Node::Default(children) => {
            render_nodes(engine, children, ctx, w, depth)
        }

        Node::Case { body, .. } => render_nodes(engine, body, ctx, w, depth),

        Node::LoopRange {
            key,
            val,
            src,
            sep,
            body,
        } => loops::run_range(
            engine,
            key.as_deref(),
            val,
            src,
            sep.as_deref(),
            body,
            ctx,
            w,
            depth,
        ),

        Node::LoopCount {
            var,
            init,
            cond_op,
            limit,
            step,
            sep,
            body,
        } => loops::run_count(
            engine,
            var,
            init,
            *cond_op,
            limit,
            *step,
            sep.as_deref(),
            body,
            ctx,
            w,
            depth,
        ),

        Node::Break => Ok(Flow::Break),
        Node::Continue => Ok(Flow::Continue),

        Node::Switch { arg, children } => render_switch(engine, arg.as_ref(), children, ctx, w, depth),

        Node::Divider => Err(RenderError::StrayCtl),

        Node::Exit => Ok(Flow::Interrupt),
    }
}

// ============================================================================
// Print
// ============================================================================

fn resolve_operand<'x>(ctx: &'x Ctx<'_>, operand: &'x Operand) -> Val<'x> {
    match operand {
        Operand::Lit(s) => Val::Str(Cow::Borrowed(s)),
        Operand::Var(path) => ctx.val(path),
    }
}

fn render_print(
    engine: &Engine,
    operand: &Operand,
    prefix: Option<&str>,
    suffix: Option<&str>,
    mods: &[ModCall],
    ctx: &Ctx<'_>,
    w: &mut dyn Write,
) -> Result<Flow> {
    let mut value = resolve_operand(ctx, operand);
    for call in mods {
        let func = engine
            .mod_fn(&call.name)
            .ok_or_else(|| RenderError::UnknownModifier(call.name.clone()))?;
        let args: Vec<Val<'_>> = call.args.iter().map(|a| resolve_operand(ctx, a)).collect();
        if let Some(replaced) = func(&value, &args)? {
            value = replaced;
        }
    }
    if value.is_empty() {
        return Err(RenderError::EmptyArg);
    }
    if let Some(prefix) = prefix {
        w.write_all(prefix.as_bytes())?;
    }
    write_val(&value, w)?;
    if let Some(suffix) = suffix {
        w.write_all(suffix.as_bytes())?;
    }
    Ok(Flow::Done)
}

fn write_val(value: &Val<'_>, w: &mut dyn Write) -> Result<()> {
    match value {
        Val::Str(s) => w.write_all(s.as_bytes())?,
        Val::Int(i) => write!(w, "{}", i)?,
        Val::Float(f) => write!(w, "{}", f)?,
        Val::Bool(b) => write!(w, "{}", b)?,
        Val::Bytes(b) => w.write_all(b)?,
        Val::Value(v) => match v.view() {
            ValueView::Scalar(s) => write_scalar(s, w)?,
            _ => return Err(RenderError::Unprintable),
        },
        Val::None => return Err(RenderError::EmptyArg),
    }
    Ok(())
}

fn write_scalar(scalar: Scalar<'_>, w: &mut dyn Write) -> Result<()> {
    match scalar {
        Scalar::Str(s) => w.write_all(s.as_bytes())?,
        Scalar::Int(i) => write!(w, "{}", i)?,
        Scalar::Float(f) => write!(w, "{}", f)?,
        Scalar::Bool(b) => write!(w, "{}", b)?,
        Scalar::Bytes(b) => w.write_all(b)?,
        Scalar::Null => {}
    }
    Ok(())
}

// ============================================================================
// Context bindings
// ============================================================================

fn render_ctx_set(
    engine: &Engine,
    var: &str,
    src: &Operand,
    kind: Option<&str>,
    ctx: &mut Ctx<'_>,
) -> Result<Flow> {
    match src {
        Operand::Lit(s) => ctx.set_bound(var.to_string(), Bound::Str(s.clone())),
        Operand::Var(path) => match kind {
            Some(kind) => {
                let coerce = engine
                    .kind_fn(kind)
                    .ok_or_else(|| RenderError::UnknownKind(kind.to_string()))?;
                let bound = coerce(&ctx.val(path))?;
                ctx.set_bound(var.to_string(), bound);
            }
            None => {
                if let Some(value) = ctx.value_ref(path) {
                    ctx.set_bound(var.to_string(), Bound::Value(value));
                } else {
                    // Owned scalars (counters, earlier bindings) re-bind by copy;
                    // a missing source binds nothing.
                    let owned = match ctx.val(path) {
                        Val::Str(s) => Some(Bound::Str(s.into_owned())),
                        Val::Int(i) => Some(Bound::Int(i)),
                        Val::Float(f) => Some(Bound::Float(f)),
                        Val::Bool(b) => Some(Bound::Bool(b)),
                        _ => None,
                    };
                    if let Some(bound) = owned {
                        ctx.set_bound(var.to_string(), bound);
                    }
                }
            }
        },
    }
    Ok(Flow::Done)
}

// ============================================================================
// Conditions
// ============================================================================

fn eval_test(engine: &Engine, test: &CondTest, ctx: &mut Ctx<'_>) -> Result<bool> {
    match test {
        CondTest::Compare { left, op, right } => eval_compare(left, *op, right, ctx),
        CondTest::Helper { name, args } => {
            let helper = engine
                .cond_fn(name)
                .ok_or_else(|| RenderError::UnknownCondFn(name.clone()))?;
            let resolved: Vec<Val<'_>> = args.iter().map(|a| resolve_operand(ctx, a)).collect();
            Ok(helper(&resolved))
        }
        CondTest::Truthy(operand) => match operand {
            Operand::Lit(_) => Err(RenderError::SenselessCond),
            Operand::Var(path) => Ok(ctx.val(path).truthy()),
        },
    }
}

/// Evaluates `left OP right` with at least one dynamic operand. A static
/// left operand swaps the comparison so the dynamic side stays on the
/// left; two dynamic operands resolve the right side to text first.
fn eval_compare(left: &Operand, op: Op, right: &Operand, ctx: &mut Ctx<'_>) -> Result<bool> {
    match (left, right) {
        (Operand::Lit(_), Operand::Lit(_)) => Err(RenderError::SenselessCond),
        (Operand::Var(lp), Operand::Lit(rl)) => Ok(ctx.cmp(lp, op, rl)),
        (Operand::Lit(ll), Operand::Var(rp)) => Ok(ctx.cmp(rp, op.swap(), ll)),
        (Operand::Var(lp), Operand::Var(rp)) => {
            ctx.capture(rp);
            Ok(ctx.cmp(lp, op, ctx.scratch()))
        }
    }
}

// ============================================================================
// Switch
// ============================================================================

fn render_switch(
    engine: &Engine,
    arg: Option<&Operand>,
    children: &[Node],
    ctx: &mut Ctx<'_>,
    w: &mut dyn Write,
    depth: usize,
) -> Result<Flow> {
    for child in children {
        if let Node::Case {
            left,
            op,
            right,
            body,
        } = child
        {
            let hit = match arg {
                // Discriminant dispatch: equality against the case's left
                // operand, the case's own operator is ignored.
                Some(arg) => case_matches_arg(arg, left, ctx)?,
                // No discriminant: every case is a free-standing comparison.
                None => match (op, right) {
                    (Some(op), Some(right)) => eval_compare(left, *op, right, ctx)?,
                    _ => false,
                },
            };
            if hit {
                return render_nodes(engine, body, ctx, w, depth);
            }
        }
    }
    for child in children {
        if let Node::Default(body) = child {
            return render_nodes(engine, body, ctx, w, depth);
        }
    }
    Ok(Flow::Done)
}

fn case_matches_arg(arg: &Operand, left: &Operand, ctx: &mut Ctx<'_>) -> Result<bool> {
    Ok(match (arg, left) {
        (Operand::Var(ap), Operand::Lit(l)) => ctx.cmp(ap, Op::Eq, l),
        (Operand::Lit(al), Operand::Var(lp)) => ctx.cmp(lp, Op::Eq, al),
        (Operand::Var(ap), Operand::Var(lp)) => {
            ctx.capture(lp);
            ctx.cmp(ap, Op::Eq, ctx.scratch())
        }
        (Operand::Lit(al), Operand::Lit(l)) => al == l,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_str(src: &str, ctx: &mut Ctx<'_>) -> Result<String> {
        let engine = Engine::new();
        let tree = weft_parser::parse(src, false).expect("template parses");
        let mut out = Vec::new();
        render_tree(&engine, &tree, ctx, &mut out)?;
        Ok(String::from_utf8(out).expect("output is utf-8"))
    }

    #[test]
    fn test_raw_passthrough() {
        let mut ctx = Ctx::new();
        assert_eq!(render_str("plain text", &mut ctx).unwrap(), "plain text");
    }

    #[test]
    fn test_print_dynamic_and_static() {
        let mut ctx = Ctx::new();
        ctx.set_str("name", "weft");
        assert_eq!(
            render_str("hi {%= name %} / {%= \"lit\" %}", &mut ctx).unwrap(),
            "hi weft / lit"
        );
    }

    #[test]
    fn test_print_prefix_suffix() {
        let mut ctx = Ctx::new();
        ctx.set_int("n", 9);
        assert_eq!(
            render_str("{%= n prefix \"[\" suffix \"]\" %}", &mut ctx).unwrap(),
            "[9]"
        );
    }

    #[test]
    fn test_print_missing_is_empty_arg() {
        let mut ctx = Ctx::new();
        assert!(matches!(
            render_str("{%= missing %}", &mut ctx),
            Err(RenderError::EmptyArg)
        ));
    }

    #[test]
    fn test_unknown_modifier_is_error() {
        let mut ctx = Ctx::new();
        ctx.set_str("v", "x");
        assert!(matches!(
            render_str("{%= v|nonsense %}", &mut ctx),
            Err(RenderError::UnknownModifier(_))
        ));
    }

    #[test]
    fn test_senseless_condition() {
        let mut ctx = Ctx::new();
        assert!(matches!(
            render_str("{% if 1 == 1 %}x{% endif %}", &mut ctx),
            Err(RenderError::SenselessCond)
        ));
    }

    #[test]
    fn test_counter_lifecycle() {
        let mut ctx = Ctx::new();
        let out = render_str(
            "{% counter c = 5 %}{% counter c++ %}{% counter c+2 %}{%= c %}",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(out, "8");
    }

    #[test]
    fn test_exit_is_success() {
        let mut ctx = Ctx::new();
        assert_eq!(
            render_str("before{% exit %}after", &mut ctx).unwrap(),
            "before"
        );
    }

    #[test]
    fn test_stray_break_is_error() {
        let mut ctx = Ctx::new();
        assert!(matches!(
            render_str("{% break %}", &mut ctx),
            Err(RenderError::StrayCtl)
        ));
    }
}
