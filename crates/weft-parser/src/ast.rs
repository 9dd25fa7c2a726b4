//! Tree types for parsed templates.
//!
//! A template parses into a [`Tree`]: an ordered list of [`Node`]s, one
//! variant per construct kind. Each variant carries only the fields that
//! construct needs, so invalid field combinations cannot be represented.
//!
//! Trees are immutable after construction and safe to render from multiple
//! threads concurrently.

use std::fmt;

use crate::error::{ParseError, Result};

/// Comparison operators used by conditions, cases and counting loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    /// Parses an operator token.
    pub fn parse(src: &str) -> Option<Op> {
        match src {
            "==" => Some(Op::Eq),
            "!=" => Some(Op::Ne),
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Ge),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Le),
            _ => None,
        }
    }

    /// Mirrors the operator for swapped operand order.
    ///
    /// `a < b` holds exactly when `b > a`, so a comparison whose operands
    /// must be flipped (to keep the dynamic one on the left) uses the
    /// swapped operator. Equality operators are their own mirror.
    pub fn swap(self) -> Op {
        match self {
            Op::Gt => Op::Lt,
            Op::Ge => Op::Le,
            Op::Lt => Op::Gt,
            Op::Le => Op::Ge,
            other => other,
        }
    }

    /// The source form of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counting-loop step direction (`i++` / `i--`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Inc,
    Dec,
}

/// Counter mutation carried by a `{% counter %}` region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOp {
    /// `counter n` / `counter n = 5`
    Init(i64),
    /// `counter n++` / `counter n+3`
    Add(i64),
    /// `counter n--` / `counter n-3`
    Sub(i64),
}

/// A single operand, classified once at parse time.
///
/// The static/dynamic split is fixed here and never re-evaluated during
/// rendering: quoted strings, numbers and booleans are literals, everything
/// else is a dotted variable path looked up in the render context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Literal value known at parse time (quotes already stripped).
    Lit(String),
    /// Variable path resolved against the context at render time.
    Var(String),
}

impl Operand {
    /// True for parse-time literals.
    pub fn is_static(&self) -> bool {
        matches!(self, Operand::Lit(_))
    }

    /// The operand text, literal value or variable path.
    pub fn text(&self) -> &str {
        match self {
            Operand::Lit(s) | Operand::Var(s) => s,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Lit(s) => write!(f, "{:?}", s),
            Operand::Var(s) => f.write_str(s),
        }
    }
}

/// One modifier invocation in a print chain: a name plus its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModCall {
    pub name: String,
    pub args: Vec<Operand>,
}

/// The test of a conditional region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CondTest {
    /// `if L OP R`
    Compare { left: Operand, op: Op, right: Operand },
    /// `if helper(args)` — a single registered boolean helper call.
    Helper { name: String, args: Vec<Operand> },
    /// `if x` — truthiness of a single operand.
    Truthy(Operand),
}

/// A single template construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, written to the output verbatim.
    Raw(String),

    /// Print expression with an optional modifier chain.
    Print {
        operand: Operand,
        prefix: Option<String>,
        suffix: Option<String>,
        mods: Vec<ModCall>,
    },

    /// `context NAME = EXPR [as KIND]` variable binding.
    CtxSet {
        var: String,
        src: Operand,
        kind: Option<String>,
    },

    /// Counter declaration or mutation.
    Counter { name: String, op: CounterOp },

    /// Conditional; children are the branch nodes
    /// ([`Node::CondTrue`] and optionally [`Node::CondFalse`]).
    Cond { test: CondTest, children: Vec<Node> },

    /// True branch of a conditional.
    CondTrue(Vec<Node>),
    /// False branch of a conditional.
    CondFalse(Vec<Node>),

    /// `for [K,]V := range SRC [separator SEP]`
    LoopRange {
        key: Option<String>,
        val: String,
        src: Operand,
        sep: Option<String>,
        body: Vec<Node>,
    },

    /// `for V := INIT; V OP LIMIT; V STEP [separator SEP]`
    LoopCount {
        var: String,
        init: Operand,
        cond_op: Op,
        limit: Operand,
        step: Step,
        sep: Option<String>,
        body: Vec<Node>,
    },

    /// `{% break %}` inside a loop body.
    Break,
    /// `{% continue %}` inside a loop body.
    Continue,

    /// Switch; children are the rolled-up [`Node::Case`] /
    /// [`Node::Default`] groups.
    Switch {
        arg: Option<Operand>,
        children: Vec<Node>,
    },

    /// One switch case with its absorbed body.
    Case {
        left: Operand,
        op: Option<Op>,
        right: Option<Operand>,
        body: Vec<Node>,
    },

    /// Switch default group.
    Default(Vec<Node>),

    /// Top-level `else` marker; consumed when a conditional body is split
    /// into branches, an error anywhere else.
    Divider,

    /// `{% exit %}` — normal early termination of the whole render.
    Exit,
}

/// A parsed template: an ordered sequence of top-level nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
}

impl Tree {
    /// The top-level nodes in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Splits a flat conditional body at its top-level divider.
///
/// Returns the true-branch nodes and, when an `else` was present, the
/// false-branch nodes. A second divider is a parse error.
pub(crate) fn split_cond_branches(nodes: Vec<Node>) -> Result<(Vec<Node>, Option<Vec<Node>>)> {
    let mut parts: Vec<Vec<Node>> = vec![Vec::new()];
    for node in nodes {
        if matches!(node, Node::Divider) {
            parts.push(Vec::new());
        } else {
            parts.last_mut().expect("parts never empty").push(node);
        }
    }
    if parts.len() > 2 {
        return Err(ParseError::CondBranches);
    }
    let mut parts = parts.into_iter();
    let on_true = parts.next().expect("parts never empty");
    Ok((on_true, parts.next()))
}

/// Groups a flat switch body into case/default nodes.
///
/// Nodes before the first case or default are dropped; every case/default
/// absorbs all following siblings until the next case/default.
pub(crate) fn rollup_switch(nodes: Vec<Node>) -> Vec<Node> {
    let mut grouped = Vec::new();
    let mut current: Option<Node> = None;
    for node in nodes {
        match node {
            Node::Case { .. } | Node::Default(_) => {
                if let Some(done) = current.take() {
                    grouped.push(done);
                }
                current = Some(node);
            }
            other => match current.as_mut() {
                Some(Node::Case { body, .. }) => body.push(other),
                Some(Node::Default(body)) => body.push(other),
                _ => {}
            },
        }
    }
    if let Some(done) = current.take() {
        grouped.push(done);
    }
    grouped
}

// ============================================================================
// Debug dump
// ============================================================================

impl fmt::Display for Tree {
    /// Human-readable structure dump, one node per line, children indented.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dump_nodes(f, &self.nodes, 0)
    }
}

fn dump_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node], depth: usize) -> fmt::Result {
    for node in nodes {
        dump_node(f, node, depth)?;
    }
    Ok(())
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("\t")?;
    }
    Ok(())
}

fn dump_mods(f: &mut fmt::Formatter<'_>, mods: &[ModCall]) -> fmt::Result {
    for m in mods {
        write!(f, " |{}", m.name)?;
        if !m.args.is_empty() {
            f.write_str("(")?;
            for (i, a) in m.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", a)?;
            }
            f.write_str(")")?;
        }
    }
    Ok(())
}

fn dump_node(f: &mut fmt::Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    match node {
        Node::Raw(text) => writeln!(f, "raw: {:?}", text),
        Node::Print {
            operand,
            prefix,
            suffix,
            mods,
        } => {
            write!(f, "print: {}", operand)?;
            if let Some(p) = prefix {
                write!(f, " pfx {:?}", p)?;
            }
            if let Some(s) = suffix {
                write!(f, " sfx {:?}", s)?;
            }
            dump_mods(f, mods)?;
            writeln!(f)
        }
        Node::CtxSet { var, src, kind } => {
            write!(f, "context: {} = {}", var, src)?;
            if let Some(k) = kind {
                write!(f, " as {}", k)?;
            }
            writeln!(f)
        }
        Node::Counter { name, op } => match op {
            CounterOp::Init(n) => writeln!(f, "counter: {} = {}", name, n),
            CounterOp::Add(n) => writeln!(f, "counter: {} += {}", name, n),
            CounterOp::Sub(n) => writeln!(f, "counter: {} -= {}", name, n),
        },
        Node::Cond { test, children } => {
            match test {
                CondTest::Compare { left, op, right } => {
                    writeln!(f, "cond: {} {} {}", left, op, right)?
                }
                CondTest::Helper { name, args } => {
                    write!(f, "cond: {}(", name)?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    writeln!(f, ")")?
                }
                CondTest::Truthy(operand) => writeln!(f, "cond: {}", operand)?,
            }
            dump_nodes(f, children, depth + 1)
        }
        Node::CondTrue(children) => {
            writeln!(f, "true:")?;
            dump_nodes(f, children, depth + 1)
        }
        Node::CondFalse(children) => {
            writeln!(f, "false:")?;
            dump_nodes(f, children, depth + 1)
        }
        Node::LoopRange {
            key,
            val,
            src,
            sep,
            body,
        } => {
            write!(f, "rloop:")?;
            if let Some(k) = key {
                write!(f, " key {}", k)?;
            }
            write!(f, " val {} src {}", val, src)?;
            if let Some(s) = sep {
                write!(f, " sep {:?}", s)?;
            }
            writeln!(f)?;
            dump_nodes(f, body, depth + 1)
        }
        Node::LoopCount {
            var,
            init,
            cond_op,
            limit,
            step,
            sep,
            body,
        } => {
            let step = match step {
                Step::Inc => "++",
                Step::Dec => "--",
            };
            write!(
                f,
                "cloop: var {} init {} cond {} lim {} step {}",
                var, init, cond_op, limit, step
            )?;
            if let Some(s) = sep {
                write!(f, " sep {:?}", s)?;
            }
            writeln!(f)?;
            dump_nodes(f, body, depth + 1)
        }
        Node::Break => writeln!(f, "break"),
        Node::Continue => writeln!(f, "continue"),
        Node::Switch { arg, children } => {
            match arg {
                Some(a) => writeln!(f, "switch: {}", a)?,
                None => writeln!(f, "switch")?,
            }
            dump_nodes(f, children, depth + 1)
        }
        Node::Case {
            left,
            op,
            right,
            body,
        } => {
            match (op, right) {
                (Some(op), Some(right)) => writeln!(f, "case: {} {} {}", left, op, right)?,
                _ => writeln!(f, "case: {}", left)?,
            }
            dump_nodes(f, body, depth + 1)
        }
        Node::Default(body) => {
            writeln!(f, "default:")?;
            dump_nodes(f, body, depth + 1)
        }
        Node::Divider => writeln!(f, "else"),
        Node::Exit => writeln!(f, "exit"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_parse_and_swap() {
        assert_eq!(Op::parse("=="), Some(Op::Eq));
        assert_eq!(Op::parse(">="), Some(Op::Ge));
        assert_eq!(Op::parse("=>"), None);

        assert_eq!(Op::Gt.swap(), Op::Lt);
        assert_eq!(Op::Le.swap(), Op::Ge);
        assert_eq!(Op::Eq.swap(), Op::Eq);
        assert_eq!(Op::Ne.swap(), Op::Ne);
    }

    #[test]
    fn test_split_cond_branches_no_divider() {
        let nodes = vec![Node::Raw("a".into())];
        let (on_true, on_false) = split_cond_branches(nodes).unwrap();
        assert_eq!(on_true, vec![Node::Raw("a".into())]);
        assert!(on_false.is_none());
    }

    #[test]
    fn test_split_cond_branches_with_divider() {
        let nodes = vec![
            Node::Raw("t".into()),
            Node::Divider,
            Node::Raw("f".into()),
        ];
        let (on_true, on_false) = split_cond_branches(nodes).unwrap();
        assert_eq!(on_true, vec![Node::Raw("t".into())]);
        assert_eq!(on_false, Some(vec![Node::Raw("f".into())]));
    }

    #[test]
    fn test_split_cond_branches_empty_true_branch() {
        let nodes = vec![Node::Divider, Node::Raw("f".into())];
        let (on_true, on_false) = split_cond_branches(nodes).unwrap();
        assert!(on_true.is_empty());
        assert_eq!(on_false, Some(vec![Node::Raw("f".into())]));
    }

    #[test]
    fn test_split_cond_branches_double_divider_is_error() {
        let nodes = vec![Node::Divider, Node::Divider];
        assert!(matches!(
            split_cond_branches(nodes),
            Err(ParseError::CondBranches)
        ));
    }

    #[test]
    fn test_rollup_drops_leading_content() {
        let nodes = vec![
            Node::Raw("dropped".into()),
            Node::Case {
                left: Operand::Lit("1".into()),
                op: None,
                right: None,
                body: vec![],
            },
            Node::Raw("one".into()),
        ];
        let grouped = rollup_switch(nodes);
        assert_eq!(grouped.len(), 1);
        match &grouped[0] {
            Node::Case { body, .. } => assert_eq!(body, &vec![Node::Raw("one".into())]),
            other => panic!("expected case, got {:?}", other),
        }
    }

    #[test]
    fn test_rollup_groups_until_next_case() {
        let case = |v: &str| Node::Case {
            left: Operand::Lit(v.into()),
            op: None,
            right: None,
            body: vec![],
        };
        let nodes = vec![
            case("1"),
            Node::Raw("one".into()),
            case("2"),
            Node::Raw("two".into()),
            Node::Default(vec![]),
            Node::Raw("other".into()),
        ];
        let grouped = rollup_switch(nodes);
        assert_eq!(grouped.len(), 3);
        match &grouped[2] {
            Node::Default(body) => assert_eq!(body, &vec![Node::Raw("other".into())]),
            other => panic!("expected default, got {:?}", other),
        }
    }
}
