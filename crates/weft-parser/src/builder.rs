//! Region scanning and tree building.
//!
//! The scanner walks the preprocessed template, splitting it into literal
//! text and `{% ... %}` control regions by plain substring search (a region
//! never contains a nested `{%`). Each region is classified and either
//! appended to the current node list or, for conditionals, loops and
//! switches, used to recurse into a nested body.
//!
//! Because all three block constructs share the same delimiters, a single
//! depth counter cannot tell a loop's `endfor` from an enclosing
//! conditional's `endif`. The builder keeps one counter per construct kind
//! and snapshots all three before each recursion; the recursion consumes
//! regions until its construct's terminator brings the live counters back
//! to the snapshot, then control bubbles up to the caller.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{self, Node, Tree};
use crate::classify::{classify, Ctl};
use crate::error::{ParseError, Result};

const CTL_OPEN: &str = "{%";
const CTL_CLOSE: &str = "%}";

static RE_CUT_COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t*\{#[^#]*#\}\n*").unwrap());
static RE_CUT_FMT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*").unwrap());

/// Parses template source into a [`Tree`].
///
/// With `keep_fmt` unset, runs of newlines and the indentation following
/// them are collapsed and the whole document is trimmed, so formatting
/// whitespace between constructs does not leak into the output.
///
/// # Errors
///
/// Returns a [`ParseError`] for unterminated regions, unknown or malformed
/// constructs, over-complex conditions and unbalanced terminators.
pub fn parse(src: &str, keep_fmt: bool) -> Result<Tree> {
    let mut parser = Parser::new(src, keep_fmt);
    parser.strip_comments();
    parser.cut_fmt();

    let mut nodes = Vec::new();
    let target = parser.snapshot();
    parser.parse_region(&mut nodes, 0, target)?;
    Ok(Tree { nodes })
}

/// Reads and parses a template file.
pub fn parse_file(path: impl AsRef<Path>, keep_fmt: bool) -> Result<Tree> {
    let src = fs::read_to_string(path)?;
    parse(&src, keep_fmt)
}

/// Snapshot of the three construct-depth counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    cond: i32,
    lp: i32,
    sw: i32,
}

impl Target {
    fn is_zero(self) -> bool {
        self.cond == 0 && self.lp == 0 && self.sw == 0
    }
}

struct Parser {
    tpl: String,
    keep_fmt: bool,
    // Live depth counters: conditions, loops, switches.
    cc: i32,
    cl: i32,
    cs: i32,
}

impl Parser {
    fn new(src: &str, keep_fmt: bool) -> Self {
        Parser {
            tpl: src.to_string(),
            keep_fmt,
            cc: 0,
            cl: 0,
            cs: 0,
        }
    }

    fn strip_comments(&mut self) {
        self.tpl = RE_CUT_COMMENTS.replace_all(&self.tpl, "").into_owned();
    }

    fn cut_fmt(&mut self) {
        if self.keep_fmt {
            return;
        }
        self.tpl = RE_CUT_FMT.replace_all(&self.tpl, "").into_owned();
        self.tpl = self
            .tpl
            .trim_matches(|c| c == ' ' || c == '\t' || c == '\n')
            .to_string();
    }

    fn snapshot(&self) -> Target {
        Target {
            cond: self.cc,
            lp: self.cl,
            sw: self.cs,
        }
    }

    fn find(&self, pat: &str, from: usize) -> Option<usize> {
        self.tpl[from..].find(pat).map(|i| i + from)
    }

    /// Consumes regions starting at `offset` until the live counters come
    /// back to `target` (a zero target, i.e. the document root, runs to end
    /// of input instead). Returns the offset just past the consumed input.
    fn parse_region(&mut self, nodes: &mut Vec<Node>, offset: usize, target: Target) -> Result<usize> {
        let mut o = offset;
        let mut i = offset;
        let mut in_ctl = false;
        while self.snapshot() != target || target.is_zero() {
            match self.find(CTL_OPEN, i) {
                None => {
                    if in_ctl {
                        return Err(ParseError::UnterminatedCtl);
                    }
                    push_raw(nodes, &self.tpl[o..]);
                    o = self.tpl.len();
                    if self.snapshot() != target {
                        // End of input with a construct still open.
                        return Err(ParseError::UnterminatedCtl);
                    }
                    break;
                }
                Some(open) => {
                    if in_ctl {
                        let close = self
                            .find(CTL_CLOSE, open)
                            .ok_or(ParseError::UnterminatedCtl)?;
                        let end = close + CTL_CLOSE.len();
                        let (next, up) = self.process_ctl(nodes, o, end)?;
                        o = next;
                        i = next;
                        in_ctl = false;
                        if up {
                            break;
                        }
                    } else {
                        push_raw(nodes, &self.tpl[o..open]);
                        o = open;
                        i = open;
                        in_ctl = true;
                    }
                }
            }
        }
        Ok(o)
    }

    /// Handles one classified region. Returns the offset just past it (or,
    /// for block constructs, past the whole nested body) and whether the
    /// region was a terminator that must bubble control up to the caller.
    fn process_ctl(&mut self, nodes: &mut Vec<Node>, start: usize, end: usize) -> Result<(usize, bool)> {
        let ctl = {
            let trimmed =
                self.tpl[start..end].trim_matches(|c| c == '{' || c == '}' || c == '%' || c == ' ');
            classify(trimmed)?
        };

        match ctl {
            Ctl::Print {
                operand,
                prefix,
                suffix,
                mods,
            } => {
                nodes.push(Node::Print {
                    operand,
                    prefix,
                    suffix,
                    mods,
                });
                Ok((end, false))
            }
            Ctl::CtxSet { var, src, kind } => {
                nodes.push(Node::CtxSet { var, src, kind });
                Ok((end, false))
            }
            Ctl::Counter { name, op } => {
                nodes.push(Node::Counter { name, op });
                Ok((end, false))
            }

            Ctl::If(test) => {
                let target = self.snapshot();
                self.cc += 1;
                let mut body = Vec::new();
                let off = self.parse_region(&mut body, end, target)?;
                let (on_true, on_false) = ast::split_cond_branches(body)?;
                let mut children = vec![Node::CondTrue(on_true)];
                if let Some(on_false) = on_false {
                    children.push(Node::CondFalse(on_false));
                }
                nodes.push(Node::Cond { test, children });
                Ok((off, false))
            }
            Ctl::Else => {
                nodes.push(Node::Divider);
                Ok((end, false))
            }
            Ctl::EndIf => {
                if self.cc == 0 {
                    return Err(ParseError::UnexpectedTerminator("endif"));
                }
                self.cc -= 1;
                Ok((end, true))
            }

            Ctl::LoopRange { key, val, src, sep } => {
                let target = self.snapshot();
                self.cl += 1;
                let mut body = Vec::new();
                let off = self.parse_region(&mut body, end, target)?;
                nodes.push(Node::LoopRange {
                    key,
                    val,
                    src,
                    sep,
                    body,
                });
                Ok((off, false))
            }
            Ctl::LoopCount {
                var,
                init,
                cond_op,
                limit,
                step,
                sep,
            } => {
                let target = self.snapshot();
                self.cl += 1;
                let mut body = Vec::new();
                let off = self.parse_region(&mut body, end, target)?;
                nodes.push(Node::LoopCount {
                    var,
                    init,
                    cond_op,
                    limit,
                    step,
                    sep,
                    body,
                });
                Ok((off, false))
            }
            Ctl::EndFor => {
                if self.cl == 0 {
                    return Err(ParseError::UnexpectedTerminator("endfor"));
                }
                self.cl -= 1;
                Ok((end, true))
            }
            Ctl::Break => {
                nodes.push(Node::Break);
                Ok((end, false))
            }
            Ctl::Continue => {
                nodes.push(Node::Continue);
                Ok((end, false))
            }

            Ctl::Switch(arg) => {
                let target = self.snapshot();
                self.cs += 1;
                let mut body = Vec::new();
                let off = self.parse_region(&mut body, end, target)?;
                nodes.push(Node::Switch {
                    arg,
                    children: ast::rollup_switch(body),
                });
                Ok((off, false))
            }
            Ctl::Case { left, op, right } => {
                nodes.push(Node::Case {
                    left,
                    op,
                    right,
                    body: Vec::new(),
                });
                Ok((end, false))
            }
            Ctl::Default => {
                nodes.push(Node::Default(Vec::new()));
                Ok((end, false))
            }
            Ctl::EndSwitch => {
                if self.cs == 0 {
                    return Err(ParseError::UnexpectedTerminator("endswitch"));
                }
                self.cs -= 1;
                Ok((end, true))
            }

            Ctl::Exit => {
                nodes.push(Node::Exit);
                Ok((end, false))
            }
        }
    }
}

fn push_raw(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::Raw(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CondTest, Op, Operand};

    #[test]
    fn test_parse_raw_only() {
        let tree = parse("hello world", false).unwrap();
        assert_eq!(tree.nodes(), &[Node::Raw("hello world".into())]);
    }

    #[test]
    fn test_parse_empty() {
        let tree = parse("", false).unwrap();
        assert!(tree.nodes().is_empty());
    }

    #[test]
    fn test_parse_print_between_raw() {
        let tree = parse("a {%= x %} b", false).unwrap();
        assert_eq!(tree.nodes().len(), 3);
        assert_eq!(tree.nodes()[0], Node::Raw("a ".into()));
        assert!(matches!(tree.nodes()[1], Node::Print { .. }));
        assert_eq!(tree.nodes()[2], Node::Raw(" b".into()));
    }

    #[test]
    fn test_parse_cond_with_else() {
        let tree = parse("{% if a == 1 %}T{% else %}F{% endif %}", false).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        match &tree.nodes()[0] {
            Node::Cond { test, children } => {
                assert_eq!(
                    test,
                    &CondTest::Compare {
                        left: Operand::Var("a".into()),
                        op: Op::Eq,
                        right: Operand::Lit("1".into()),
                    }
                );
                assert_eq!(children.len(), 2);
                assert_eq!(children[0], Node::CondTrue(vec![Node::Raw("T".into())]));
                assert_eq!(children[1], Node::CondFalse(vec![Node::Raw("F".into())]));
            }
            other => panic!("expected cond, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_cond_in_loop() {
        let src = "{% for v := range xs %}{% if v == 1 %}one{% endif %}{% endfor %}tail";
        let tree = parse(src, false).unwrap();
        assert_eq!(tree.nodes().len(), 2);
        match &tree.nodes()[0] {
            Node::LoopRange { body, .. } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Node::Cond { .. }));
            }
            other => panic!("expected range loop, got {:?}", other),
        }
        assert_eq!(tree.nodes()[1], Node::Raw("tail".into()));
    }

    #[test]
    fn test_parse_loop_in_both_cond_branches() {
        // The endfor of each nested loop must not terminate the outer if.
        let src = "{% if a == 1 %}\
                   {% for v := range xs %}x{% endfor %}\
                   {% else %}\
                   {% for v := range ys %}y{% endfor %}\
                   {% endif %}";
        let tree = parse(src, false).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        match &tree.nodes()[0] {
            Node::Cond { children, .. } => {
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected cond, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_switch_rollup() {
        let src = "{% switch x %}dropped{% case 1 %}one{% case 2 %}two{% default %}other{% endswitch %}";
        let tree = parse(src, false).unwrap();
        match &tree.nodes()[0] {
            Node::Switch { arg, children } => {
                assert_eq!(arg, &Some(Operand::Var("x".into())));
                assert_eq!(children.len(), 3);
                assert!(matches!(children[0], Node::Case { .. }));
                assert!(matches!(children[1], Node::Case { .. }));
                assert!(matches!(children[2], Node::Default(_)));
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unterminated_region() {
        assert!(matches!(
            parse("a {%= x", false),
            Err(ParseError::UnterminatedCtl)
        ));
    }

    #[test]
    fn test_parse_unterminated_cond() {
        assert!(matches!(
            parse("{% if a == 1 %}no end", false),
            Err(ParseError::UnterminatedCtl)
        ));
    }

    #[test]
    fn test_parse_stray_endif() {
        assert!(matches!(
            parse("x{% endif %}", false),
            Err(ParseError::UnexpectedTerminator("endif"))
        ));
    }

    #[test]
    fn test_parse_three_branches_is_error() {
        assert!(matches!(
            parse("{% if a == 1 %}a{% else %}b{% else %}c{% endif %}", false),
            Err(ParseError::CondBranches)
        ));
    }

    #[test]
    fn test_comments_are_stripped() {
        let tree = parse("a{# a comment #}b", false).unwrap();
        assert_eq!(tree.nodes(), &[Node::Raw("ab".into())]);
    }

    #[test]
    fn test_fmt_cut_collapses_newlines() {
        let tree = parse("line1\n\t\tline2\n", false).unwrap();
        assert_eq!(tree.nodes(), &[Node::Raw("line1line2".into())]);
    }

    #[test]
    fn test_keep_fmt_preserves_whitespace() {
        let tree = parse("line1\n\tline2", true).unwrap();
        assert_eq!(tree.nodes(), &[Node::Raw("line1\n\tline2".into())]);
    }

    #[test]
    fn test_parse_file_missing_is_error() {
        assert!(matches!(
            parse_file("/nonexistent/weft.tpl", false),
            Err(ParseError::Io(_))
        ));
    }
}
