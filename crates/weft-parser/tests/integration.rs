//! Integration tests for the template parser.

use proptest::prelude::*;

use weft_parser::{parse, CondTest, Node, Op, Operand, ParseError, Step};

// =============================================================================
// Whole-template shapes
// =============================================================================

#[test]
fn raw_template_round_trips() {
    let tree = parse("no control structures here", false).unwrap();
    match tree.nodes() {
        [Node::Raw(text)] => assert_eq!(text, "no control structures here"),
        other => panic!("expected single raw node, got {:?}", other),
    }
}

#[test]
fn deeply_nested_blocks_terminate_at_their_own_level() {
    let src = "{% switch %}\
               {% case a == 1 %}\
               {% for v := range xs %}\
               {% if v == 2 %}two{% else %}other{% endif %}\
               {% endfor %}\
               {% default %}none\
               {% endswitch %}";
    let tree = parse(src, false).unwrap();
    assert_eq!(tree.nodes().len(), 1);
    let children = match &tree.nodes()[0] {
        Node::Switch { arg: None, children } => children,
        other => panic!("expected switch, got {:?}", other),
    };
    assert_eq!(children.len(), 2);
    let body = match &children[0] {
        Node::Case { body, .. } => body,
        other => panic!("expected case, got {:?}", other),
    };
    match &body[0] {
        Node::LoopRange { body, .. } => assert!(matches!(body[0], Node::Cond { .. })),
        other => panic!("expected loop, got {:?}", other),
    }
}

#[test]
fn sibling_loops_do_not_share_termination() {
    let src = "{% for a := range xs %}1{% endfor %}{% for b := range ys %}2{% endfor %}";
    let tree = parse(src, false).unwrap();
    assert_eq!(tree.nodes().len(), 2);
    assert!(matches!(tree.nodes()[0], Node::LoopRange { .. }));
    assert!(matches!(tree.nodes()[1], Node::LoopRange { .. }));
}

#[test]
fn counting_loop_fields() {
    let tree = parse("{% for i := 0; i < 3; i++ %}{%= i %}{% endfor %}", false).unwrap();
    match &tree.nodes()[0] {
        Node::LoopCount {
            var,
            init,
            cond_op,
            limit,
            step,
            sep,
            body,
        } => {
            assert_eq!(var, "i");
            assert_eq!(init, &Operand::Lit("0".into()));
            assert_eq!(cond_op, &Op::Lt);
            assert_eq!(limit, &Operand::Lit("3".into()));
            assert_eq!(step, &Step::Inc);
            assert!(sep.is_none());
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected counting loop, got {:?}", other),
    }
}

#[test]
fn helper_condition_parses_with_args() {
    let tree = parse("{% if lenGt0(user.tags) %}tagged{% endif %}", false).unwrap();
    match &tree.nodes()[0] {
        Node::Cond { test, .. } => match test {
            CondTest::Helper { name, args } => {
                assert_eq!(name, "lenGt0");
                assert_eq!(args, &vec![Operand::Var("user.tags".into())]);
            }
            other => panic!("expected helper test, got {:?}", other),
        },
        other => panic!("expected cond, got {:?}", other),
    }
}

// =============================================================================
// Failure conditions
// =============================================================================

#[test]
fn unterminated_region_fails() {
    assert!(matches!(parse("{%= x", false), Err(ParseError::UnterminatedCtl)));
}

#[test]
fn unterminated_if_fails() {
    assert!(matches!(
        parse("{% if a == 1 %}", false),
        Err(ParseError::UnterminatedCtl)
    ));
}

#[test]
fn unterminated_bare_if_fails() {
    assert!(matches!(
        parse("{% if a %}", false),
        Err(ParseError::UnterminatedCtl)
    ));
}

#[test]
fn unterminated_nested_loop_fails() {
    assert!(matches!(
        parse("{% if a == 1 %}{% for v := range xs %}{% endif %}", false),
        Err(_)
    ));
}

#[test]
fn complex_condition_fails() {
    assert!(matches!(
        parse("{% if a == 1 || b == 2 %}x{% endif %}", false),
        Err(ParseError::CondComplex(_))
    ));
}

#[test]
fn unknown_construct_fails() {
    assert!(matches!(
        parse("{% frobnicate the widget %}", false),
        Err(ParseError::BadCtl(_))
    ));
}

// =============================================================================
// Dump stability
// =============================================================================

#[test]
fn dump_is_stable_across_reparses() {
    let src = "{% counter c %}\
               {% for i := 0; i < 3; i++ separator \"-\" %}\
               {% if i == 1 %}{%= i %}{% else %}{%= i|default(\"0\") %}{% endif %}\
               {% endfor %}\
               {% switch c %}{% case 0 %}zero{% default %}more{% endswitch %}";
    let first = parse(src, false).unwrap();
    let second = parse(src, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
    assert!(!first.to_string().is_empty());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    // A template with no control regions parses to raw nodes whose
    // concatenation reproduces the input exactly (formatting preserved).
    #[test]
    fn control_free_input_round_trips(src in "[a-zA-Z0-9 .,:;!?_-]{0,160}") {
        let tree = parse(&src, true).unwrap();
        let mut rebuilt = String::new();
        for node in tree.nodes() {
            match node {
                Node::Raw(text) => rebuilt.push_str(text),
                other => prop_assert!(false, "unexpected node {:?}", other),
            }
        }
        prop_assert_eq!(rebuilt, src);
    }
}
