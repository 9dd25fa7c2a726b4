//! Structure classification for control regions.
//!
//! The trimmed content of one `{% ... %}` region is tested against the
//! construct patterns in a fixed priority order: print, context binding,
//! counter, conditional, loop, switch, early exit. No match is a hard
//! parse error.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{CondTest, CounterOp, ModCall, Op, Operand, Step};
use crate::error::{ParseError, Result};

/// Classified content of one control region.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ctl {
    Print {
        operand: Operand,
        prefix: Option<String>,
        suffix: Option<String>,
        mods: Vec<ModCall>,
    },
    CtxSet {
        var: String,
        src: Operand,
        kind: Option<String>,
    },
    Counter {
        name: String,
        op: CounterOp,
    },
    If(CondTest),
    Else,
    EndIf,
    LoopRange {
        key: Option<String>,
        val: String,
        src: Operand,
        sep: Option<String>,
    },
    LoopCount {
        var: String,
        init: Operand,
        cond_op: Op,
        limit: Operand,
        step: Step,
        sep: Option<String>,
    },
    EndFor,
    Break,
    Continue,
    Switch(Option<Operand>),
    Case {
        left: Operand,
        op: Option<Op>,
        right: Option<Operand>,
    },
    Default,
    EndSwitch,
    Exit,
}

static RE_PRINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([jqhu]|[fF](?:\.\d+)?)?=\s*(.+)$").unwrap());
static RE_PRINT_PS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s+(?:prefix|pfx)\s+(\S+)\s+(?:suffix|sfx)\s+(\S+)$").unwrap()
});
static RE_PRINT_P: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+(?:prefix|pfx)\s+(\S+)$").unwrap());
static RE_PRINT_S: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+(?:suffix|sfx)\s+(\S+)$").unwrap());

static RE_CTX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^context\s+(\w+)\s*=\s*(.+?)(?:\s+as\s+(\w+))?$").unwrap());

static RE_COUNTER_STEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^counter\s+(\w+)\s*(\+\+|--|\+\d+|-\d+)$").unwrap());
static RE_COUNTER_SET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^counter\s+(\w+)(?:\s*=\s*(-?\d+))?$").unwrap());

static RE_COND_HELPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^if\s+(\w+)\(\s*(.*?)\s*\)$").unwrap());
static RE_COND_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^if\s+(.+?)\s*(==|!=|>=|<=|>|<)\s*(.+)$").unwrap());
static RE_COND_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^if\s+(\S+)$").unwrap());

static RE_LOOP_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^for\s+(?:(\w+)\s*,\s*)?(\w+)\s*:?=\s*range\s+(\S+)(?:\s+(?:separator|sep)\s+(.+))?$")
        .unwrap()
});
static RE_LOOP_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^for\s+(\w+)\s*:?=\s*([^;]+?)\s*;\s*\w+\s*(==|!=|>=|<=|>|<)\s*([^;]+?)\s*;\s*\w+\s*(\+\+|--)(?:\s+(?:separator|sep)\s+(.+))?$",
    )
    .unwrap()
});

static RE_SWITCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^switch(?:\s+(.+))?$").unwrap());
static RE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^case\s+(.+?)(?:\s*(==|!=|>=|<=|>|<)\s*(.+))?$").unwrap());

static RE_MOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)(?:\((.*)\))?$").unwrap());

/// Classifies one trimmed control region.
pub(crate) fn classify(t: &str) -> Result<Ctl> {
    // Print: optional output-mode prefix, then `=`.
    if let Some(caps) = RE_PRINT.captures(t) {
        let mode = caps.get(1).map(|m| m.as_str());
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return parse_print(rest, mode);
    }

    // Context binding.
    if let Some(caps) = RE_CTX.captures(t) {
        return Ok(Ctl::CtxSet {
            var: caps[1].to_string(),
            src: classify_operand(&caps[2]),
            kind: caps.get(3).map(|m| m.as_str().to_string()),
        });
    }

    // Counter declaration or mutation.
    if t.starts_with("counter") {
        if let Some(caps) = RE_COUNTER_STEP.captures(t) {
            let op = match &caps[2] {
                "++" => CounterOp::Add(1),
                "--" => CounterOp::Sub(1),
                step => {
                    let n: i64 = step[1..].parse().map_err(|_| bad(t))?;
                    if step.starts_with('+') {
                        CounterOp::Add(n)
                    } else {
                        CounterOp::Sub(n)
                    }
                }
            };
            return Ok(Ctl::Counter {
                name: caps[1].to_string(),
                op,
            });
        }
        if let Some(caps) = RE_COUNTER_SET.captures(t) {
            let init = match caps.get(2) {
                Some(m) => m.as_str().parse().map_err(|_| bad(t))?,
                None => 0,
            };
            return Ok(Ctl::Counter {
                name: caps[1].to_string(),
                op: CounterOp::Init(init),
            });
        }
        return Err(bad(t));
    }

    // Conditional and its terminators.
    if t == "else" {
        return Ok(Ctl::Else);
    }
    if t == "endif" {
        return Ok(Ctl::EndIf);
    }
    if t == "if" || t.starts_with("if ") {
        // A single registered helper call is the only accepted call shape.
        if let Some(caps) = RE_COND_HELPER.captures(t) {
            return Ok(Ctl::If(CondTest::Helper {
                name: caps[1].to_string(),
                args: parse_args(&caps[2]),
            }));
        }
        // Boolean composition is rejected rather than parsed.
        if t.contains("&&") || t.contains("||") || t.contains('(') || t.contains(')') {
            return Err(ParseError::CondComplex(t.to_string()));
        }
        if let Some(caps) = RE_COND_EXPR.captures(t) {
            let op = Op::parse(&caps[2]).ok_or_else(|| bad(t))?;
            return Ok(Ctl::If(CondTest::Compare {
                left: classify_operand(&caps[1]),
                op,
                right: classify_operand(&caps[3]),
            }));
        }
        if let Some(caps) = RE_COND_SINGLE.captures(t) {
            return Ok(Ctl::If(CondTest::Truthy(classify_operand(&caps[1]))));
        }
        return Err(bad(t));
    }

    // Loops and their terminators.
    if t == "endfor" {
        return Ok(Ctl::EndFor);
    }
    if t == "break" {
        return Ok(Ctl::Break);
    }
    if t == "continue" {
        return Ok(Ctl::Continue);
    }
    if t.starts_with("for") {
        if let Some(caps) = RE_LOOP_RANGE.captures(t) {
            let key = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .filter(|k| k != "_");
            return Ok(Ctl::LoopRange {
                key,
                val: caps[2].to_string(),
                src: classify_operand(&caps[3]),
                sep: caps.get(4).map(|m| unquote_or(m.as_str()).to_string()),
            });
        }
        if let Some(caps) = RE_LOOP_COUNT.captures(t) {
            let cond_op = Op::parse(&caps[3]).ok_or_else(|| bad(t))?;
            let step = if &caps[5] == "++" { Step::Inc } else { Step::Dec };
            return Ok(Ctl::LoopCount {
                var: caps[1].to_string(),
                init: classify_operand(&caps[2]),
                cond_op,
                limit: classify_operand(&caps[4]),
                step,
                sep: caps.get(6).map(|m| unquote_or(m.as_str()).to_string()),
            });
        }
        return Err(bad(t));
    }

    // Switch and its terminators.
    if t == "endswitch" {
        return Ok(Ctl::EndSwitch);
    }
    if t == "default" {
        return Ok(Ctl::Default);
    }
    if t == "switch" || t.starts_with("switch ") {
        let caps = RE_SWITCH.captures(t).ok_or_else(|| bad(t))?;
        return Ok(Ctl::Switch(caps.get(1).map(|m| classify_operand(m.as_str()))));
    }
    if t.starts_with("case") {
        let caps = RE_CASE.captures(t).ok_or_else(|| bad(t))?;
        let op = match caps.get(2) {
            Some(m) => Some(Op::parse(m.as_str()).ok_or_else(|| bad(t))?),
            None => None,
        };
        return Ok(Ctl::Case {
            left: classify_operand(&caps[1]),
            op,
            right: caps.get(3).map(|m| classify_operand(m.as_str())),
        });
    }

    if t == "exit" {
        return Ok(Ctl::Exit);
    }

    Err(bad(t))
}

fn bad(t: &str) -> ParseError {
    ParseError::BadCtl(t.to_string())
}

/// Parses a print body: expression, modifier chain and the optional
/// prefix/suffix clauses; lowers the output-mode prefix into a leading
/// builtin modifier call.
fn parse_print(rest: &str, mode: Option<&str>) -> Result<Ctl> {
    let (expr, prefix, suffix) = if let Some(caps) = RE_PRINT_PS.captures(rest) {
        (
            caps[1].to_string(),
            Some(unquote_or(&caps[2]).to_string()),
            Some(unquote_or(&caps[3]).to_string()),
        )
    } else if let Some(caps) = RE_PRINT_P.captures(rest) {
        (
            caps[1].to_string(),
            Some(unquote_or(&caps[2]).to_string()),
            None,
        )
    } else if let Some(caps) = RE_PRINT_S.captures(rest) {
        (
            caps[1].to_string(),
            None,
            Some(unquote_or(&caps[2]).to_string()),
        )
    } else {
        (rest.to_string(), None, None)
    };

    let segments = split_top(&expr, '|');
    let operand = classify_operand(segments[0]);
    let mut mods = Vec::new();
    if let Some(mode) = mode {
        mods.push(mode_call(mode));
    }
    for seg in &segments[1..] {
        mods.push(parse_mod_call(seg.trim())?);
    }

    Ok(Ctl::Print {
        operand,
        prefix,
        suffix,
        mods,
    })
}

/// Maps a print output-mode prefix to its builtin modifier.
fn mode_call(mode: &str) -> ModCall {
    let (name, args) = match mode.as_bytes()[0] {
        b'j' => ("jsonEscape", vec![]),
        b'q' => ("jsonQuote", vec![]),
        b'h' => ("htmlEscape", vec![]),
        b'u' => ("urlEncode", vec![]),
        b'f' | b'F' => {
            let base = if mode.starts_with('f') {
                ("round", "roundPrec")
            } else {
                ("ceil", "ceilPrec")
            };
            match mode.split_once('.') {
                Some((_, prec)) => (base.1, vec![Operand::Lit(prec.to_string())]),
                None => (base.0, vec![]),
            }
        }
        _ => unreachable!("mode prefix validated by RE_PRINT"),
    };
    ModCall {
        name: name.to_string(),
        args,
    }
}

/// Parses one `name` / `name(args)` modifier segment.
fn parse_mod_call(seg: &str) -> Result<ModCall> {
    let caps = RE_MOD.captures(seg).ok_or_else(|| bad(seg))?;
    let args = match caps.get(2) {
        Some(inner) => parse_args(inner.as_str()),
        None => Vec::new(),
    };
    Ok(ModCall {
        name: caps[1].to_string(),
        args,
    })
}

/// Parses a comma-separated argument list, classifying each argument.
fn parse_args(inner: &str) -> Vec<Operand> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    split_top(inner, ',')
        .into_iter()
        .map(classify_operand)
        .collect()
}

/// Classifies one operand: quoted strings, numbers and booleans are
/// parse-time literals, everything else is a variable path.
pub(crate) fn classify_operand(raw: &str) -> Operand {
    let t = raw.trim();
    if let Some(inner) = unquote(t) {
        return Operand::Lit(inner.to_string());
    }
    if t.parse::<i64>().is_ok() || t.parse::<f64>().is_ok() || t == "true" || t == "false" {
        return Operand::Lit(t.to_string());
    }
    Operand::Var(t.to_string())
}

/// Splits on `sep` at the top level only: separators inside quotes or
/// parentheses belong to the segment.
fn split_top(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                c if c == sep && depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(t: &str) -> Option<&str> {
    let b = t.as_bytes();
    if b.len() >= 2 && (b[0] == b'"' || b[0] == b'\'') && b[b.len() - 1] == b[0] {
        Some(&t[1..t.len() - 1])
    } else {
        None
    }
}

fn unquote_or(t: &str) -> &str {
    unquote(t).unwrap_or(t)
}
