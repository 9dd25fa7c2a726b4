//! Value modifiers.
//!
//! A print expression pipes its value through an ordered chain of named
//! modifiers. Each modifier receives the current value and its resolved
//! arguments; returning `Some` replaces the value, `None` passes it
//! through unchanged, and an error aborts the render.
//!
//! The builtins cover the print output modes (JSON/HTML escaping, URL
//! encoding, float rounding) and the zero-value fallbacks
//! (`default`, `ifThen`, `ifThenElse`).

use std::borrow::Cow;

use crate::engine::Engine;
use crate::error::{RenderError, Result};
use crate::inspect::{Scalar, Val};

/// A value modifier: replaces or passes through the piped value.
pub type ModFn = fn(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>>;

pub(crate) fn register_builtins(engine: &Engine) {
    engine.register_mod_fn("default", Some("def"), mod_default);
    engine.register_mod_fn("ifThen", Some("if"), mod_if_then);
    engine.register_mod_fn("ifThenElse", Some("ifel"), mod_if_then_else);

    engine.register_mod_fn("jsonEscape", Some("je"), mod_json_escape);
    engine.register_mod_fn("jsonQuote", Some("jq"), mod_json_quote);
    engine.register_mod_fn("htmlEscape", Some("he"), mod_html_escape);
    engine.register_mod_fn("urlEncode", Some("ue"), mod_url_encode);

    engine.register_mod_fn("round", None, mod_round);
    engine.register_mod_fn("roundPrec", None, mod_round_prec);
    engine.register_mod_fn("ceil", None, mod_ceil);
    engine.register_mod_fn("ceilPrec", None, mod_ceil_prec);
    engine.register_mod_fn("floor", None, mod_floor);
    engine.register_mod_fn("floorPrec", None, mod_floor_prec);
}

// ============================================================================
// Fallbacks
// ============================================================================

fn mod_default(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    let fallback = args.first().ok_or(RenderError::ModArgs {
        name: "default",
        need: 1,
        got: 0,
    })?;
    if val.is_zero() {
        Ok(Some(fallback.to_static()))
    } else {
        Ok(None)
    }
}

fn mod_if_then(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    let then = args.first().ok_or(RenderError::ModArgs {
        name: "ifThen",
        need: 1,
        got: 0,
    })?;
    match val.as_bool() {
        Some(true) => Ok(Some(then.to_static())),
        _ => Ok(None),
    }
}

fn mod_if_then_else(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    if args.len() < 2 {
        return Err(RenderError::ModArgs {
            name: "ifThenElse",
            need: 2,
            got: args.len(),
        });
    }
    match val.as_bool() {
        Some(true) => Ok(Some(args[0].to_static())),
        Some(false) => Ok(Some(args[1].to_static())),
        None => Ok(None),
    }
}

// ============================================================================
// Escapes
// ============================================================================

fn mod_json_escape(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    match val.to_text() {
        Some(text) => Ok(Some(Val::Str(Cow::Owned(json_escape(&text))))),
        None => Ok(None),
    }
}

fn mod_json_quote(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    match val.to_text() {
        Some(text) => {
            let mut out = String::with_capacity(text.len() + 2);
            out.push('"');
            out.push_str(&json_escape(&text));
            out.push('"');
            Ok(Some(Val::Str(Cow::Owned(out))))
        }
        None => Ok(None),
    }
}

fn mod_html_escape(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    match val.to_text() {
        Some(text) => Ok(Some(Val::Str(Cow::Owned(html_escape(&text))))),
        None => Ok(None),
    }
}

fn mod_url_encode(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    match val.to_text() {
        Some(text) => Ok(Some(Val::Str(Cow::Owned(url_encode(&text))))),
        None => Ok(None),
    }
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

// ============================================================================
// Rounding
// ============================================================================

fn float_of(val: &Val<'_>) -> Option<f64> {
    match val.scalar()? {
        Scalar::Float(f) => Some(f),
        Scalar::Int(i) => Some(i as f64),
        _ => None,
    }
}

fn prec_of(args: &[Val<'_>]) -> i32 {
    match args.first().and_then(|a| a.scalar()) {
        Some(Scalar::Int(i)) => i as i32,
        Some(Scalar::Float(f)) => f as i32,
        Some(Scalar::Str(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn mod_round(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    Ok(float_of(val).map(|f| Val::Float(f.round())))
}

fn mod_round_prec(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    let p = 10f64.powi(prec_of(args));
    Ok(float_of(val).map(|f| Val::Float((f * p).trunc() / p)))
}

fn mod_ceil(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    Ok(float_of(val).map(|f| Val::Float(f.ceil())))
}

fn mod_ceil_prec(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    let p = 10f64.powi(prec_of(args));
    Ok(float_of(val).map(|f| Val::Float((f * p).ceil() / p)))
}

fn mod_floor(val: &Val<'_>, _args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    Ok(float_of(val).map(|f| Val::Float(f.floor())))
}

fn mod_floor_prec(val: &Val<'_>, args: &[Val<'_>]) -> Result<Option<Val<'static>>> {
    let p = 10f64.powi(prec_of(args));
    Ok(float_of(val).map(|f| Val::Float((f * p).floor() / p)))
}
