//! Generic read access into host values.
//!
//! The renderer never owns the data it renders: callers bind references to
//! their own values into a [`Ctx`](crate::Ctx), and the engine reads them
//! through the [`Inspect`] trait family. A value exposes its shape as a
//! [`ValueView`] — scalar, sequence or mapping — and dotted paths are
//! resolved by walking members and numeric indices through that view.
//!
//! Implementations are provided for the std scalars, `String`, `&str`,
//! `Vec`, `BTreeMap`/`HashMap` with string keys, `Option`, and
//! `serde_json::Value` for callers with already-structured data.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Scalar view of a host value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(&'a [u8]),
    Null,
}

/// Shape-tagged view of a host value.
pub enum ValueView<'a> {
    Scalar(Scalar<'a>),
    Seq(&'a dyn Seq),
    Map(&'a dyn Map),
}

/// Read-only inspection of an arbitrary host value.
///
/// The single method classifies the value's shape; the renderer drives all
/// member access, iteration and comparison through the returned view.
pub trait Inspect: fmt::Debug + Send + Sync {
    fn view(&self) -> ValueView<'_>;
}

/// Sequence-shaped values: ordered and index-addressable.
pub trait Seq: Inspect {
    fn len(&self) -> usize;
    fn at(&self, idx: usize) -> Option<&dyn Inspect>;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mapping-shaped values: keyed, iterable in entry order.
pub trait Map: Inspect {
    fn len(&self) -> usize;
    fn key_at(&self, idx: usize) -> Option<&str>;
    fn get(&self, key: &str) -> Option<&dyn Inspect>;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walks a dotted path from a root value: mapping segments are member
/// names, sequence segments are numeric indices.
pub fn resolve_path<'a>(root: &'a dyn Inspect, path: &str) -> Option<&'a dyn Inspect> {
    let mut current = root;
    for part in path.split('.') {
        current = match current.view() {
            ValueView::Map(map) => map.get(part)?,
            ValueView::Seq(seq) => {
                let idx: usize = part.parse().ok()?;
                seq.at(idx)?
            }
            ValueView::Scalar(_) => return None,
        };
    }
    Some(current)
}

// ============================================================================
// Pipeline values
// ============================================================================

/// A value flowing through a print expression's modifier pipeline.
///
/// Resolution produces borrowed values; modifiers that replace the value
/// return owned ones (`Val<'static>`). [`Val::None`] marks a missing
/// variable — a modifier such as `default` may still rescue it.
#[derive(Debug, Clone)]
pub enum Val<'a> {
    None,
    Str(Cow<'a, str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Cow<'a, [u8]>),
    Value(&'a dyn Inspect),
}

impl<'a> Val<'a> {
    /// Scalar view of this value, if it is scalar-shaped.
    pub fn scalar(&self) -> Option<Scalar<'_>> {
        match self {
            Val::None => None,
            Val::Str(s) => Some(Scalar::Str(s)),
            Val::Int(i) => Some(Scalar::Int(*i)),
            Val::Float(f) => Some(Scalar::Float(*f)),
            Val::Bool(b) => Some(Scalar::Bool(*b)),
            Val::Bytes(b) => Some(Scalar::Bytes(b)),
            Val::Value(v) => match v.view() {
                ValueView::Scalar(s) => Some(s),
                _ => None,
            },
        }
    }

    /// Boolean value, for bool-gated modifiers.
    pub fn as_bool(&self) -> Option<bool> {
        match self.scalar() {
            Some(Scalar::Bool(b)) => Some(b),
            _ => None,
        }
    }

    /// True when printing this value would produce nothing: a missing
    /// variable, an empty string or byte sequence, or null.
    pub fn is_empty(&self) -> bool {
        match self {
            Val::None => true,
            Val::Str(s) => s.is_empty(),
            Val::Bytes(b) => b.is_empty(),
            Val::Int(_) | Val::Float(_) | Val::Bool(_) => false,
            Val::Value(v) => matches!(
                v.view(),
                ValueView::Scalar(Scalar::Null)
                    | ValueView::Scalar(Scalar::Str(""))
                    | ValueView::Scalar(Scalar::Bytes(&[]))
            ),
        }
    }

    /// True for the zero value of each scalar shape; what the `default`
    /// modifier replaces.
    pub fn is_zero(&self) -> bool {
        match self.scalar() {
            None => matches!(self, Val::None),
            Some(Scalar::Int(i)) => i == 0,
            Some(Scalar::Float(f)) => f == 0.0,
            Some(Scalar::Bool(b)) => !b,
            Some(Scalar::Str(s)) => s.is_empty(),
            Some(Scalar::Bytes(b)) => b.is_empty(),
            Some(Scalar::Null) => true,
        }
    }

    /// Truthiness for bare `if x` conditions: non-zero scalars and
    /// non-empty sequences/mappings.
    pub fn truthy(&self) -> bool {
        match self {
            Val::Value(v) => match v.view() {
                ValueView::Scalar(_) => !self.is_zero(),
                ValueView::Seq(s) => !s.is_empty(),
                ValueView::Map(m) => !m.is_empty(),
            },
            _ => !self.is_zero(),
        }
    }

    /// Textual form of a scalar-shaped value.
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Val::None => None,
            Val::Str(s) => Some(Cow::Borrowed(s.as_ref())),
            Val::Int(i) => Some(Cow::Owned(i.to_string())),
            Val::Float(f) => Some(Cow::Owned(f.to_string())),
            Val::Bool(b) => Some(Cow::Owned(b.to_string())),
            Val::Bytes(b) => Some(String::from_utf8_lossy(b)),
            Val::Value(v) => match v.view() {
                ValueView::Scalar(s) => scalar_to_text(s),
                _ => None,
            },
        }
    }

    /// Detaches the value from its borrows, scalarizing inspected values.
    /// Non-scalar shapes have no owned form and collapse to [`Val::None`].
    pub fn to_static(&self) -> Val<'static> {
        match self {
            Val::None => Val::None,
            Val::Str(s) => Val::Str(Cow::Owned(s.clone().into_owned())),
            Val::Int(i) => Val::Int(*i),
            Val::Float(f) => Val::Float(*f),
            Val::Bool(b) => Val::Bool(*b),
            Val::Bytes(b) => Val::Bytes(Cow::Owned(b.clone().into_owned())),
            Val::Value(v) => match v.view() {
                ValueView::Scalar(Scalar::Str(s)) => Val::Str(Cow::Owned(s.to_string())),
                ValueView::Scalar(Scalar::Int(i)) => Val::Int(i),
                ValueView::Scalar(Scalar::Float(f)) => Val::Float(f),
                ValueView::Scalar(Scalar::Bool(b)) => Val::Bool(b),
                ValueView::Scalar(Scalar::Bytes(b)) => Val::Bytes(Cow::Owned(b.to_vec())),
                _ => Val::None,
            },
        }
    }
}

fn scalar_to_text(s: Scalar<'_>) -> Option<Cow<'_, str>> {
    match s {
        Scalar::Str(s) => Some(Cow::Borrowed(s)),
        Scalar::Int(i) => Some(Cow::Owned(i.to_string())),
        Scalar::Float(f) => Some(Cow::Owned(f.to_string())),
        Scalar::Bool(b) => Some(Cow::Owned(b.to_string())),
        Scalar::Bytes(b) => Some(String::from_utf8_lossy(b)),
        Scalar::Null => Some(Cow::Borrowed("")),
    }
}

// ============================================================================
// Std implementations
// ============================================================================

impl Inspect for String {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Str(self))
    }
}

impl Inspect for &str {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Str(*self))
    }
}

impl Inspect for i64 {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Int(*self))
    }
}

impl Inspect for i32 {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Int(i64::from(*self)))
    }
}

impl Inspect for u64 {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Int(*self as i64))
    }
}

impl Inspect for usize {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Int(*self as i64))
    }
}

impl Inspect for f64 {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Float(*self))
    }
}

impl Inspect for f32 {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Float(f64::from(*self)))
    }
}

impl Inspect for bool {
    fn view(&self) -> ValueView<'_> {
        ValueView::Scalar(Scalar::Bool(*self))
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn view(&self) -> ValueView<'_> {
        ValueView::Seq(self)
    }
}

impl<T: Inspect> Seq for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn at(&self, idx: usize) -> Option<&dyn Inspect> {
        self.get(idx).map(|v| v as &dyn Inspect)
    }
}

impl<T: Inspect> Inspect for BTreeMap<String, T> {
    fn view(&self) -> ValueView<'_> {
        ValueView::Map(self)
    }
}

impl<T: Inspect> Map for BTreeMap<String, T> {
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn key_at(&self, idx: usize) -> Option<&str> {
        self.keys().nth(idx).map(|k| k.as_str())
    }

    fn get(&self, key: &str) -> Option<&dyn Inspect> {
        BTreeMap::get(self, key).map(|v| v as &dyn Inspect)
    }
}

impl<T: Inspect> Inspect for HashMap<String, T> {
    fn view(&self) -> ValueView<'_> {
        ValueView::Map(self)
    }
}

impl<T: Inspect> Map for HashMap<String, T> {
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn key_at(&self, idx: usize) -> Option<&str> {
        self.keys().nth(idx).map(|k| k.as_str())
    }

    fn get(&self, key: &str) -> Option<&dyn Inspect> {
        HashMap::get(self, key).map(|v| v as &dyn Inspect)
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn view(&self) -> ValueView<'_> {
        match self {
            Some(v) => v.view(),
            None => ValueView::Scalar(Scalar::Null),
        }
    }
}

// ============================================================================
// serde_json::Value
// ============================================================================

impl Inspect for serde_json::Value {
    fn view(&self) -> ValueView<'_> {
        use serde_json::Value;
        match self {
            Value::Null => ValueView::Scalar(Scalar::Null),
            Value::Bool(b) => ValueView::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ValueView::Scalar(Scalar::Int(i))
                } else if let Some(f) = n.as_f64() {
                    ValueView::Scalar(Scalar::Float(f))
                } else {
                    ValueView::Scalar(Scalar::Null)
                }
            }
            Value::String(s) => ValueView::Scalar(Scalar::Str(s)),
            Value::Array(_) => ValueView::Seq(self),
            Value::Object(_) => ValueView::Map(self),
        }
    }
}

impl Seq for serde_json::Value {
    fn len(&self) -> usize {
        self.as_array().map_or(0, |a| a.len())
    }

    fn at(&self, idx: usize) -> Option<&dyn Inspect> {
        self.as_array()?.get(idx).map(|v| v as &dyn Inspect)
    }
}

impl Map for serde_json::Value {
    fn len(&self) -> usize {
        self.as_object().map_or(0, |o| o.len())
    }

    fn key_at(&self, idx: usize) -> Option<&str> {
        self.as_object()?.keys().nth(idx).map(|k| k.as_str())
    }

    fn get(&self, key: &str) -> Option<&dyn Inspect> {
        self.as_object()?.get(key).map(|v| v as &dyn Inspect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_path_through_json() {
        let data = json!({"user": {"name": "alice", "tags": ["a", "b"]}});
        let root: &dyn Inspect = &data;

        let name = resolve_path(root, "user.name").unwrap();
        assert!(matches!(name.view(), ValueView::Scalar(Scalar::Str("alice"))));

        let tag = resolve_path(root, "user.tags.1").unwrap();
        assert!(matches!(tag.view(), ValueView::Scalar(Scalar::Str("b"))));

        assert!(resolve_path(root, "user.missing").is_none());
        assert!(resolve_path(root, "user.name.deeper").is_none());
    }

    #[test]
    fn test_resolve_path_through_std_collections() {
        let items: Vec<String> = vec!["x".into(), "y".into()];
        let root: &dyn Inspect = &items;
        let second = resolve_path(root, "1").unwrap();
        assert!(matches!(second.view(), ValueView::Scalar(Scalar::Str("y"))));

        let mut map = BTreeMap::new();
        map.insert("count".to_string(), 3i64);
        let root: &dyn Inspect = &map;
        let count = resolve_path(root, "count").unwrap();
        assert!(matches!(count.view(), ValueView::Scalar(Scalar::Int(3))));
    }

    #[test]
    fn test_val_zero_values() {
        assert!(Val::None.is_zero());
        assert!(Val::Int(0).is_zero());
        assert!(Val::Float(0.0).is_zero());
        assert!(Val::Bool(false).is_zero());
        assert!(Val::Str(Cow::Borrowed("")).is_zero());
        assert!(!Val::Int(1).is_zero());
        assert!(!Val::Str(Cow::Borrowed("x")).is_zero());
    }

    #[test]
    fn test_val_empty_vs_zero() {
        // Zero numbers are zero but not empty: they still print as "0".
        assert!(!Val::Int(0).is_empty());
        assert!(!Val::Bool(false).is_empty());
        assert!(Val::None.is_empty());
        assert!(Val::Str(Cow::Borrowed("")).is_empty());
    }

    #[test]
    fn test_val_to_text() {
        assert_eq!(Val::Int(7).to_text().unwrap(), "7");
        assert_eq!(Val::Float(1.5).to_text().unwrap(), "1.5");
        assert_eq!(Val::Bool(true).to_text().unwrap(), "true");
        assert!(Val::None.to_text().is_none());
    }

    #[test]
    fn test_truthy_on_collections() {
        let empty: Vec<i64> = vec![];
        let full = vec![1i64];
        assert!(!Val::Value(&empty).truthy());
        assert!(Val::Value(&full).truthy());
        assert!(!Val::Value(&serde_json::Value::Null).truthy());
    }
}
