//! Schema-driven snapshot and restore.
//!
//! Every model type declares a static table of [`Field`]s: the attribute
//! name, its [`FieldKind`], whether it is *long* (large and omittable), and
//! accessor functions that convert to and from a `serde_json::Value`. The
//! free functions here walk that table generically:
//!
//! - [`get_state`] with [`StateMode::Full`] produces a lossless snapshot.
//! - [`get_state`] with [`StateMode::Short`] skips long fields and lets the
//!   type add derived metadata instead (a message reports `contentLength`).
//! - [`load_state`] / [`from_state`] invert a *full* snapshot only. Feeding
//!   them a short snapshot is a caller error.
//!
//! ```ignore
//! let snapshot = httpflow::state::get_state(&flow, StateMode::Full);
//! let restored: HttpFlow = httpflow::state::from_state(&snapshot)?;
//! ```

use serde_json::{Map, Value};

use crate::error::StateError;

/// Which flavor of snapshot to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateMode {
    /// Every field, suitable for restore.
    #[default]
    Full,
    /// Long fields replaced by derived metadata.
    Short,
}

/// Value shape of a snapshot field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Float,
    Bool,
    /// Fixed-length list such as an HTTP version pair.
    Tuple,
    /// Ordered list of `[name, value]` pairs.
    Headers,
    /// Base64 encoded binary.
    Bytes,
    /// Another state object.
    Nested,
}

impl FieldKind {
    /// Whether `value` has the JSON shape this kind serializes to. Null is
    /// accepted here; nullability is decided by the field's setter.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::Str | FieldKind::Bytes, Value::String(_)) => true,
            (FieldKind::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldKind::Float, Value::Number(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Tuple | FieldKind::Headers, Value::Array(_)) => true,
            (FieldKind::Nested, Value::Object(_)) => true,
            _ => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FieldKind::Str => "a string",
            FieldKind::Int => "an integer",
            FieldKind::Float => "a number",
            FieldKind::Bool => "a boolean",
            FieldKind::Tuple => "a list",
            FieldKind::Headers => "a list of [name, value] pairs",
            FieldKind::Bytes => "a base64 string",
            FieldKind::Nested => "an object",
        }
    }
}

/// Read accessor for one field.
pub type Getter<T> = fn(&T, StateMode) -> Value;

/// Write accessor for one field.
pub type Setter<T> = fn(&mut T, &Value) -> Result<(), StateError>;

/// One entry of a type's snapshot schema.
pub struct Field<T> {
    pub name: &'static str,
    pub kind: FieldKind,
    pub long: bool,
    pub get: Getter<T>,
    pub set: Setter<T>,
}

impl<T> Field<T> {
    pub const fn new(name: &'static str, kind: FieldKind, get: Getter<T>, set: Setter<T>) -> Self {
        Self {
            name,
            kind,
            long: false,
            get,
            set,
        }
    }

    /// A field left out of short snapshots.
    pub const fn long(name: &'static str, kind: FieldKind, get: Getter<T>, set: Setter<T>) -> Self {
        Self {
            name,
            kind,
            long: true,
            get,
            set,
        }
    }
}

/// A type with a static snapshot schema.
pub trait StateObject: Default + 'static {
    /// Schema, in serialization order.
    const FIELDS: &'static [Field<Self>];

    /// Add derived entries to a short snapshot.
    fn short_state(&self, _state: &mut Map<String, Value>) {}
}

/// Snapshot `obj`.
pub fn get_state<T: StateObject>(obj: &T, mode: StateMode) -> Value {
    let mut state = Map::new();
    for field in T::FIELDS {
        if field.long && mode == StateMode::Short {
            continue;
        }
        state.insert(field.name.to_string(), (field.get)(obj, mode));
    }
    if mode == StateMode::Short {
        obj.short_state(&mut state);
    }
    Value::Object(state)
}

/// Restore a full snapshot into an existing object.
///
/// Absent fields restore as null.
pub fn load_state<T: StateObject>(obj: &mut T, state: &Value) -> Result<(), StateError> {
    let Some(map) = state.as_object() else {
        return Err(StateError::NotAnObject(json_type(state)));
    };
    for field in T::FIELDS {
        let value = map.get(field.name).unwrap_or(&Value::Null);
        if !field.kind.accepts(value) {
            return Err(StateError::TypeMismatch {
                field: field.name,
                expected: field.kind.describe(),
            });
        }
        (field.set)(obj, value)?;
    }
    Ok(())
}

/// Build a fresh object from a full snapshot.
pub fn from_state<T: StateObject>(state: &Value) -> Result<T, StateError> {
    let mut obj = T::default();
    load_state(&mut obj, state)?;
    Ok(obj)
}

/// Restore an optional nested object, loading in place when one exists so
/// that it keeps its identity.
pub(crate) fn load_nested<T: StateObject>(
    slot: &mut Option<T>,
    value: &Value,
) -> Result<(), StateError> {
    if value.is_null() {
        *slot = None;
        return Ok(());
    }
    match slot {
        Some(existing) => load_state(existing, value),
        None => {
            *slot = Some(from_state(value)?);
            Ok(())
        }
    }
}

pub(crate) fn get_nested<T: StateObject>(obj: Option<&T>, mode: StateMode) -> Value {
    obj.map_or(Value::Null, |obj| get_state(obj, mode))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// Conversions used by field accessors. The kind check in `load_state` has
// already run, so these only distinguish null from present and range-check.

pub(crate) fn to_str(field: &'static str, v: &Value) -> Result<String, StateError> {
    to_opt_str(field, v)?.ok_or(StateError::MissingField(field))
}

pub(crate) fn to_opt_str(field: &'static str, v: &Value) -> Result<Option<String>, StateError> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(StateError::TypeMismatch {
            field,
            expected: "a string",
        }),
    }
}

pub(crate) fn to_opt_f64(field: &'static str, v: &Value) -> Result<Option<f64>, StateError> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_f64().map(Some).ok_or(StateError::TypeMismatch {
            field,
            expected: "a number",
        }),
        _ => Err(StateError::TypeMismatch {
            field,
            expected: "a number",
        }),
    }
}

pub(crate) fn from_opt_f64(v: Option<f64>) -> Value {
    v.map_or(Value::Null, Value::from)
}

pub(crate) fn to_bool(field: &'static str, v: &Value) -> Result<bool, StateError> {
    match v {
        // older snapshots may lack flags entirely
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        _ => Err(StateError::TypeMismatch {
            field,
            expected: "a boolean",
        }),
    }
}

pub(crate) fn to_u64(field: &'static str, v: &Value) -> Result<u64, StateError> {
    match v {
        Value::Null => Err(StateError::MissingField(field)),
        Value::Number(n) => n.as_u64().ok_or(StateError::InvalidValue {
            field,
            reason: format!("{n} is not a non-negative integer"),
        }),
        _ => Err(StateError::TypeMismatch {
            field,
            expected: "an integer",
        }),
    }
}

pub(crate) fn to_u16(field: &'static str, v: &Value) -> Result<u16, StateError> {
    let n = to_u64(field, v)?;
    u16::try_from(n).map_err(|_| StateError::InvalidValue {
        field,
        reason: format!("{n} is out of range"),
    })
}

pub(crate) fn to_u8(field: &'static str, v: &Value) -> Result<u8, StateError> {
    let n = to_u64(field, v)?;
    u8::try_from(n).map_err(|_| StateError::InvalidValue {
        field,
        reason: format!("{n} is out of range"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        name: String,
        blob: Option<String>,
        count: u16,
        child: Option<Child>,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Child {
        flag: bool,
    }

    impl StateObject for Child {
        const FIELDS: &'static [Field<Self>] = &[Field::new(
            "flag",
            FieldKind::Bool,
            |c, _| Value::Bool(c.flag),
            |c, v| {
                c.flag = to_bool("flag", v)?;
                Ok(())
            },
        )];
    }

    impl StateObject for Sample {
        const FIELDS: &'static [Field<Self>] = &[
            Field::new(
                "name",
                FieldKind::Str,
                |s, _| Value::from(s.name.as_str()),
                |s, v| {
                    s.name = to_str("name", v)?;
                    Ok(())
                },
            ),
            Field::long(
                "blob",
                FieldKind::Str,
                |s, _| s.blob.clone().map_or(Value::Null, Value::from),
                |s, v| {
                    s.blob = to_opt_str("blob", v)?;
                    Ok(())
                },
            ),
            Field::new(
                "count",
                FieldKind::Int,
                |s, _| Value::from(s.count),
                |s, v| {
                    s.count = to_u16("count", v)?;
                    Ok(())
                },
            ),
            Field::new(
                "child",
                FieldKind::Nested,
                |s, mode| get_nested(s.child.as_ref(), mode),
                |s, v| load_nested(&mut s.child, v),
            ),
        ];

        fn short_state(&self, state: &mut Map<String, Value>) {
            state.insert(
                "blobLength".into(),
                self.blob.as_ref().map_or(Value::Null, |b| Value::from(b.len())),
            );
        }
    }

    fn sample() -> Sample {
        Sample {
            name: "one".into(),
            blob: Some("abcdef".into()),
            count: 7,
            child: Some(Child { flag: true }),
        }
    }

    #[test]
    fn test_full_state_round_trip() {
        let state = get_state(&sample(), StateMode::Full);
        assert_eq!(
            state,
            json!({"name": "one", "blob": "abcdef", "count": 7, "child": {"flag": true}})
        );
        assert_eq!(from_state::<Sample>(&state).unwrap(), sample());
    }

    #[test]
    fn test_short_state_replaces_long_fields() {
        let state = get_state(&sample(), StateMode::Short);
        assert!(state.get("blob").is_none());
        assert_eq!(state["blobLength"], 6);
        assert_eq!(state["child"], json!({"flag": true}));
    }

    #[test]
    fn test_load_state_type_mismatch() {
        let state = json!({"name": 5, "count": 1});
        assert_eq!(
            from_state::<Sample>(&state),
            Err(StateError::TypeMismatch {
                field: "name",
                expected: "a string",
            })
        );
    }

    #[test]
    fn test_load_state_missing_required_field() {
        let state = json!({"count": 1});
        assert_eq!(
            from_state::<Sample>(&state),
            Err(StateError::MissingField("name"))
        );
    }

    #[test]
    fn test_load_state_out_of_range() {
        let state = json!({"name": "x", "count": 70000});
        assert!(matches!(
            from_state::<Sample>(&state),
            Err(StateError::InvalidValue { field: "count", .. })
        ));
    }

    #[test]
    fn test_load_state_not_an_object() {
        assert_eq!(
            from_state::<Sample>(&json!([1, 2])),
            Err(StateError::NotAnObject("a list"))
        );
    }

    #[test]
    fn test_load_nested_clears_on_null() {
        let mut obj = sample();
        load_state(&mut obj, &json!({"name": "x", "count": 1, "child": null})).unwrap();
        assert_eq!(obj.child, None);
    }

    #[test]
    fn test_field_kind_accepts() {
        assert!(FieldKind::Int.accepts(&json!(3)));
        assert!(!FieldKind::Int.accepts(&json!(3.5)));
        assert!(FieldKind::Float.accepts(&json!(3)));
        assert!(FieldKind::Nested.accepts(&Value::Null));
        assert!(!FieldKind::Bool.accepts(&json!("true")));
    }
}
