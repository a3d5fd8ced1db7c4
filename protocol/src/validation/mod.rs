//! # Attribute Validation Gateway
//!
//! Every mutation of every record passes through this module before a
//! single byte is written. The gateway answers one question: "is this value
//! legal for this field, and what should it look like once normalized?"
//!
//! ## Three rules, in order
//!
//! 1. A missing value ([`FieldValue::Null`]) on a non-nullable field fails.
//! 2. A value whose runtime type doesn't match the field's declared
//!    [`FieldType`] fails with [`EngineError::TypeMismatch`].
//! 3. If the field has a custom [`Validator`], it runs and its verdict (or
//!    its normalized value) is final.
//!
//! ## The allow-list comes first
//!
//! Which fields an update may touch is *not* inferred from nullability or
//! from the storage schema. Each record kind declares a closed enum of its
//! mutable fields and implements [`FieldSchema`] for it. The `spec()` method
//! is an exhaustive `match`, so adding a field without deciding how to
//! validate it is a compile error rather than a silent pass-through.
//!
//! [`validate_changes`] resolves every field name before it looks at any
//! value. One unknown name rejects the whole update with
//! [`EngineError::InvalidAttribute`], however valid the other values are.

pub mod validators;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::storage::RecordKind;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A dynamically-typed candidate value for a record field.
///
/// Untagged on the wire, so `null`, `true`, `42`, `-7` and `"text"` all
/// decode to the variant you'd expect. Non-negative integers land in
/// [`Unsigned`](Self::Unsigned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Unsigned(u64),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Human-readable type name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Unsigned(_) => "unsigned integer",
            FieldValue::Integer(_) => "integer",
            FieldValue::Text(_) => "text",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Unsigned(n) => write!(f, "{n}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Unsigned(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

/// The declared runtime type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Unsigned,
    Integer,
    Text,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Unsigned => "unsigned integer",
            FieldType::Integer => "integer",
            FieldType::Text => "text",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Field specs & schemas
// ---------------------------------------------------------------------------

/// A custom shape check. Receives a value that already passed the type
/// check and returns it normalized, or a reason for rejecting it.
pub type Validator = fn(&FieldValue) -> Result<FieldValue, String>;

/// The (type, nullable, validator) triple for one field.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub nullable: bool,
    pub validator: Option<Validator>,
}

impl FieldSpec {
    /// A field that must always carry a value.
    pub const fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            nullable: false,
            validator: None,
        }
    }

    /// A field that may be cleared with `null`.
    pub const fn nullable(field_type: FieldType) -> Self {
        Self {
            field_type,
            nullable: true,
            validator: None,
        }
    }

    /// Attach a custom validator.
    pub const fn checked(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("field_type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

/// The closed set of mutable fields of one record kind.
///
/// `ALL` is the allow-list. Anything not in it is rejected by
/// [`validate_changes`] before any value is examined.
pub trait FieldSchema: Copy + Eq + fmt::Debug + 'static {
    /// The record kind these fields belong to.
    const KIND: RecordKind;

    /// Every mutable field, in declaration order.
    const ALL: &'static [Self];

    /// The field's external name.
    fn name(self) -> &'static str;

    /// The field's validation triple.
    fn spec(self) -> FieldSpec;

    /// Resolve an external name against the allow-list.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }

    /// Like [`from_name`](Self::from_name), but a miss is an
    /// [`EngineError::InvalidAttribute`].
    fn resolve(name: &str) -> EngineResult<Self> {
        Self::from_name(name).ok_or_else(|| EngineError::InvalidAttribute {
            kind: Self::KIND,
            field: name.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Raw update input: field name to candidate value.
pub type Changes = BTreeMap<String, FieldValue>;

/// Check a single value against its spec and return the normalized value.
pub fn validate_value(name: &str, spec: &FieldSpec, value: FieldValue) -> EngineResult<FieldValue> {
    // Rule 1: absence.
    if value.is_null() {
        return if spec.nullable {
            Ok(FieldValue::Null)
        } else {
            Err(EngineError::type_mismatch(name, "a value is required"))
        };
    }

    // Rule 2: runtime type. Unsigned widens to Integer when it fits, since
    // JSON doesn't tell us which one the caller meant.
    let value = match (spec.field_type, value) {
        (FieldType::Boolean, v @ FieldValue::Boolean(_))
        | (FieldType::Unsigned, v @ FieldValue::Unsigned(_))
        | (FieldType::Integer, v @ FieldValue::Integer(_))
        | (FieldType::Text, v @ FieldValue::Text(_)) => v,
        (FieldType::Integer, FieldValue::Unsigned(n)) if n <= i64::MAX as u64 => {
            FieldValue::Integer(n as i64)
        }
        (expected, other) => {
            return Err(EngineError::type_mismatch(
                name,
                format!("expected {expected}, got {}", other.type_name()),
            ))
        }
    };

    // Rule 3: custom shape check.
    match spec.validator {
        Some(validator) => validator(&value).map_err(|reason| EngineError::type_mismatch(name, reason)),
        None => Ok(value),
    }
}

/// Run a required text input (a create-time argument) through the gateway.
pub fn require_text(name: &str, value: &str, validator: Validator) -> EngineResult<String> {
    let spec = FieldSpec::required(FieldType::Text).checked(validator);
    match validate_value(name, &spec, FieldValue::Text(value.to_string()))? {
        FieldValue::Text(text) => Ok(text),
        other => Err(EngineError::type_mismatch(
            name,
            format!("validator produced a {} value", other.type_name()),
        )),
    }
}

/// An update that passed the gateway: every name resolved, every value
/// normalized. Nothing has been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedChanges<F: FieldSchema> {
    entries: Vec<(F, FieldValue)>,
}

impl<F: FieldSchema> ValidatedChanges<F> {
    /// The normalized value for `field`, if the update touches it.
    pub fn get(&self, field: F) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: F) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(F, FieldValue)> {
        self.entries.iter()
    }

    /// Field names, for log lines. Values stay out of the logs.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(f, _)| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validate a whole update against the schema `F`.
///
/// Names are resolved first, so an off-list field fails with
/// [`EngineError::InvalidAttribute`] regardless of value validity. An empty
/// update is rejected the same way. Only then are values checked.
pub fn validate_changes<F: FieldSchema>(changes: Changes) -> EngineResult<ValidatedChanges<F>> {
    if changes.is_empty() {
        return Err(EngineError::InvalidAttribute {
            kind: F::KIND,
            field: "<none>".to_string(),
        });
    }

    let resolved = changes
        .into_iter()
        .map(|(name, value)| F::resolve(&name).map(|field| (field, value)))
        .collect::<EngineResult<Vec<_>>>()?;

    let entries = resolved
        .into_iter()
        .map(|(field, value)| {
            validate_value(field.name(), &field.spec(), value).map(|normalized| (field, normalized))
        })
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(ValidatedChanges { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ToyField {
        Nickname,
        Age,
        Motto,
    }

    fn shout(value: &FieldValue) -> Result<FieldValue, String> {
        match value {
            FieldValue::Text(t) if t.trim().is_empty() => Err("must not be blank".into()),
            FieldValue::Text(t) => Ok(FieldValue::Text(t.trim().to_uppercase())),
            other => Err(format!("unexpected {}", other.type_name())),
        }
    }

    impl FieldSchema for ToyField {
        const KIND: RecordKind = RecordKind::User;
        const ALL: &'static [Self] = &[ToyField::Nickname, ToyField::Age, ToyField::Motto];

        fn name(self) -> &'static str {
            match self {
                ToyField::Nickname => "nickname",
                ToyField::Age => "age",
                ToyField::Motto => "motto",
            }
        }

        fn spec(self) -> FieldSpec {
            match self {
                ToyField::Nickname => FieldSpec::required(FieldType::Text).checked(shout),
                ToyField::Age => FieldSpec::required(FieldType::Unsigned),
                ToyField::Motto => FieldSpec::nullable(FieldType::Text),
            }
        }
    }

    fn changes(pairs: &[(&str, FieldValue)]) -> Changes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn null_on_required_field_fails() {
        let spec = FieldSpec::required(FieldType::Text);
        let err = validate_value("nickname", &spec, FieldValue::Null).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { field, .. } if field == "nickname"));
    }

    #[test]
    fn null_on_nullable_field_skips_validator() {
        let spec = FieldSpec::nullable(FieldType::Text).checked(shout);
        assert_eq!(
            validate_value("motto", &spec, FieldValue::Null).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn wrong_type_is_a_type_mismatch() {
        let spec = FieldSpec::required(FieldType::Unsigned);
        let err = validate_value("age", &spec, FieldValue::Text("42".into())).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn unsigned_widens_into_integer() {
        let spec = FieldSpec::required(FieldType::Integer);
        assert_eq!(
            validate_value("delta", &spec, FieldValue::Unsigned(5)).unwrap(),
            FieldValue::Integer(5)
        );
        assert!(validate_value("delta", &spec, FieldValue::Unsigned(u64::MAX)).is_err());
    }

    #[test]
    fn validator_normalizes_and_rejects() {
        let spec = FieldSpec::required(FieldType::Text).checked(shout);
        assert_eq!(
            validate_value("nickname", &spec, " ada ".into()).unwrap(),
            FieldValue::Text("ADA".into())
        );
        assert!(validate_value("nickname", &spec, "   ".into()).is_err());
    }

    #[test]
    fn unknown_field_beats_invalid_value() {
        // Both fields are bad; the allow-list failure must win.
        let input = changes(&[
            ("age", FieldValue::Text("not a number".into())),
            ("password", FieldValue::Text("whatever".into())),
        ]);
        let err = validate_changes::<ToyField>(input).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidAttribute { field, .. } if field == "password"
        ));
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = validate_changes::<ToyField>(Changes::new()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAttribute { .. }));
    }

    #[test]
    fn validated_changes_expose_normalized_values() {
        let input = changes(&[
            ("nickname", "grace".into()),
            ("age", FieldValue::Unsigned(37)),
        ]);
        let validated = validate_changes::<ToyField>(input).unwrap();
        assert_eq!(validated.len(), 2);
        assert_eq!(
            validated.get(ToyField::Nickname),
            Some(&FieldValue::Text("GRACE".into()))
        );
        assert!(!validated.contains(ToyField::Motto));
    }

    #[test]
    fn require_text_runs_the_validator() {
        assert_eq!(require_text("nickname", " lin ", shout).unwrap(), "LIN");
        assert!(require_text("nickname", "", shout).is_err());
    }

    #[test]
    fn field_value_decodes_untagged_json() {
        let values: Vec<FieldValue> =
            serde_json::from_str(r#"[null, true, 42, -7, "hi"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Null,
                FieldValue::Boolean(true),
                FieldValue::Unsigned(42),
                FieldValue::Integer(-7),
                FieldValue::Text("hi".into()),
            ]
        );
    }
}
