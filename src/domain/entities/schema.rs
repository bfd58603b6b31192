//! Declarative configuration schemas for extensions
//!
//! An extension describes its configurable surface once, at registration
//! time, as an ordered set of typed fields. Per-tenant values are layered
//! on top of the declared defaults by the tenant config service.

use serde::{Deserialize, Serialize};

use crate::application::errors::SchemaError;

/// Datatype of a configurable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
        }
    }
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn datatype(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Text(_) => FieldType::Text,
        }
    }

    /// Convert a JSON value into a `FieldValue` of the expected datatype.
    pub fn from_json(expected: FieldType, value: &serde_json::Value) -> Option<Self> {
        match expected {
            FieldType::Bool => value.as_bool().map(FieldValue::Bool),
            FieldType::Int => value.as_i64().map(FieldValue::Int),
            FieldType::Float => value.as_f64().map(FieldValue::Float),
            FieldType::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::from(*b),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Value::from(*f),
            FieldValue::Text(s) => serde_json::Value::from(s.clone()),
        }
    }
}

/// One configurable field: declared metadata plus its current value.
///
/// `value` is always present; it starts as a copy of `default` and is
/// replaced when a tenant override is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub datatype: FieldType,
    pub title: String,
    pub description: String,
    pub default: FieldValue,
    pub value: FieldValue,
}

/// Ordered mapping of field key to [`ConfigField`].
///
/// Field order is insertion order, so downloaded config documents list
/// fields the way the extension declared them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    fields: Vec<(String, ConfigField)>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one field. Keys must be unique within a schema.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        datatype: FieldType,
        title: impl Into<String>,
        description: impl Into<String>,
        default: FieldValue,
    ) -> Result<(), SchemaError> {
        let key = key.into();
        if self.fields.iter().any(|(k, _)| *k == key) {
            return Err(SchemaError::DuplicateKey(key));
        }
        if default.datatype() != datatype {
            return Err(SchemaError::TypeMismatch {
                key,
                expected: datatype.as_str(),
            });
        }
        self.fields.push((
            key,
            ConfigField {
                datatype,
                title: title.into(),
                description: description.into(),
                value: default.clone(),
                default,
            },
        ));
        Ok(())
    }

    /// Builder form of [`ConfigSchema::add`] for registration-time schemas,
    /// where a duplicate key is a programming error.
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        datatype: FieldType,
        title: impl Into<String>,
        description: impl Into<String>,
        default: FieldValue,
    ) -> Self {
        if let Err(e) = self.add(key, datatype, title, description, default) {
            panic!("invalid schema field: {}", e);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigField> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigField)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Replace a field's current value, checking the declared datatype.
    pub fn set_value(&mut self, key: &str, value: FieldValue) -> Result<(), SchemaError> {
        let field = self
            .fields
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, f)| f)
            .ok_or_else(|| SchemaError::UnknownKey(key.to_string()))?;
        if value.datatype() != field.datatype {
            return Err(SchemaError::TypeMismatch {
                key: key.to_string(),
                expected: field.datatype.as_str(),
            });
        }
        field.value = value;
        Ok(())
    }

    pub fn value(&self, key: &str) -> Option<&FieldValue> {
        self.get(key).map(|f| &f.value)
    }

    pub fn bool_value(&self, key: &str) -> Option<bool> {
        match self.value(key) {
            Some(FieldValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn int_value(&self, key: &str) -> Option<i64> {
        match self.value(key) {
            Some(FieldValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn float_value(&self, key: &str) -> Option<f64> {
        match self.value(key) {
            Some(FieldValue::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn text_value(&self, key: &str) -> Option<&str> {
        match self.value(key) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ConfigSchema {
        ConfigSchema::new()
            .with_field(
                "greeting",
                FieldType::Text,
                "Greeting",
                "Message sent on join",
                FieldValue::Text("hello".to_string()),
            )
            .with_field(
                "enabled",
                FieldType::Bool,
                "Enabled",
                "Whether the feature is on",
                FieldValue::Bool(true),
            )
    }

    #[test]
    fn fields_keep_insertion_order() {
        let schema = sample_schema();
        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(keys, vec!["greeting", "enabled"]);
    }

    #[test]
    fn value_defaults_to_declared_default() {
        let schema = sample_schema();
        assert_eq!(schema.text_value("greeting"), Some("hello"));
        assert_eq!(schema.bool_value("enabled"), Some(true));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut schema = sample_schema();
        let err = schema
            .add(
                "greeting",
                FieldType::Text,
                "Again",
                "",
                FieldValue::Text(String::new()),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateKey(_)));
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn set_value_checks_datatype() {
        let mut schema = sample_schema();
        schema
            .set_value("greeting", FieldValue::Text("hi".to_string()))
            .unwrap();
        assert_eq!(schema.text_value("greeting"), Some("hi"));

        let err = schema
            .set_value("enabled", FieldValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));

        let err = schema
            .set_value("missing", FieldValue::Bool(false))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownKey(_)));
    }

    #[test]
    fn json_round_trip_respects_datatype() {
        let v = FieldValue::from_json(FieldType::Int, &serde_json::json!(42)).unwrap();
        assert_eq!(v, FieldValue::Int(42));
        assert!(FieldValue::from_json(FieldType::Int, &serde_json::json!("42")).is_none());
        assert_eq!(FieldValue::Text("x".to_string()).to_json(), serde_json::json!("x"));
    }
}
