//! Output schema descriptors.
//!
//! Every template declares the shape of the JSON object it expects back. The same
//! descriptor is rendered as JSON Schema for the service's structured-output mode and
//! used to check whatever actually comes back, since the service is free to ignore it.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    /// Array of strings, optionally with a fixed length.
    TextList { exact_len: Option<usize> },
    /// Array of objects, each described by `fields`.
    ObjectList { fields: &'static [Field], min_items: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("expected a JSON object at '{0}'")]
    NotAnObject(String),
    #[error("missing field '{0}'")]
    MissingField(String),
    #[error("field '{path}' should be {expected}")]
    WrongType { path: String, expected: &'static str },
    #[error("field '{path}' should have {expected} items, got {actual}")]
    WrongLength { path: String, expected: usize, actual: usize },
    #[error("field '{0}' must not be empty")]
    EmptyList(String),
    #[error("correct answer '{answer}' of question {index} is not one of its options")]
    AnswerNotInOptions { index: usize, answer: String },
}

impl OutputSchema {
    /// Check presence and types of every declared field.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        validate_object(self.fields, value, "")
    }

    /// JSON Schema for `response_format: json_schema`.
    pub fn to_json_schema(&self) -> Value {
        object_schema(self.fields)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(fields: &[Field], value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let obj = value.as_object().ok_or_else(|| {
        SchemaViolation::NotAnObject(if path.is_empty() { "$".into() } else { path.into() })
    })?;

    for field in fields {
        let field_path = join(path, field.name);
        let v = obj
            .get(field.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| SchemaViolation::MissingField(field_path.clone()))?;

        match field.kind {
            FieldKind::Text => {
                if !v.is_string() {
                    return Err(SchemaViolation::WrongType { path: field_path, expected: "a string" });
                }
            }
            FieldKind::TextList { exact_len } => {
                let items = v.as_array().ok_or_else(|| SchemaViolation::WrongType {
                    path: field_path.clone(),
                    expected: "an array of strings",
                })?;
                if items.iter().any(|i| !i.is_string()) {
                    return Err(SchemaViolation::WrongType { path: field_path, expected: "an array of strings" });
                }
                if let Some(expected) = exact_len {
                    if items.len() != expected {
                        return Err(SchemaViolation::WrongLength { path: field_path, expected, actual: items.len() });
                    }
                }
            }
            FieldKind::ObjectList { fields, min_items } => {
                let items = v.as_array().ok_or_else(|| SchemaViolation::WrongType {
                    path: field_path.clone(),
                    expected: "an array of objects",
                })?;
                if items.len() < min_items {
                    return Err(SchemaViolation::EmptyList(field_path));
                }
                for (i, item) in items.iter().enumerate() {
                    validate_object(fields, item, &format!("{field_path}[{i}]"))?;
                }
            }
        }
    }
    Ok(())
}

fn object_schema(fields: &[Field]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let prop = match field.kind {
            FieldKind::Text => json!({ "type": "string", "description": field.description }),
            FieldKind::TextList { exact_len } => {
                let mut p = json!({
                    "type": "array",
                    "description": field.description,
                    "items": { "type": "string" },
                });
                if let Some(n) = exact_len {
                    p["minItems"] = json!(n);
                    p["maxItems"] = json!(n);
                }
                p
            }
            FieldKind::ObjectList { fields, .. } => json!({
                "type": "array",
                "description": field.description,
                "items": object_schema(fields),
            }),
        };
        properties.insert(field.name.to_string(), prop);
    }
    let required: Vec<&str> = fields.iter().map(|f| f.name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &[Field] = &[
        Field { name: "front", description: "", kind: FieldKind::Text },
        Field { name: "back", description: "", kind: FieldKind::Text },
    ];
    const DECK: OutputSchema = OutputSchema {
        name: "deck",
        fields: &[
            Field { name: "cards", description: "", kind: FieldKind::ObjectList { fields: CARD, min_items: 1 } },
            Field { name: "tags", description: "", kind: FieldKind::TextList { exact_len: Some(2) } },
        ],
    };

    #[test]
    fn accepts_conforming_value() {
        let v = json!({ "cards": [{ "front": "a", "back": "b" }], "tags": ["x", "y"] });
        assert_eq!(DECK.validate(&v), Ok(()));
    }

    #[test]
    fn reports_nested_paths() {
        let v = json!({ "cards": [{ "front": "a" }], "tags": ["x", "y"] });
        assert_eq!(DECK.validate(&v), Err(SchemaViolation::MissingField("cards[0].back".into())));

        let v = json!({ "cards": [{ "front": 1, "back": "b" }], "tags": ["x", "y"] });
        assert!(matches!(DECK.validate(&v), Err(SchemaViolation::WrongType { path, .. }) if path == "cards[0].front"));
    }

    #[test]
    fn enforces_list_rules() {
        let v = json!({ "cards": [], "tags": ["x", "y"] });
        assert_eq!(DECK.validate(&v), Err(SchemaViolation::EmptyList("cards".into())));

        let v = json!({ "cards": [{ "front": "a", "back": "b" }], "tags": ["x"] });
        assert_eq!(
            DECK.validate(&v),
            Err(SchemaViolation::WrongLength { path: "tags".into(), expected: 2, actual: 1 })
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let v = json!({ "cards": null, "tags": ["x", "y"] });
        assert_eq!(DECK.validate(&v), Err(SchemaViolation::MissingField("cards".into())));
        assert_eq!(DECK.validate(&json!([])), Err(SchemaViolation::NotAnObject("$".into())));
    }

    #[test]
    fn renders_strict_json_schema() {
        let s = DECK.to_json_schema();
        assert_eq!(s["required"], json!(["cards", "tags"]));
        assert_eq!(s["additionalProperties"], json!(false));
        assert_eq!(s["properties"]["tags"]["maxItems"], json!(2));
        assert_eq!(s["properties"]["cards"]["items"]["required"], json!(["front", "back"]));
    }
}
