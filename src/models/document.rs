use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::field::Field;
use crate::error::{QuarryError, Result};

/// Document identifier, unique within one index
pub type DocumentId = u64;

/// Flat JSON body as received from clients
pub type DocumentBody = Map<String, Value>;

/// A document flattened into indexable fields.
///
/// The source map is kept so the raw body can be re-serialized; the index
/// itself never stores it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Vec<Field>,
    pub source: DocumentBody,
    /// Length of the serialized body in bytes
    pub byte_len: usize,
}

impl Document {
    /// Build a document from a flat JSON object.
    ///
    /// Strings are whitespace-tokenized, integers become int fields and other
    /// scalars a single token; `null` yields an empty field.
    /// Nested objects and arrays are rejected.
    pub fn from_map(source: DocumentBody) -> Result<Self> {
        let mut fields = Vec::with_capacity(source.len());
        for (name, value) in source.iter() {
            let field = match value {
                Value::String(s) => Field::string(name.clone(), s.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Field::int(name.clone(), i),
                    None => Field::keyword(name.clone(), n.to_string()),
                },
                Value::Bool(b) => Field::keyword(name.clone(), b.to_string()),
                Value::Null => Field::string(name.clone(), String::new()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(QuarryError::InvalidDocument(format!(
                        "field '{}' is not a flat value",
                        name
                    )))
                }
            };
            fields.push(field);
        }

        let byte_len = serde_json::to_vec(&source)?.len();
        Ok(Self {
            id: 0,
            fields,
            source,
            byte_len,
        })
    }

    /// Build a document from raw JSON bytes, as stored in blob storage
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| QuarryError::InvalidDocument(e.to_string()))?;
        match value {
            Value::Object(map) => {
                let mut doc = Self::from_map(map)?;
                doc.byte_len = bytes.len();
                Ok(doc)
            }
            _ => Err(QuarryError::InvalidDocument(
                "document body must be a JSON object".to_string(),
            )),
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Value of the first field with the given name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.source)?)
    }
}
