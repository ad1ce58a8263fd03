use serde::{Deserialize, Serialize};

/// Separator used when a field carries no specific tokenizer configuration
pub const DEFAULT_SEPARATOR: &str = " ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Int,
}

/// A named, typed document value together with the separator that splits it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// `None` indexes the whole value as a single token
    pub separator: Option<String>,
    pub value: String,
}

impl Field {
    /// Whitespace-tokenized string field
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            separator: Some(DEFAULT_SEPARATOR.to_string()),
            value: value.into(),
        }
    }

    /// Field indexed as one token regardless of content
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            separator: None,
            value: value.into(),
        }
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Int,
            separator: None,
            value: value.to_string(),
        }
    }

    /// Raw tokens of this field, before case folding
    pub fn raw_tokens(&self) -> Vec<&str> {
        match self.separator.as_deref() {
            Some(sep) if !sep.is_empty() => self
                .value
                .split(sep)
                .filter(|token| !token.is_empty())
                .collect(),
            _ if self.value.is_empty() => Vec::new(),
            _ => vec![self.value.as_str()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_field_splits_on_whitespace_and_skips_empty() {
        let field = Field::string("title", "Rise  of the Beast");
        assert_eq!(field.raw_tokens(), vec!["Rise", "of", "the", "Beast"]);
    }

    #[test]
    fn test_keyword_field_is_single_token() {
        let field = Field::keyword("isbn", "978 0 13");
        assert_eq!(field.raw_tokens(), vec!["978 0 13"]);
        assert!(Field::keyword("isbn", "").raw_tokens().is_empty());
    }

    #[test]
    fn test_int_field() {
        let field = Field::int("year", 1999);
        assert_eq!(field.field_type, FieldType::Int);
        assert_eq!(field.raw_tokens(), vec!["1999"]);
    }
}
