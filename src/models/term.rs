use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::document::DocumentId;

/// Inverted index key: a token scoped to the field it came from
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub token: String,
}

impl Term {
    pub fn new(field: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            token: token.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.field, self.token)
    }
}

/// Occurrence count of one term per document, within a single segment
pub type TermData = BTreeMap<DocumentId, u32>;
