use std::collections::HashMap;

use crate::models::{Field, Term, DEFAULT_SEPARATOR};

/// Separator-based tokenizer with per-index case folding
#[derive(Clone, Copy, Debug, Default)]
pub struct Tokenizer {
    case_sensitive: bool,
}

impl Tokenizer {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn fold(&self, token: &str) -> String {
        if self.case_sensitive {
            token.to_string()
        } else {
            token.to_lowercase()
        }
    }

    /// Terms of a single field, in order of appearance (duplicates kept)
    pub fn tokenize_field(&self, field: &Field) -> Vec<Term> {
        field
            .raw_tokens()
            .into_iter()
            .map(|token| Term::new(field.name.clone(), self.fold(token)))
            .collect()
    }

    /// Compute term frequencies over all fields of a document
    pub fn compute_term_frequencies(&self, fields: &[Field]) -> HashMap<Term, u32> {
        let mut freq = HashMap::new();
        for field in fields {
            for term in self.tokenize_field(field) {
                *freq.entry(term).or_insert(0) += 1;
            }
        }
        freq
    }

    /// Split a search phrase into query terms for one field.
    ///
    /// Repeated words are kept, so a word given twice contributes twice.
    pub fn query_terms(&self, field: &str, phrase: &str) -> Vec<Term> {
        phrase
            .split(DEFAULT_SEPARATOR)
            .filter(|word| !word.is_empty())
            .map(|word| Term::new(field, self.fold(word)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_folding() {
        let tokenizer = Tokenizer::new(false);
        let terms = tokenizer.tokenize_field(&Field::string("title", "Taken, The"));
        assert_eq!(
            terms,
            vec![Term::new("title", "taken,"), Term::new("title", "the")]
        );
    }

    #[test]
    fn test_case_sensitive_keeps_tokens() {
        let tokenizer = Tokenizer::new(true);
        let terms = tokenizer.query_terms("title", "The  Beast");
        assert_eq!(
            terms,
            vec![Term::new("title", "The"), Term::new("title", "Beast")]
        );
    }

    #[test]
    fn test_term_frequencies_are_scoped_by_field() {
        let tokenizer = Tokenizer::new(false);
        let fields = vec![
            Field::string("title", "the the sun"),
            Field::string("article", "The sun"),
        ];
        let freq = tokenizer.compute_term_frequencies(&fields);
        assert_eq!(freq[&Term::new("title", "the")], 2);
        assert_eq!(freq[&Term::new("article", "the")], 1);
        assert_eq!(freq[&Term::new("title", "sun")], 1);
    }
}
