//! Search term extraction.
//!
//! Tokens are the lower-cased, whitespace-split words of a text. Anything
//! shorter than [`MIN_TOKEN_LEN`] characters is dropped. The same function
//! is used for indexing record names and for tokenizing queries, so a query
//! can only match whole indexed words.

use std::collections::BTreeSet;

use crate::drug::DrugRecord;

/// Minimum token length, counted in characters.
pub const MIN_TOKEN_LEN: usize = 3;

/// Tokenizes free text in document order, keeping duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Distinct tokens of a query.
pub fn query_terms(query: &str) -> BTreeSet<String> {
    tokenize(query).into_iter().collect()
}

/// All distinct tokens a record contributes from its name and generic name.
pub fn record_terms(record: &DrugRecord) -> BTreeSet<String> {
    tokenize(&record.name)
        .into_iter()
        .chain(tokenize(&record.generic_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_tokens() {
        assert_eq!(tokenize("Co Q10 tab"), vec!["q10", "tab"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("a bc  de").is_empty());
    }

    #[test]
    fn test_tokenize_lowercases_and_splits_on_any_whitespace() {
        assert_eq!(
            tokenize("Insulin\tGlargine\nPEN"),
            vec!["insulin", "glargine", "pen"]
        );
    }

    #[test]
    fn test_token_length_counts_characters() {
        // two characters, four bytes
        assert!(tokenize("éé").is_empty());
        assert_eq!(tokenize("ééé"), vec!["ééé"]);
    }

    #[test]
    fn test_record_terms_merges_both_names() {
        let record = DrugRecord::new("1", "Lipitor 10 mg", "Atorvastatin Calcium Lipitor");
        let terms: Vec<_> = record_terms(&record).into_iter().collect();
        assert_eq!(terms, vec!["atorvastatin", "calcium", "lipitor"]);
    }

    #[test]
    fn test_query_terms_deduplicates() {
        assert_eq!(query_terms("pen PEN Pen").len(), 1);
    }
}
