//! Tokenizers turn a paper field into feature elements.

use std::collections::HashSet;

use regex::Regex;
use tethne_common::{Result, TethneError, Value};

/// Splits a field value into feature elements.
pub trait Tokenizer {
    fn tokenize(&self, value: &Value) -> anyhow::Result<Vec<Value>>;
}

impl<F> Tokenizer for F
where
    F: Fn(&Value) -> anyhow::Result<Vec<Value>>,
{
    fn tokenize(&self, value: &Value) -> anyhow::Result<Vec<Value>> {
        self(value)
    }
}

/// Members of a list-valued field, taken as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListTokenizer;

impl Tokenizer for ListTokenizer {
    fn tokenize(&self, value: &Value) -> anyhow::Result<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.clone()),
            other => anyhow::bail!("expected a list-like value, got {other:?}"),
        }
    }
}

/// Stop words excluded by default from word features.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "we",
    "were", "which", "with",
];

/// Regex word splitter with lower-casing and stop-word removal.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pattern: Regex,
    stop_words: HashSet<String>,
    min_length: usize,
}

impl WordTokenizer {
    pub const DEFAULT_PATTERN: &'static str = r"[\p{L}\p{N}][\p{L}\p{N}'-]*";

    pub fn new() -> Result<Self> {
        Self::with_pattern(Self::DEFAULT_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| TethneError::Config(format!("bad token pattern: {e}")))?;
        Ok(Self {
            pattern,
            stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            min_length: 2,
        })
    }

    pub fn stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = n;
        self
    }

    /// Tokenize plain text into lower-cased words.
    pub fn words(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.chars().count() >= self.min_length && !self.stop_words.contains(w))
            .collect()
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, value: &Value) -> anyhow::Result<Vec<Value>> {
        let words = match value {
            Value::List(items) => items.iter().flat_map(|v| self.words(&v.to_string())).collect(),
            other => self.words(&other.to_string()),
        };
        Ok(words.into_iter().map(Value::Text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_tokenizer_lowercases_and_drops_stop_words() {
        let t = WordTokenizer::new().unwrap();
        let tokens = t.tokenize(&Value::text("The Structure of Scientific Revolutions")).unwrap();
        assert_eq!(tokens, vec![Value::text("structure"), Value::text("scientific"), Value::text("revolutions")]);
    }

    #[test]
    fn test_word_tokenizer_min_length() {
        let t = WordTokenizer::new().unwrap().stop_words(Vec::<String>::new()).min_length(4);
        assert_eq!(t.words("a big network"), vec!["network"]);
    }

    #[test]
    fn test_list_tokenizer_rejects_scalars() {
        assert!(ListTokenizer.tokenize(&Value::Int(3)).is_err());
        let list = Value::tuple(["A", "B"]);
        assert_eq!(ListTokenizer.tokenize(&list).unwrap().len(), 2);
    }

    #[test]
    fn test_closure_tokenizer() {
        let upper = |v: &Value| -> anyhow::Result<Vec<Value>> { Ok(vec![Value::text(v.to_string().to_uppercase())]) };
        assert_eq!(upper.tokenize(&Value::text("x")).unwrap(), vec![Value::text("X")]);
    }
}
