//! Word tokenization for the supported corpus languages.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use memoria_common::{AnalysisConfig, MemoriaError, Result};

lazy_static! {
    // A word, or a single punctuation mark.
    static ref TOKEN_RE: Regex = Regex::new(r"\w+|[^\w\s]").unwrap();
}

/// Text → token count, for one of a fixed set of languages.
pub trait Tokenizer: Send + Sync {
    /// Fails with `InvalidArgument` for a language outside the supported set.
    fn count_tokens(&self, text: &str, language: &str) -> Result<usize>;

    fn supports(&self, language: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    languages: BTreeSet<String>,
}

impl RegexTokenizer {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.supported_languages.iter().cloned())
    }
}

impl Tokenizer for RegexTokenizer {
    fn count_tokens(&self, text: &str, language: &str) -> Result<usize> {
        if !self.supports(language) {
            return Err(MemoriaError::InvalidArgument(format!(
                "language '{}' is not supported for parsing",
                language
            )));
        }
        Ok(TOKEN_RE.find_iter(text).count())
    }

    fn supports(&self, language: &str) -> bool {
        self.languages.contains(language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> RegexTokenizer {
        RegexTokenizer::new(["fr", "en", "es"])
    }

    #[test]
    fn test_sentence_token_counts() {
        let t = tokenizer();
        assert_eq!(t.count_tokens("I am a programmer.", "en").unwrap(), 5);
        assert_eq!(t.count_tokens("Je suis un programmeur.", "fr").unwrap(), 5);
        assert_eq!(t.count_tokens("", "es").unwrap(), 0);
    }

    #[test]
    fn test_unsupported_language_is_rejected() {
        let err = tokenizer().count_tokens("Ich möchte ein kühles Bier.", "de").unwrap_err();
        assert!(matches!(err, MemoriaError::InvalidArgument(_)));
    }

    #[test]
    fn test_accented_words_are_single_tokens() {
        assert_eq!(tokenizer().count_tokens("économie québécoise", "fr").unwrap(), 2);
    }

    #[test]
    fn test_from_config_uses_supported_set() {
        let t = RegexTokenizer::from_config(&AnalysisConfig::default());
        assert!(t.supports("es"));
        assert!(!t.supports("de"));
    }
}
