//! Title language detection.
//!
//! The built-in detector counts stop words of each supported language and
//! reports the share of hits that went to the winner.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use memoria_common::Result;

use crate::corpus::{CellValue, DissertationCorpus, COL_TITLE};

pub const COL_LANGUAGE: &str = "language";
pub const COL_LANGUAGE_SCORE: &str = "language_score";
pub const UNKNOWN_LANGUAGE: &str = "unknown";

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"\w+").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub language: String,
    pub score: f64,
}

/// Text → most likely language with a confidence in [0, 1].
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Detection;
}

const FRENCH: &[&str] = &[
    "le", "la", "les", "de", "des", "du", "un", "une", "et", "en", "est", "pour", "dans",
    "sur", "au", "aux", "par", "avec", "que", "qui", "ce", "cette", "ces", "son", "sa",
    "ses", "leur", "leurs", "pas", "plus", "ou", "d", "l", "à", "entre", "chez",
];

const ENGLISH: &[&str] = &[
    "the", "of", "and", "to", "in", "a", "is", "for", "on", "with", "that", "by", "an",
    "as", "are", "from", "its", "this", "be", "at", "or", "between", "how", "into",
];

const SPANISH: &[&str] = &[
    "el", "la", "los", "las", "de", "del", "un", "una", "y", "en", "es", "para", "por",
    "con", "que", "se", "su", "sus", "al", "como", "más", "o", "lo", "entre",
];

#[derive(Debug, Clone)]
pub struct StopwordDetector {
    languages: BTreeMap<String, HashSet<&'static str>>,
}

impl Default for StopwordDetector {
    fn default() -> Self {
        Self::new(["fr", "en", "es"])
    }
}

impl StopwordDetector {
    /// Detector restricted to `languages`; codes without a stop-word list
    /// are ignored.
    pub fn new<'a>(languages: impl IntoIterator<Item = &'a str>) -> Self {
        let languages = languages
            .into_iter()
            .filter_map(|code| {
                let words = match code {
                    "fr" => FRENCH,
                    "en" => ENGLISH,
                    "es" => SPANISH,
                    _ => return None,
                };
                Some((code.to_string(), words.iter().copied().collect()))
            })
            .collect();
        Self { languages }
    }
}

impl LanguageDetector for StopwordDetector {
    fn detect(&self, text: &str) -> Detection {
        let lower = text.to_lowercase();
        let words: Vec<&str> = WORD_RE.find_iter(&lower).map(|m| m.as_str()).collect();

        let mut best: Option<(&str, usize)> = None;
        let mut total = 0usize;
        for (code, stopwords) in &self.languages {
            let hits = words.iter().filter(|w| stopwords.contains(**w)).count();
            total += hits;
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((code.as_str(), hits));
            }
        }

        match best {
            Some((code, hits)) => Detection {
                language: code.to_string(),
                score: hits as f64 / total as f64,
            },
            None => Detection {
                language: UNKNOWN_LANGUAGE.to_string(),
                score: 0.0,
            },
        }
    }
}

/// Detect each row's language from its title and store the result in the
/// `language` and `language_score` columns, adding them if needed.
pub fn detect_languages(corpus: &mut DissertationCorpus, detector: &dyn LanguageDetector) -> Result<()> {
    for column in [COL_LANGUAGE, COL_LANGUAGE_SCORE] {
        if !corpus.has_column(column) {
            corpus.add_column(column, CellValue::Null)?;
        }
    }

    let detections: Vec<(String, Detection)> = corpus
        .iter()
        .map(|(id, row)| {
            let title = row.get(COL_TITLE).and_then(CellValue::as_str).unwrap_or_default();
            (id.to_string(), detector.detect(title))
        })
        .collect();

    for (id, detection) in detections {
        debug!(id = %id, language = %detection.language, score = detection.score, "Title language detected");
        corpus.set(&id, COL_LANGUAGE, detection.language)?;
        corpus.set(&id, COL_LANGUAGE_SCORE, detection.score)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_french_title() {
        let d = StopwordDetector::default().detect("L'impact de la mondialisation sur les PME du Québec");
        assert_eq!(d.language, "fr");
        assert!(d.score > 0.5 && d.score <= 1.0);
    }

    #[test]
    fn test_detects_english_title() {
        let d = StopwordDetector::default().detect("The effect of interest rates on the housing market");
        assert_eq!(d.language, "en");
    }

    #[test]
    fn test_detects_spanish_title() {
        let d = StopwordDetector::default().detect("Los efectos del comercio y las exportaciones para el país");
        assert_eq!(d.language, "es");
    }

    #[test]
    fn test_no_stopwords_is_unknown() {
        let d = StopwordDetector::default().detect("Kapitalmarkt Bewertung");
        assert_eq!(d, Detection { language: UNKNOWN_LANGUAGE.to_string(), score: 0.0 });
    }

    #[test]
    fn test_restricted_detector_ignores_other_languages() {
        let d = StopwordDetector::new(["en"]).detect("Les marchés de la finance");
        assert_eq!(d.language, UNKNOWN_LANGUAGE);
    }
}
