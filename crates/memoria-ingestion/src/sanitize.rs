//! Text sanitization and the OCR-quality ratio.
//!
//! Extracted text is cleaned in two passes: runs of spaces are collapsed,
//! then extraction noise (`(cid:N)` glyph placeholders and form feeds) is
//! stripped. The quality ratio is the share of the space-collapsed text that
//! survives the second pass.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPACE_RUN_RE: Regex = Regex::new(r" {2,}").unwrap();
    static ref BAD_OCR_RE: Regex = Regex::new(r"\(cid:[0-9]+\)|\x0c").unwrap();
}

/// Input to [`sanitize`]: one text, or one text per page.
#[derive(Debug, Clone, Copy)]
pub enum RawText<'a> {
    Single(&'a str),
    Pages(&'a [String]),
}

impl<'a> From<&'a str> for RawText<'a> {
    fn from(text: &'a str) -> Self {
        RawText::Single(text)
    }
}

impl<'a> From<&'a String> for RawText<'a> {
    fn from(text: &'a String) -> Self {
        RawText::Single(text)
    }
}

impl<'a> From<&'a [String]> for RawText<'a> {
    fn from(pages: &'a [String]) -> Self {
        RawText::Pages(pages)
    }
}

impl<'a> From<&'a Vec<String>> for RawText<'a> {
    fn from(pages: &'a Vec<String>) -> Self {
        RawText::Pages(pages)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub text: String,
    /// `chars(text) / chars(space-collapsed input)`, in [0, 1].
    /// 0.0 when the collapsed input is empty.
    pub ocr_quality: f64,
}

fn collapse_spaces(text: &str) -> String {
    SPACE_RUN_RE.replace_all(text, " ").into_owned()
}

/// Clean extracted text and grade how much of it was extraction noise.
/// Pages are joined with `\n` first.
pub fn sanitize<'a>(input: impl Into<RawText<'a>>) -> Sanitized {
    let joined;
    let raw = match input.into() {
        RawText::Single(text) => text,
        RawText::Pages(pages) => {
            joined = pages.join("\n");
            joined.as_str()
        }
    };

    let collapsed = collapse_spaces(raw);
    let mut stripped = BAD_OCR_RE.replace_all(&collapsed, "").into_owned();
    // Removing an inner marker can complete an outer one, e.g. "(cid:(cid:1)2)".
    while BAD_OCR_RE.is_match(&stripped) {
        stripped = BAD_OCR_RE.replace_all(&stripped, "").into_owned();
    }
    // Stripping a marker between two spaces leaves a new run behind.
    let text = collapse_spaces(&stripped);

    let collapsed_len = collapsed.chars().count();
    let ocr_quality = if collapsed_len == 0 {
        0.0
    } else {
        text.chars().count() as f64 / collapsed_len as f64
    };

    Sanitized { text, ocr_quality }
}
