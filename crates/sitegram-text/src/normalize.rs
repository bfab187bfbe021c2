use std::collections::hash_map::{Entry, HashMap};
use std::str::SplitWhitespace;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_LETTER: Regex = Regex::new(r"[^\p{L}\s]").unwrap();
    static ref WORD_JOIN: Regex = Regex::new(r"(\p{Ll})(\p{Lu})").unwrap();
}

/// Maps a normalized token back to the first surface form it had on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalForms(HashMap<String, String>);

impl OriginalForms {
    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.0.get(normalized).map(String::as_str)
    }

    /// Returns the recorded surface form, or `normalized` itself when unknown.
    pub fn original<'a>(&'a self, normalized: &'a str) -> &'a str {
        self.get(normalized).unwrap_or(normalized)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn record(&mut self, normalized: String, original: &str) {
        if let Entry::Vacant(entry) = self.0.entry(normalized) {
            entry.insert(original.to_string());
        }
    }
}

/// Output of [`normalize`]: folded tokens joined by single spaces, plus the
/// surface forms needed to display them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub originals: OriginalForms,
}

impl NormalizedText {
    pub fn tokens(&self) -> SplitWhitespace<'_> {
        self.text.split_whitespace()
    }
}

/// Lowercases `word` and strips its diacritics down to base letters.
pub fn fold(word: &str) -> String {
    word.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect()
}

/// Cleans raw page text into a stream of folded tokens.
///
/// Anything that is not a letter or whitespace becomes a space, a lowercase
/// letter directly followed by an uppercase one is split apart (`helloWorld`
/// turns into `hello World`), and every remaining word is [`fold`]ed. Letters
/// without a lowercase form stay uppercase after folding, so the split is
/// applied to folded words once more. The
/// folded form is used both as the token in [`NormalizedText::text`] and as
/// the key of [`NormalizedText::originals`], so windowing and display agree on
/// token identity.
pub fn normalize(raw: &str) -> NormalizedText {
    let composed: String = raw.nfc().collect();
    let letters = NON_LETTER.replace_all(&composed, " ");
    let split = WORD_JOIN.replace_all(&letters, "$1 $2");

    let mut originals = OriginalForms::default();
    let mut text = String::with_capacity(split.len());
    for word in split.split_whitespace() {
        let folded = fold(word);
        if WORD_JOIN.is_match(&folded) {
            for part in WORD_JOIN.replace_all(&folded, "$1 $2").split_whitespace() {
                push_token(&mut text, &mut originals, part.to_string(), part);
            }
        } else if !folded.is_empty() {
            push_token(&mut text, &mut originals, folded, word);
        }
    }

    NormalizedText { text, originals }
}

fn push_token(text: &mut String, originals: &mut OriginalForms, token: String, original: &str) {
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(&token);
    originals.record(token, original);
}
