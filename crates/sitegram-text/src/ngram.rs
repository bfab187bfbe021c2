use std::fmt;
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::normalize::{NormalizedText, OriginalForms};
use crate::stopwords::Stopwords;

/// Tokens shorter than this (in chars, after folding) disqualify an n-gram.
pub const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum NgramOrder {
    #[default]
    #[cfg_attr(feature = "clap", value(name = "1", alias = "unigram"))]
    Unigram,
    #[cfg_attr(feature = "clap", value(name = "2", alias = "bigram"))]
    Bigram,
    #[cfg_attr(feature = "clap", value(name = "3", alias = "trigram"))]
    Trigram,
}

impl NgramOrder {
    /// Number of tokens in one window.
    pub fn width(self) -> usize {
        match self {
            Self::Unigram => 1,
            Self::Bigram => 2,
            Self::Trigram => 3,
        }
    }
}

impl fmt::Display for NgramOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unigram => write!(f, "unigram"),
            Self::Bigram => write!(f, "bigram"),
            Self::Trigram => write!(f, "trigram"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("n-gram order must be 1, 2 or 3, got {0}")]
pub struct InvalidOrder(pub usize);

impl TryFrom<usize> for NgramOrder {
    type Error = InvalidOrder;

    fn try_from(width: usize) -> Result<Self, Self::Error> {
        match width {
            1 => Ok(Self::Unigram),
            2 => Ok(Self::Bigram),
            3 => Ok(Self::Trigram),
            other => Err(InvalidOrder(other)),
        }
    }
}

/// Lazy iterator over the admissible n-grams of one page, see [`ngrams`].
#[derive(Debug, Clone)]
pub struct Ngrams<'a> {
    tokens: Vec<&'a str>,
    width: usize,
    pos: usize,
    originals: &'a OriginalForms,
    stopwords: &'a Stopwords,
}

impl<'a> Ngrams<'a> {
    fn admissible(&self, window: &[&str]) -> bool {
        window.iter().all(|token| {
            token.chars().count() >= MIN_TOKEN_CHARS && !self.stopwords.contains(token)
        })
    }

    fn restore(&self, window: &[&str]) -> String {
        window
            .iter()
            .map(|token| self.originals.original(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn is_clean(ngram: &str) -> bool {
    !ngram.trim().is_empty() && !ngram.chars().any(char::is_numeric) && !ngram.contains("  ")
}

impl<'a> Iterator for Ngrams<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos + self.width <= self.tokens.len() {
            let window = &self.tokens[self.pos..self.pos + self.width];
            self.pos += 1;
            if !self.admissible(window) {
                continue;
            }
            let ngram = self.restore(window);
            if is_clean(&ngram) {
                return Some(ngram);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.tokens.len() + 1).saturating_sub(self.pos + self.width);
        (0, Some(remaining))
    }
}

impl<'a> FusedIterator for Ngrams<'a> {}

/// Slides a window of `order` tokens over `doc` and yields every admissible
/// n-gram in its original surface form.
///
/// A window is rejected when any of its tokens is shorter than
/// [`MIN_TOKEN_CHARS`] or is a stopword, and the rebuilt n-gram is rejected
/// when it is blank, holds a digit or holds a double space.
pub fn ngrams<'a>(
    doc: &'a NormalizedText,
    order: NgramOrder,
    stopwords: &'a Stopwords,
) -> Ngrams<'a> {
    Ngrams {
        tokens: doc.tokens().collect(),
        width: order.width(),
        pos: 0,
        originals: &doc.originals,
        stopwords,
    }
}
