use std::collections::HashSet;

use crate::normalize::fold;

const PORTUGUESE: &[&str] = &[
    "a", "à", "às", "ao", "aos", "and", "as", "até", "com", "como", "da", "das", "de", "do",
    "dos", "e", "é", "ela", "ele", "eles", "em", "entre", "essa", "essas", "esse", "esses", "esta",
    "está", "estamos", "foi", "isso", "mais", "na", "não", "no", "nos", "nós", "o", "os", "ou",
    "para", "pela", "pelas", "pelo", "pelos", "pode", "podem", "por", "que", "são", "se", "sem",
    "ser", "seu", "seus", "sobre", "sua", "suas", "também", "the", "to", "todas", "todos", "um",
    "uma", "umas", "uns",
];

/// Words that never take part in a counted n-gram, stored folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stopwords {
    words: HashSet<String>,
}

impl Stopwords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| fold(w.as_ref())).collect(),
        }
    }

    /// The built-in list, mostly Portuguese function words plus a few common
    /// English ones.
    pub fn portuguese() -> Self {
        Self::new(PORTUGUESE)
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words.extend(words.into_iter().map(|w| fold(w.as_ref())));
    }

    /// `token` is expected to be already folded.
    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for Stopwords {
    fn default() -> Self {
        Self::portuguese()
    }
}
