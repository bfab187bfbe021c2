//! Text side of the n-gram ranking pipeline: page text goes through
//! [`normalize`], then [`ngrams`] slides a window over the resulting tokens.

mod ngram;
mod normalize;
mod stopwords;

pub use ngram::{ngrams, InvalidOrder, NgramOrder, Ngrams, MIN_TOKEN_CHARS};
pub use normalize::{fold, normalize, NormalizedText, OriginalForms};
pub use stopwords::Stopwords;
