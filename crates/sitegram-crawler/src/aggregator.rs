use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::ops::Deref;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// One entry of a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedNgram {
    pub ngram: String,
    pub count: usize,
}

impl RankedNgram {
    pub fn new(ngram: impl Into<String>, count: usize) -> Self {
        Self {
            ngram: ngram.into(),
            count,
        }
    }
}

/// Orders by count, then by n-gram text reversed, so that the greatest entry
/// is the one ranked first.
impl Ord for RankedNgram {
    fn cmp(&self, other: &Self) -> Ordering {
        outranks(self.count, &self.ngram, other.count, &other.ngram)
    }
}

impl PartialOrd for RankedNgram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn outranks(count: usize, ngram: &str, other_count: usize, other_ngram: &str) -> Ordering {
    count
        .cmp(&other_count)
        .then_with(|| other_ngram.cmp(ngram))
}

/// N-grams sorted by count descending, ties by n-gram text ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedResult(Vec<RankedNgram>);

impl RankedResult {
    pub fn into_vec(self) -> Vec<RankedNgram> {
        self.0
    }
}

impl Deref for RankedResult {
    type Target = [RankedNgram];

    fn deref(&self) -> &[RankedNgram] {
        &self.0
    }
}

impl IntoIterator for RankedResult {
    type Item = RankedNgram;
    type IntoIter = std::vec::IntoIter<RankedNgram>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RankedResult {
    type Item = &'a RankedNgram;
    type IntoIter = std::slice::Iter<'a, RankedNgram>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// N-gram counts shared by every worker of a crawl run.
#[derive(Debug, Default)]
pub struct Aggregator {
    counts: DashMap<String, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one occurrence per item of `ngrams`, returns how many were added.
    ///
    /// Items are tallied locally first so each distinct key takes its shard
    /// lock once.
    pub fn merge<I>(&self, ngrams: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut tally: HashMap<String, usize> = HashMap::new();
        for ngram in ngrams {
            *tally.entry(ngram).or_insert(0) += 1;
        }
        let merged = tally.values().sum();
        for (ngram, count) in tally {
            *self.counts.entry(ngram).or_insert(0) += count;
        }
        merged
    }

    pub fn count(&self, ngram: &str) -> Option<usize> {
        self.counts.get(ngram).map(|c| *c)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The `k` best entries, through a min-heap holding at most `k` of them.
    pub fn top_k(&self, k: usize) -> RankedResult {
        if k == 0 {
            return RankedResult::default();
        }

        let mut heap: BinaryHeap<Reverse<RankedNgram>> = BinaryHeap::with_capacity(k + 1);
        for entry in self.counts.iter() {
            let (ngram, count) = (entry.key(), *entry.value());
            if let Some(Reverse(worst)) = heap.peek().filter(|_| heap.len() == k) {
                if outranks(count, ngram, worst.count, &worst.ngram) != Ordering::Greater {
                    continue;
                }
            }
            heap.push(Reverse(RankedNgram::new(ngram.as_str(), count)));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut ranked: Vec<RankedNgram> = heap.into_iter().map(|Reverse(r)| r).collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        RankedResult(ranked)
    }
}

impl FromIterator<RankedNgram> for RankedResult {
    fn from_iter<I: IntoIterator<Item = RankedNgram>>(iter: I) -> Self {
        let mut ranked: Vec<RankedNgram> = iter.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        RankedResult(ranked)
    }
}
