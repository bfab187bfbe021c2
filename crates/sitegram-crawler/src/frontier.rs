use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::mpsc;

/// Visited set and page budget of one crawl run.
///
/// The queue itself is the unbounded channel behind [`CountedTx`]; this type
/// decides which dequeued URLs actually get fetched.
#[derive(Debug)]
pub struct Frontier {
    visited: DashSet<String>,
    dispatched: AtomicUsize,
    max_pages: usize,
}

impl Frontier {
    pub fn new(max_pages: usize) -> Self {
        Self {
            visited: DashSet::new(),
            dispatched: AtomicUsize::new(0),
            max_pages,
        }
    }

    /// Marks `url` as visited and takes one page out of the budget.
    ///
    /// Returns false when the URL was already visited or the budget is spent.
    /// A URL refused for budget reasons stays marked, the budget never comes
    /// back within a run.
    pub fn try_dispatch(&self, url: &str) -> bool {
        if !self.visited.insert(url.to_string()) {
            return false;
        }
        self.dispatched
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_pages).then_some(n + 1)
            })
            .is_ok()
    }

    /// Marks `url` as visited without spending budget, for pages reached
    /// through a redirect. Returns false when it was already visited.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Whether another fetch could still be dispatched.
    pub fn has_capacity(&self) -> bool {
        self.dispatched.load(Ordering::SeqCst) < self.max_pages
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

/// Sender side of the frontier queue, counting every URL it enqueues.
#[derive(Debug, Clone)]
pub struct CountedTx {
    tx: mpsc::UnboundedSender<String>,
    counter: Arc<AtomicUsize>,
}

impl CountedTx {
    pub fn new(tx: mpsc::UnboundedSender<String>, counter: Arc<AtomicUsize>) -> Self {
        Self { tx, counter }
    }

    pub fn send(&self, url: String) {
        // Count first so the total never lags behind what a consumer has seen
        self.counter.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.send(url) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
            log::error!("Couldn't enqueue URL: {e}");
        }
    }
}
