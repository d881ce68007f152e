//! Shared helpers for lifecycle integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts how many times a completion callback ran.
#[derive(Debug, Clone, Default)]
pub struct CompletionCounter {
    fired: Arc<AtomicUsize>,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that bumps this counter when invoked.
    pub fn callback(&self) -> impl FnOnce() + Send + 'static {
        let fired = Arc::clone(&self.fired);
        move || {
            fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

navicue_engine::stages! {
    /// Three-stage set used where the catalogue stage sets are too specific
    pub enum Trio {
        First => "first",
        Second => "second",
        Third => "third",
    }
}
