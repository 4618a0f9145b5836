/// Cross-protocol market cache
///
/// OpenBook market records are stored here by the market pipeline and
/// consumed by the pool pipeline's hooks, which want to report what the
/// matching order-book market cost to create. Entries are write-once /
/// read-once: `take` removes what it returns, and a later `put` under the
/// same key silently replaces an unread entry.
///
/// Absence on `take` is a normal outcome: most pools never get matching
/// market data, or it arrives after the consumer already rendered.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::openbook::NewMarketEvent;

// TODO: entries for markets whose pool never launches are kept forever; add
// a timed sweep keyed on insert time.

/// Mutex-guarded map keyed by base-mint address (base58 string form)
pub struct MarketCache {
    inner: Mutex<HashMap<String, NewMarketEvent>>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Store a market record under its base mint, replacing any unread one.
    pub fn put(&self, base_mint: String, event: NewMarketEvent) {
        let mut map = self.inner.lock().expect("market cache poisoned");
        map.insert(base_mint, event);
    }

    /// Remove and return the record for a base mint, if present.
    pub fn take(&self, base_mint: &str) -> Option<NewMarketEvent> {
        let mut map = self.inner.lock().expect("market cache poisoned");
        map.remove(base_mint)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("market cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new()
    }
}
