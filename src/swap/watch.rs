use std::collections::HashMap;
use std::sync::Mutex;

/// Swaps whose opening transaction has been announced but not yet
/// confirmed, keyed swap id -> opening txid. This is a cache; ground
/// truth is the store, and `SwapService::resume` rebuilds it after a
/// restart.
#[derive(Debug, Default)]
pub struct WatchList {
    entries: Mutex<HashMap<String, String>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, swap_id: &str, opening_tx_id: &str) {
        self.entries
            .lock()
            .expect("watch list mutex poisoned")
            .insert(swap_id.to_string(), opening_tx_id.to_string());
    }

    pub fn remove(&self, swap_id: &str) {
        self.entries
            .lock()
            .expect("watch list mutex poisoned")
            .remove(swap_id);
    }

    pub fn contains(&self, swap_id: &str) -> bool {
        self.entries
            .lock()
            .expect("watch list mutex poisoned")
            .contains_key(swap_id)
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .expect("watch list mutex poisoned")
            .iter()
            .map(|(id, txid)| (id.clone(), txid.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("watch list mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
