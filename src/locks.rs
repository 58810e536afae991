//! Per-character serialization
//!
//! Every operation that reads and writes a character's state (combat rounds,
//! talent spending, ability learning) holds that character's lock for its
//! whole read-modify-write, so two requests for the same character never
//! interleave. Different characters never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::models::CharacterId;

type CharacterLock = Arc<tokio::sync::Mutex<()>>;

/// Lock arena keyed by character id
#[derive(Debug, Default)]
pub struct CharacterLocks {
    locks: Mutex<HashMap<CharacterId, CharacterLock>>,
}

impl CharacterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one character
    pub async fn lock(&self, character_id: CharacterId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(character_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked characters
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
