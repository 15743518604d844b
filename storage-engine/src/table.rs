use chrono::{DateTime, Utc};
use ferry::domain::serialized_size;
use ferry::{RetentionPolicy, Share, ShareSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A value and the time it was written, as held in memory and in snapshots
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredShare {
    pub value: Value,
    pub created_at: DateTime<Utc>,
}

/// Outcome of looking up an id in the table
#[derive(Debug)]
pub enum Lookup {
    Live(Share),
    /// The entry had expired and was removed by this lookup
    Evicted,
    Missing,
}

/// Share map used by the memory and file backends.
///
/// Not synchronized itself; owners keep it behind a single lock.
#[derive(Clone, Debug, Default)]
pub struct ShareTable {
    entries: HashMap<String, StoredShare>,
}

impl ShareTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<String, StoredShare>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &HashMap<String, StoredShare> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace, returning the previous entry
    pub fn insert(&mut self, id: &str, stored: StoredShare) -> Option<StoredShare> {
        self.entries.insert(id.to_string(), stored)
    }

    /// Put back what was under `id` before an `insert`
    pub fn restore(&mut self, id: &str, previous: Option<StoredShare>) {
        match previous {
            Some(stored) => {
                self.entries.insert(id.to_string(), stored);
            }
            None => {
                self.entries.remove(id);
            }
        }
    }

    /// Find a live entry, evicting it if it has expired
    pub fn lookup(&mut self, id: &str, policy: &RetentionPolicy, now: DateTime<Utc>) -> Lookup {
        let expired = match self.entries.get(id) {
            None => return Lookup::Missing,
            Some(stored) => policy.is_expired(stored.created_at, now),
        };

        if expired {
            self.entries.remove(id);
            return Lookup::Evicted;
        }

        match self.entries.get(id) {
            Some(stored) => Lookup::Live(Share {
                id: id.to_string(),
                value: stored.value.clone(),
                created_at: stored.created_at,
            }),
            None => Lookup::Missing,
        }
    }

    /// Live entries, newest first, at most `limit`
    pub fn list(
        &self,
        limit: usize,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Vec<ShareSummary> {
        let mut live: Vec<(&String, &StoredShare)> = self
            .entries
            .iter()
            .filter(|(_, stored)| !policy.is_expired(stored.created_at, now))
            .collect();

        live.sort_by(|(a_id, a), (b_id, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a_id.cmp(b_id))
        });

        live.into_iter()
            .take(limit)
            .map(|(id, stored)| ShareSummary {
                id: id.clone(),
                created_at: stored.created_at,
                size: Some(serialized_size(&stored.value)),
            })
            .collect()
    }

    /// Drop every expired entry, returning how many went
    pub fn sweep(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, stored| {
            let keep = !policy.is_expired(stored.created_at, now);
            if !keep {
                tracing::debug!("Sweeping expired share: {}", id);
            }
            keep
        });
        before - self.entries.len()
    }

    pub fn live_count(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|stored| !policy.is_expired(stored.created_at, now))
            .count()
    }
}
