//! Live snapshots of cached query results.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Lifecycle status of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// No data has been loaded yet.
    Pending,
    /// Data is present.
    Success,
    /// The last fetch failed and no write has replaced it since.
    Error,
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot<V> {
    pub status: QueryStatus,
    pub data: Option<V>,
    pub error: Option<String>,
    /// A fetch for this key is currently in flight.
    pub fetching: bool,
    pub updated_at: Timestamp,
}

impl<V> QuerySnapshot<V> {
    /// Snapshot of an entry nothing has loaded yet.
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            fetching: false,
            updated_at: Utc::now(),
        }
    }

    /// Snapshot after a successful fetch or a reconciliation write.
    pub fn success(data: V) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            fetching: false,
            updated_at: Utc::now(),
        }
    }

    /// Mark a failed fetch, keeping whatever data was already there.
    pub fn failed(self, error: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: self.data,
            error: Some(error.into()),
            fetching: false,
            updated_at: Utc::now(),
        }
    }

    pub fn with_fetching(mut self, fetching: bool) -> Self {
        self.fetching = fetching;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Nothing to render yet: no data and a load is pending or running.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && (self.fetching || self.is_pending())
    }
}

impl<V> Default for QuerySnapshot<V> {
    fn default() -> Self {
        Self::pending()
    }
}
