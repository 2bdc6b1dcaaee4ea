//! Ring buffer of recent callbacks for the diagnostics endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use carrier_rates_core::AdjustedDimensions;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of callbacks retained.
pub const RECENT_CAPACITY: usize = 10;

/// What one callback asked for and how it was answered.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub received_at: DateTime<Utc>,
    pub shop: String,
    pub country_code: Option<String>,
    pub postal_code: Option<String>,
    pub currency: Option<String>,
    /// Raw combined cart weight.
    pub weight_kg: Option<f64>,
    pub parcel: Option<AdjustedDimensions>,
    pub total_quantity: Option<u32>,
    pub line_items: usize,
    pub is_clothing: bool,
    pub is_battery: bool,
    pub cache_hit: bool,
    pub rate_count: usize,
    /// `ok`, or the kind of failure that emptied the response.
    pub outcome: String,
    pub elapsed_ms: u64,
}

/// Snapshot returned by `GET /carrier-service/recent`.
#[derive(Debug, Clone, Serialize)]
pub struct RecentView {
    pub total_requests: u64,
    pub last_request: Option<RequestSummary>,
    pub recent_requests: Vec<RequestSummary>,
}

/// Fixed-size log of the latest callbacks, newest last.
#[derive(Debug, Default)]
pub struct RecentRequests {
    entries: Mutex<VecDeque<RequestSummary>>,
    total: AtomicU64,
}

impl RecentRequests {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, summary: RequestSummary) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == RECENT_CAPACITY {
                entries.pop_front();
            }
            entries.push_back(summary);
        }
    }

    /// Most recent `limit` summaries, newest first.
    #[must_use]
    pub fn latest(&self, limit: usize) -> Vec<RequestSummary> {
        self.entries
            .lock()
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn view(&self, limit: usize) -> RecentView {
        let recent_requests = self.latest(limit);
        RecentView {
            total_requests: self.total.load(Ordering::Relaxed),
            last_request: recent_requests.first().cloned(),
            recent_requests,
        }
    }
}
