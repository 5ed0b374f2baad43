use chrono::{DateTime, Duration, Utc};

use super::media_record::{MediaRecord, MediaStatus};

pub const DEFAULT_BACKOFF_BASE_SECS: i64 = 60;
pub const DEFAULT_BACKOFF_MAX_SECS: i64 = 6 * 60 * 60;
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 30 * 60;

/// Claim eligibility and retry backoff.
///
/// `backoff(0) == 0` and `backoff` is non-decreasing in the retry count, capped
/// at `max_delay_secs`. The database claim query mirrors `is_eligible` in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay_secs: i64,
    pub max_delay_secs: i64,
    /// Failed records with `retry_count >= max_retries` are no longer claimed.
    /// `None` disables the ceiling.
    pub max_retries: Option<i32>,
    /// How long a claim stays exclusive before another invocation may take it.
    pub claim_lease_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: DEFAULT_BACKOFF_BASE_SECS,
            max_delay_secs: DEFAULT_BACKOFF_MAX_SECS,
            max_retries: None,
            claim_lease_secs: DEFAULT_CLAIM_LEASE_SECS,
        }
    }
}

impl RetryPolicy {
    /// Delay in seconds before a record that failed `retry_count` times is eligible again.
    pub fn backoff_secs(&self, retry_count: i32) -> i64 {
        if retry_count <= 0 {
            return 0;
        }
        let exponent = (retry_count - 1).min(30) as u32;
        self.base_delay_secs
            .max(0)
            .saturating_mul(2_i64.saturating_pow(exponent))
            .min(self.max_delay_secs.max(0))
    }

    pub fn backoff(&self, retry_count: i32) -> Duration {
        Duration::seconds(self.backoff_secs(retry_count))
    }

    pub fn lease(&self) -> Duration {
        Duration::seconds(self.claim_lease_secs.max(1))
    }

    pub fn retries_exhausted(&self, retry_count: i32) -> bool {
        self.max_retries.is_some_and(|max| retry_count >= max)
    }

    /// Earliest instant at which a record may be claimed, ignoring leases.
    /// `None` for statuses that are never claimed.
    pub fn next_eligible_at(&self, record: &MediaRecord) -> Option<DateTime<Utc>> {
        match record.status {
            MediaStatus::Uploaded => Some(record.created_at),
            MediaStatus::Failed => {
                if self.retries_exhausted(record.retry_count) {
                    return None;
                }
                let last_error_at = record.last_error_at.unwrap_or(record.updated_at);
                Some(last_error_at + self.backoff(record.retry_count))
            }
            MediaStatus::Ready | MediaStatus::Deleted => None,
        }
    }

    pub fn is_eligible(&self, record: &MediaRecord, now: DateTime<Utc>) -> bool {
        let lease_free = record.claim_expires_at.is_none_or(|until| until <= now);
        let due = match record.status {
            MediaStatus::Uploaded => true,
            _ => self.next_eligible_at(record).is_some_and(|at| now >= at),
        };
        lease_free && due
    }
}
