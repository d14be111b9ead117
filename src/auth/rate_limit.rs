//! Sliding-window quota per API key.
//!
//! A request is allowed when fewer than the tier's ceiling have been recorded for
//! the key in the trailing [`WINDOW_SECS`] seconds. Allowed requests are recorded;
//! rejected ones are not, so a client hammering the endpoint recovers as soon as
//! its window drains.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::keys::{KeyStore, UsageCheck};

/// Length of the sliding window, also sent as `Retry-After` on rejection.
pub const WINDOW_SECS: i64 = 60;

/// Rate-limit class attached to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("unknown tier: {s}")),
        }
    }
}

/// What to do when current usage cannot be read from the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaFailurePolicy {
    /// Let the request through; availability over strict quota enforcement.
    #[default]
    Open,
    /// Reject the request as if the quota were exhausted.
    Closed,
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed {
        remaining: u64,
        /// Unix seconds at which the current window ends.
        reset_at: i64,
    },
    Exceeded {
        reset_at: i64,
    },
}

/// Check and record one request for `key_id` against `limit`.
///
/// The count and the record happen in one store call, so concurrent requests on
/// the same key cannot all slip under the ceiling.
pub fn check_quota(
    store: &dyn KeyStore,
    key_id: &str,
    limit: u64,
    policy: QuotaFailurePolicy,
    now: DateTime<Utc>,
) -> QuotaDecision {
    let reset_at = (now + Duration::seconds(WINDOW_SECS)).timestamp();
    let since = now - Duration::seconds(WINDOW_SECS);

    match store.check_and_record(key_id, since, limit, now) {
        Ok(UsageCheck::Recorded { used }) => QuotaDecision::Allowed {
            remaining: limit.saturating_sub(used + 1),
            reset_at,
        },
        Ok(UsageCheck::OverLimit { used }) => {
            tracing::info!(key_id, used, limit, "rate limit exceeded");
            QuotaDecision::Exceeded { reset_at }
        }
        Err(e) => {
            tracing::warn!(key_id, error = %e, ?policy, "quota check failed");
            match policy {
                QuotaFailurePolicy::Open => QuotaDecision::Allowed {
                    remaining: limit.saturating_sub(1),
                    reset_at,
                },
                QuotaFailurePolicy::Closed => QuotaDecision::Exceeded { reset_at },
            }
        }
    }
}
