//! Credit usage records
//!
//! Raw records use the analytics counter names of the Platform Backend;
//! `CreditUsage` is the billed projection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportCounters {
    #[serde(default)]
    pub sum: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomizeCounters {
    #[serde(default)]
    pub sum_desktop: Option<u64>,
    #[serde(default)]
    pub sum_backend: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddedCounters {
    #[serde(default)]
    pub billable_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub export: ExportCounters,
    #[serde(default)]
    pub customize: Option<CustomizeCounters>,
    #[serde(default)]
    pub embedded: EmbeddedCounters,
}

/// One per-period record as returned by the user analytics query
#[derive(Debug, Clone, Deserialize)]
pub struct RawUsageRecord {
    pub timestamp: String,
    #[serde(default)]
    pub data: UsageCounters,
}

/// Granularity of usage records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageGranularity {
    Day,
    Month,
}

impl UsageGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageGranularity::Day => "day",
            UsageGranularity::Month => "month",
        }
    }
}

/// Credits spent in one period (or the `SUM` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditUsage {
    pub timestamp: String,
    /// Credits spent for sessions (10 minute periods)
    pub sessions: u64,
    /// Credits spent for exports
    pub exports: u64,
    /// Credits spent for computations
    pub computations: u64,
}
