//! Credit usage aggregation

use super::platform_client::PlatformBackend;
use crate::error::CliResult;
use crate::models::{CreditUsage, PlatformQuery, RawUsageRecord, SortOrder, UsageGranularity};

/// Records per credit usage query; more are reported but not fetched
pub const CREDIT_USAGE_LIMIT: u32 = 100;

/// Exports are billed at one credit per ten uses, rounded up per channel
const EXPORTS_PER_CREDIT: u64 = 10;

/// Project raw usage records onto billed credits and append a `SUM` row
pub fn aggregate_credit_usage(records: &[RawUsageRecord]) -> Vec<CreditUsage> {
    let mut rows = Vec::with_capacity(records.len() + 1);
    let mut total = CreditUsage {
        timestamp: "SUM".to_string(),
        sessions: 0,
        exports: 0,
        computations: 0,
    };

    for record in records {
        let customize = record.data.customize.clone().unwrap_or_default();
        let exports = customize.sum_desktop.unwrap_or(0).div_ceil(EXPORTS_PER_CREDIT)
            + customize.sum_backend.unwrap_or(0).div_ceil(EXPORTS_PER_CREDIT);

        let row = CreditUsage {
            timestamp: record.timestamp.clone(),
            sessions: record.data.export.sum,
            exports,
            computations: record.data.embedded.billable_count,
        };

        total.sessions += row.sessions;
        total.exports += row.exports;
        total.computations += row.computations;
        rows.push(row);
    }

    rows.push(total);
    rows
}

/// Query a user's credit usage between two day stamps (inclusive)
pub async fn query_user_credit_usage<P: PlatformBackend + ?Sized>(
    platform: &P,
    user_id: &str,
    from: u32,
    to: u32,
    granularity: UsageGranularity,
) -> CliResult<Vec<CreditUsage>> {
    let query = PlatformQuery {
        limit: Some(CREDIT_USAGE_LIMIT),
        strict_limit: Some(true),
        ..Default::default()
    }
    .filter("user_id[=]", user_id)
    .filter("timestamp_type[=]", granularity.as_str())
    .filter("timestamp_date[>=]", from)
    .filter("timestamp_date[<=]", to)
    .sort("timestamp_date", SortOrder::Asc);

    tracing::debug!(user_id = %user_id, from, to, "Querying user analytics");
    let page = platform.query_user_analytics(&query).await?;

    if page.pagination.next_offset.is_some() {
        tracing::warn!(
            "Result is limited to {} items, more items are available.",
            CREDIT_USAGE_LIMIT
        );
    }

    Ok(aggregate_credit_usage(&page.result))
}
