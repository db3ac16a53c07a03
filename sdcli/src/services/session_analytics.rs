//! Session statistics for many models
//!
//! Models that disappear between the query and the statistics request are
//! skipped; every other failure aborts the run.

use serde::Serialize;
use serde_json::Value;

use super::geometry_client::{GeometryBackend, GeometryConnector};
use super::platform_client::PlatformBackend;
use crate::error::CliResult;
use crate::models::PlatformModelView;

#[derive(Debug, Clone, Serialize)]
pub struct ModelSessionAnalytics {
    pub model_id: String,
    pub guid: String,
    pub statistics: Value,
}

#[derive(Debug, Clone, Default)]
pub struct SessionAnalyticsReport {
    pub entries: Vec<ModelSessionAnalytics>,
    /// Ids of models skipped because they no longer exist or have no guid
    pub skipped: Vec<String>,
}

async fn fetch_one<P, C>(
    platform: &P,
    connector: &C,
    model: &PlatformModelView,
    guid: &str,
    from: &str,
    to: &str,
) -> CliResult<Value>
where
    P: PlatformBackend + ?Sized,
    C: GeometryConnector,
{
    let access = platform
        .get_analytics_access_data(&[model.id.clone()], &[guid.to_string()])
        .await?;
    let geometry = connector.connect(&access)?;
    geometry.model_session_statistics(guid, from, to).await
}

/// Fetch session statistics for every model matching the filters
pub async fn fetch_session_analytics<P, C>(
    platform: &P,
    connector: &C,
    filters: &[(String, Value)],
    from: &str,
    to: &str,
) -> CliResult<SessionAnalyticsReport>
where
    P: PlatformBackend + ?Sized,
    C: GeometryConnector,
{
    let models = platform.query_all_matching_models(filters).await?;
    let mut report = SessionAnalyticsReport::default();

    for model in &models {
        let Some(guid) = model.guid.as_deref() else {
            tracing::warn!(model_id = %model.id, "Model has no Geometry Backend id, skipping");
            report.skipped.push(model.id.clone());
            continue;
        };

        match fetch_one(platform, connector, model, guid, from, to).await {
            Ok(statistics) => report.entries.push(ModelSessionAnalytics {
                model_id: model.id.clone(),
                guid: guid.to_string(),
                statistics,
            }),
            Err(e) if e.is_model_not_found() => {
                tracing::warn!(model_id = %model.id, error = %e, "Model not found, skipping");
                report.skipped.push(model.id.clone());
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        fetched = report.entries.len(),
        skipped = report.skipped.len(),
        "Session analytics fetched"
    );
    Ok(report)
}
