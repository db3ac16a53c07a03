//! Model check polling
//!
//! Waits for a freshly uploaded model to be checked by the Geometry Backend.

use std::time::Duration;
use tokio::time::Instant;

use sdcli_common::config::PollingConfig;

use super::geometry_client::GeometryBackend;
use crate::error::{CliError, CliResult};
use crate::models::{GeometryModelView, ModelCheckState};

/// Polling interval and upload-start budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub start_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2500),
            start_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&PollingConfig> for PollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            start_timeout: Duration::from_millis(config.start_timeout_ms),
        }
    }
}

/// Outcome of one polling cycle
#[derive(Debug, Clone)]
pub struct PollResult {
    pub final_state: ModelCheckState,
    pub status_message: Option<String>,
    /// Check did not complete within twice the maximum computation time
    pub timed_out: bool,
    /// Last model view fetched
    pub model: GeometryModelView,
}

impl PollResult {
    fn from_view(model: GeometryModelView, timed_out: bool) -> Self {
        Self {
            final_state: model.model.stat,
            status_message: model.model.msg.clone(),
            timed_out,
            model,
        }
    }
}

pub struct ModelCheckPoller<'a, G: GeometryBackend + ?Sized> {
    backend: &'a G,
    config: PollConfig,
}

impl<'a, G: GeometryBackend + ?Sized> ModelCheckPoller<'a, G> {
    pub fn new(backend: &'a G, config: PollConfig) -> Self {
        Self { backend, config }
    }

    /// Wait until the model's check status is final
    ///
    /// **Algorithm:**
    /// 1. Fetch the model once; states other than `not_uploaded`,
    ///    `uploaded` and `pending` are returned immediately
    /// 2. While `not_uploaded`: fail with `PollTimeout` once the
    ///    upload-start budget is exceeded, else sleep and re-fetch
    /// 3. Read the maximum computation time from the latest model view
    /// 4. While not `confirmed`, `denied` or `pending`: once twice the
    ///    maximum computation time has elapsed, warn and return the last
    ///    state with `timed_out` set, else sleep and re-fetch
    ///
    /// `pending` only ends the wait in step 4. Whether the backend can
    /// report `pending` before checking has started is up to the backend.
    pub async fn wait_for_model_check(&self, model_id: &str) -> CliResult<PollResult> {
        let mut view = self.backend.get_model(model_id).await?;

        if !view.model.stat.may_change() {
            tracing::debug!(model_id = %model_id, state = %view.model.stat, "No need to wait for model check");
            return Ok(PollResult::from_view(view, false));
        }

        let start = Instant::now();
        while view.model.stat == ModelCheckState::NotUploaded {
            let elapsed = start.elapsed();
            if elapsed > self.config.start_timeout {
                tracing::error!(
                    model_id = %model_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Model checking did not start in time"
                );
                return Err(CliError::PollTimeout(format!(
                    "Model checking did not start within {} seconds",
                    self.config.start_timeout.as_secs()
                )));
            }
            tracing::info!(model_id = %model_id, "Waiting for model check to start...");
            tokio::time::sleep(self.config.interval).await;
            view = self.backend.get_model(model_id).await?;
        }

        let max_comp_time = view.setting.compute.max_comp_time;
        let check_budget = Duration::from_millis(max_comp_time.saturating_mul(2));
        tracing::info!(model_id = %model_id, max_comp_time_ms = max_comp_time, "Maximum allowed computation time");

        let start = Instant::now();
        while !view.model.stat.is_check_complete() {
            let elapsed = start.elapsed();
            if elapsed > check_budget {
                tracing::warn!(
                    model_id = %model_id,
                    state = %view.model.stat,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Model check did not complete within {} seconds",
                    max_comp_time / 1000
                );
                return Ok(PollResult::from_view(view, true));
            }
            tracing::info!(model_id = %model_id, state = %view.model.stat, "Waiting for model check to finish...");
            tokio::time::sleep(self.config.interval).await;
            view = self.backend.get_model(model_id).await?;
        }

        tracing::info!(model_id = %model_id, state = %view.model.stat, "Model check finished");
        Ok(PollResult::from_view(view, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComputationResponse, GeometrySessionView, SdtfUploadSpec, UploadSlot};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    /// Replays a fixed state sequence; the last state repeats forever
    struct ScriptedBackend {
        states: Vec<ModelCheckState>,
        max_comp_time: u64,
        fetches: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn new(states: Vec<ModelCheckState>, max_comp_time: u64) -> Self {
            Self {
                states,
                max_comp_time,
                fetches: Mutex::new(0),
            }
        }

        fn fetches(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl GeometryBackend for ScriptedBackend {
        async fn get_model(&self, model_id: &str) -> CliResult<GeometryModelView> {
            let mut fetches = self.fetches.lock().unwrap();
            let state = self.states[(*fetches).min(self.states.len() - 1)];
            *fetches += 1;
            Ok(serde_json::from_value(json!({
                "model": {"id": model_id, "stat": state, "msg": format!("fetch {}", *fetches)},
                "setting": {"compute": {"ftype": "gh", "max_comp_time": self.max_comp_time}}
            }))
            .unwrap())
        }
        async fn upload_bytes(&self, _url: &str, _bytes: &[u8], _content_type: &str) -> CliResult<()> {
            unimplemented!()
        }
        async fn init_session(&self, _ticket: &str) -> CliResult<GeometrySessionView> {
            unimplemented!()
        }
        async fn close_session(&self, _session_id: &str) -> CliResult<()> {
            unimplemented!()
        }
        async fn request_sdtf_upload(
            &self,
            _session_id: &str,
            _specs: &[SdtfUploadSpec],
        ) -> CliResult<Vec<UploadSlot>> {
            unimplemented!()
        }
        async fn customize(&self, _session_id: &str, _values: &Map<String, Value>) -> CliResult<ComputationResponse> {
            unimplemented!()
        }
        async fn export(
            &self,
            _session_id: &str,
            _values: &Map<String, Value>,
            _export_id: &str,
        ) -> CliResult<ComputationResponse> {
            unimplemented!()
        }
        async fn model_session_statistics(&self, _guid: &str, _from: &str, _to: &str) -> CliResult<Value> {
            unimplemented!()
        }
    }

    use ModelCheckState::*;

    #[tokio::test(start_paused = true)]
    async fn test_upload_start_timeout_is_fatal() {
        let backend = ScriptedBackend::new(vec![NotUploaded], 10_000);
        let poller = ModelCheckPoller::new(&backend, PollConfig::default());

        let result = poller.wait_for_model_check("g1").await;

        assert!(matches!(result, Err(CliError::PollTimeout(_))));
        // Fetches at 0, 2.5, ..., 62.5 s; nothing after the budget is exceeded
        assert_eq!(backend.fetches(), 26);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_terminal_state_before_budget() {
        for terminal in [Confirmed, Denied, Pending] {
            let backend = ScriptedBackend::new(vec![NotUploaded, Uploaded, Uploaded, terminal], 10_000);
            let poller = ModelCheckPoller::new(&backend, PollConfig::default());

            let result = poller.wait_for_model_check("g1").await.unwrap();

            assert_eq!(result.final_state, terminal);
            assert!(!result.timed_out);
            assert_eq!(result.status_message.as_deref(), Some("fetch 4"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_timeout_is_soft() {
        let backend = ScriptedBackend::new(vec![Uploaded], 5_000);
        let poller = ModelCheckPoller::new(&backend, PollConfig::default());

        let result = poller.wait_for_model_check("g1").await.unwrap();

        assert_eq!(result.final_state, Uploaded);
        assert!(result.timed_out);
        // Budget 10 s: fetches at 0, 2.5, 5, 7.5, 10, 12.5 s
        assert_eq!(backend.fetches(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_state_returns_without_waiting() {
        let backend = ScriptedBackend::new(vec![Confirmed], 10_000);
        let poller = ModelCheckPoller::new(&backend, PollConfig::default());

        let start = Instant::now();
        let result = poller.wait_for_model_check("g1").await.unwrap();

        assert_eq!(result.final_state, Confirmed);
        assert_eq!(backend.fetches(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_first_observation_is_final() {
        let backend = ScriptedBackend::new(vec![Pending, Confirmed], 10_000);
        let poller = ModelCheckPoller::new(&backend, PollConfig::default());

        let result = poller.wait_for_model_check("g1").await.unwrap();

        assert_eq!(result.final_state, Pending);
        assert_eq!(backend.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_state_never_waits() {
        let backend = ScriptedBackend::new(vec![Unknown], 10_000);
        let poller = ModelCheckPoller::new(&backend, PollConfig::default());

        let result = poller.wait_for_model_check("g1").await.unwrap();
        assert_eq!(result.final_state, Unknown);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_config_from_polling_section() {
        let config = PollConfig::from(&PollingConfig {
            interval_ms: 100,
            start_timeout_ms: 1000,
        });
        assert_eq!(config.interval, Duration::from_millis(100));
        assert_eq!(config.start_timeout, Duration::from_secs(1));
    }
}
