//! Model publication workflow
//!
//! create → upload → wait for check → sync status → publish. Every step
//! depends on the previous one; remote failures propagate unmodified.
//! Re-running `publish_model` on the same model picks up where an
//! interrupted run stopped, since status changes are derived from what the
//! backends report.

use std::path::Path;

use super::geometry_client::{GeometryBackend, GeometryConnector};
use super::model_check_poller::{ModelCheckPoller, PollConfig, PollResult};
use super::platform_client::PlatformBackend;
use crate::error::{CliError, CliResult};
use crate::models::{ModelCheckState, ModelFileType, PlatformModelStatus, PlatformModelView};

/// How a publication attempt ended
#[derive(Debug, Clone)]
pub enum PublicationOutcome {
    /// Model was already in status `done`; nothing was changed
    AlreadyPublished { model_id: String },
    /// Model confirmed and promoted to `done`
    Published { model: PlatformModelView },
    /// Model awaits manual confirmation
    AwaitingConfirmation { model_id: String },
    /// Model check rejected the model
    Denied { model_id: String, reason: Option<String> },
    /// Model check did not reach a final state in time
    CheckIncomplete { model_id: String, state: ModelCheckState },
    /// Status sync did not report the model as confirmed
    NotConfirmed { model_id: String, status: PlatformModelStatus },
}

impl PublicationOutcome {
    pub fn model_id(&self) -> &str {
        match self {
            PublicationOutcome::Published { model } => &model.id,
            PublicationOutcome::AlreadyPublished { model_id }
            | PublicationOutcome::AwaitingConfirmation { model_id }
            | PublicationOutcome::Denied { model_id, .. }
            | PublicationOutcome::CheckIncomplete { model_id, .. }
            | PublicationOutcome::NotConfirmed { model_id, .. } => model_id,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(
            self,
            PublicationOutcome::Published { .. } | PublicationOutcome::AlreadyPublished { .. }
        )
    }

    /// One-line summary for the console
    pub fn describe(&self) -> String {
        match self {
            PublicationOutcome::AlreadyPublished { model_id } => {
                format!("Model {} is already published", model_id)
            }
            PublicationOutcome::Published { model } => format!("Model {} published", model.id),
            PublicationOutcome::AwaitingConfirmation { model_id } => format!(
                "Model {} is awaiting manual confirmation, publish it afterwards using publish-model",
                model_id
            ),
            PublicationOutcome::Denied { model_id, reason } => format!(
                "Model {} was denied: {}",
                model_id,
                reason.as_deref().unwrap_or("no reason given")
            ),
            PublicationOutcome::CheckIncomplete { model_id, state } => format!(
                "Model check of {} did not complete (status {}), retry using publish-model",
                model_id, state
            ),
            PublicationOutcome::NotConfirmed { model_id, status } => {
                format!("Model {} is not confirmed (status {})", model_id, status)
            }
        }
    }
}

pub struct PublicationWorkflow<'a, P: PlatformBackend + ?Sized, C: GeometryConnector> {
    platform: &'a P,
    connector: &'a C,
    poll_config: PollConfig,
}

impl<'a, P: PlatformBackend + ?Sized, C: GeometryConnector> PublicationWorkflow<'a, P, C> {
    pub fn new(platform: &'a P, connector: &'a C, poll_config: PollConfig) -> Self {
        Self {
            platform,
            connector,
            poll_config,
        }
    }

    /// Create a model from a local definition file, upload it, wait for
    /// its check and publish it
    pub async fn create_and_upload_model(&self, path: &Path, title: Option<&str>) -> CliResult<PublicationOutcome> {
        let file_access = |reason: String| CliError::FileAccess {
            path: path.to_path_buf(),
            reason,
        };

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| file_access("Not a file name".to_string()))?;
        let file_type = ModelFileType::from_filename(filename)
            .ok_or_else(|| file_access("File ending must be \".gh\" or \".ghx\"".to_string()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| file_access(e.to_string()))?;

        let created = self.platform.create_model(filename, title).await?;
        let model_id = created.model.id.clone();
        let guid = created
            .access_data
            .guid
            .clone()
            .ok_or_else(|| CliError::Parse(format!("No Geometry Backend id for model {}", model_id)))?;

        let geometry = self.connector.connect(&created.access_data)?;
        let view = geometry.get_model(&guid).await?;
        let upload_url = view
            .file
            .upload
            .ok_or_else(|| CliError::Parse(format!("No upload URL for model {}", guid)))?;

        tracing::info!(
            model_id = %model_id,
            guid = %guid,
            bytes = bytes.len(),
            content_type = file_type.content_type(),
            "Uploading model definition"
        );
        geometry
            .upload_bytes(&upload_url, &bytes, file_type.content_type())
            .await?;

        let poll = ModelCheckPoller::new(&geometry, self.poll_config)
            .wait_for_model_check(&guid)
            .await?;
        self.finish(&model_id, poll).await
    }

    /// Publish an existing model identified by id, guid or slug
    pub async fn publish_model(&self, identifier: &str) -> CliResult<PublicationOutcome> {
        let data = self.platform.get_model_access_data(identifier, false, true).await?;
        let model_id = data.model.id.clone();

        if data.model.status == PlatformModelStatus::Done {
            tracing::info!(model_id = %model_id, "Model is already published");
            return Ok(PublicationOutcome::AlreadyPublished { model_id });
        }

        let guid = data
            .access_data
            .guid
            .clone()
            .ok_or_else(|| CliError::Parse(format!("No Geometry Backend id for model {}", model_id)))?;

        let geometry = self.connector.connect(&data.access_data)?;
        let poll = ModelCheckPoller::new(&geometry, self.poll_config)
            .wait_for_model_check(&guid)
            .await?;
        self.finish(&model_id, poll).await
    }

    /// Branch on the check result; confirmed models are synced and published
    async fn finish(&self, model_id: &str, poll: PollResult) -> CliResult<PublicationOutcome> {
        let model_id = model_id.to_string();

        match poll.final_state {
            ModelCheckState::Pending => {
                tracing::info!(model_id = %model_id, "Model awaits manual confirmation");
                Ok(PublicationOutcome::AwaitingConfirmation { model_id })
            }
            ModelCheckState::Denied => {
                tracing::warn!(model_id = %model_id, reason = ?poll.status_message, "Model was denied");
                Ok(PublicationOutcome::Denied {
                    model_id,
                    reason: poll.status_message,
                })
            }
            ModelCheckState::Confirmed => {
                let synced = self.platform.patch_model_status(&model_id, None).await?;
                if synced.status != PlatformModelStatus::Confirmed {
                    tracing::warn!(model_id = %model_id, status = %synced.status, "Status sync did not confirm model");
                    return Ok(PublicationOutcome::NotConfirmed {
                        model_id,
                        status: synced.status,
                    });
                }

                let model = self
                    .platform
                    .patch_model_status(&model_id, Some(PlatformModelStatus::Done))
                    .await?;
                tracing::info!(model_id = %model_id, "Model published");
                Ok(PublicationOutcome::Published { model })
            }
            state => Ok(PublicationOutcome::CheckIncomplete { model_id, state }),
        }
    }
}
