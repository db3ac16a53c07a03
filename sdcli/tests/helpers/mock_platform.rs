//! Scriptable Platform Backend

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use sdcli::error::{CliError, CliResult};
use sdcli::models::{
    ModelCreateRequest, ModelEmbed, ModelToken, ModelTokenRequest, NotificationCreateRequest, Page,
    PlatformModelStatus, PlatformModelView, PlatformQuery, RawUsageRecord, UserPublic,
};
use sdcli::services::PlatformBackend;

pub const USER_ID: &str = "user-1";
pub const CREATED_MODEL_ID: &str = "model-new";
pub const CREATED_MODEL_GUID: &str = "guid-new";

/// Build a model view the way the Platform Backend returns it
pub fn platform_model(id: &str, guid: Option<&str>, status: PlatformModelStatus) -> PlatformModelView {
    serde_json::from_value(json!({
        "id": id,
        "guid": guid,
        "slug": format!("{}-slug", id),
        "status": status,
        "backend_ticket": {"ticket": format!("ticket-{}", id)},
    }))
    .unwrap()
}

pub struct MockPlatform {
    /// Models returned by `get_model`, keyed by identifier
    pub models: Mutex<HashMap<String, PlatformModelView>>,
    /// Status reported after an empty status patch
    pub status_after_sync: Mutex<PlatformModelStatus>,
    pub patches: Mutex<Vec<(String, Option<PlatformModelStatus>)>>,
    pub created: Mutex<Vec<ModelCreateRequest>>,
    pub token_requests: Mutex<Vec<ModelTokenRequest>>,
    pub model_pages: Mutex<VecDeque<Page<PlatformModelView>>>,
    pub model_queries: Mutex<Vec<PlatformQuery>>,
    pub user_pages: Mutex<VecDeque<Page<UserPublic>>>,
    pub user_queries: Mutex<Vec<PlatformQuery>>,
    pub usage_page: Mutex<Option<Page<RawUsageRecord>>>,
    pub usage_queries: Mutex<Vec<PlatformQuery>>,
    pub notifications: Mutex<Vec<NotificationCreateRequest>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            models: Mutex::new(HashMap::new()),
            status_after_sync: Mutex::new(PlatformModelStatus::Confirmed),
            patches: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            token_requests: Mutex::new(Vec::new()),
            model_pages: Mutex::new(VecDeque::new()),
            model_queries: Mutex::new(Vec::new()),
            user_pages: Mutex::new(VecDeque::new()),
            user_queries: Mutex::new(Vec::new()),
            usage_page: Mutex::new(None),
            usage_queries: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }
}

impl MockPlatform {
    pub fn with_model(model: PlatformModelView) -> Self {
        let platform = Self::default();
        platform.models.lock().unwrap().insert(model.id.clone(), model);
        platform
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }
}

#[async_trait]
impl PlatformBackend for MockPlatform {
    fn authenticated_user_id(&self) -> &str {
        USER_ID
    }

    async fn get_model(&self, identifier: &str, _embed: &[ModelEmbed]) -> CliResult<PlatformModelView> {
        self.models
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .ok_or_else(|| CliError::ModelNotFound(identifier.to_string()))
    }

    async fn create_model_token(&self, request: &ModelTokenRequest) -> CliResult<ModelToken> {
        self.token_requests.lock().unwrap().push(request.clone());
        Ok(ModelToken {
            access_token: "jwt".to_string(),
            model_view_url: "https://geometry.example".to_string(),
            guid: Some(CREATED_MODEL_GUID.to_string()),
        })
    }

    async fn create_model_record(&self, request: &ModelCreateRequest) -> CliResult<PlatformModelView> {
        self.created.lock().unwrap().push(request.clone());
        Ok(platform_model(
            CREATED_MODEL_ID,
            Some(CREATED_MODEL_GUID),
            PlatformModelStatus::NotUploaded,
        ))
    }

    async fn patch_model_status(
        &self,
        model_id: &str,
        status: Option<PlatformModelStatus>,
    ) -> CliResult<PlatformModelView> {
        self.patches.lock().unwrap().push((model_id.to_string(), status));
        let status = status.unwrap_or(*self.status_after_sync.lock().unwrap());
        Ok(platform_model(model_id, None, status))
    }

    async fn query_models(&self, query: &PlatformQuery) -> CliResult<Page<PlatformModelView>> {
        self.model_queries.lock().unwrap().push(query.clone());
        Ok(self.model_pages.lock().unwrap().pop_front().unwrap_or(Page {
            result: Vec::new(),
            pagination: Default::default(),
        }))
    }

    async fn query_user_analytics(&self, query: &PlatformQuery) -> CliResult<Page<RawUsageRecord>> {
        self.usage_queries.lock().unwrap().push(query.clone());
        Ok(self.usage_page.lock().unwrap().take().unwrap_or(Page {
            result: Vec::new(),
            pagination: Default::default(),
        }))
    }

    async fn query_users(&self, query: &PlatformQuery) -> CliResult<Page<UserPublic>> {
        self.user_queries.lock().unwrap().push(query.clone());
        Ok(self.user_pages.lock().unwrap().pop_front().unwrap_or(Page {
            result: Vec::new(),
            pagination: Default::default(),
        }))
    }

    async fn create_notifications(&self, request: &NotificationCreateRequest) -> CliResult<()> {
        self.notifications.lock().unwrap().push(request.clone());
        Ok(())
    }
}
