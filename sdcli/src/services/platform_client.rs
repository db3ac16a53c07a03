//! Platform Backend client
//!
//! `PlatformBackend` is the seam the workflows depend on. The required
//! methods are single requests; the provided methods compose them into the
//! operations the CLI needs, so test doubles only implement the requests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

use sdcli_common::config::PlatformCredentials;

use super::http::{send_empty, send_json, send_model_json};
use crate::error::{CliError, CliResult};
use crate::models::{
    GeometryAccessData, ModelCreateRequest, ModelEmbed, ModelFileType, ModelStatusPatch,
    ModelToken, ModelTokenRequest, ModelVisibility, NotificationCreateRequest, Page,
    PlatformModelData, PlatformModelStatus, PlatformModelView, PlatformQuery, RawUsageRecord,
    SortOrder, TokenScope, UserPublic,
};

/// Page size used when walking all pages of a collection
pub const QUERY_PAGE_SIZE: u32 = 100;

#[async_trait]
pub trait PlatformBackend: Send + Sync {
    /// Id of the user the client authenticated as
    fn authenticated_user_id(&self) -> &str;

    /// Fetch a model by id, guid or slug, embedding the given fields
    async fn get_model(&self, identifier: &str, embed: &[ModelEmbed]) -> CliResult<PlatformModelView>;

    async fn create_model_token(&self, request: &ModelTokenRequest) -> CliResult<ModelToken>;

    async fn create_model_record(&self, request: &ModelCreateRequest) -> CliResult<PlatformModelView>;

    /// Patch a model's status; `None` asks the backend to re-derive it
    async fn patch_model_status(
        &self,
        model_id: &str,
        status: Option<PlatformModelStatus>,
    ) -> CliResult<PlatformModelView>;

    async fn query_models(&self, query: &PlatformQuery) -> CliResult<Page<PlatformModelView>>;

    async fn query_user_analytics(&self, query: &PlatformQuery) -> CliResult<Page<RawUsageRecord>>;

    async fn query_users(&self, query: &PlatformQuery) -> CliResult<Page<UserPublic>>;

    async fn create_notifications(&self, request: &NotificationCreateRequest) -> CliResult<()>;

    /// Fetch a model and the data required to access it on the Geometry Backend
    ///
    /// `backend` selects the backend ticket instead of the embedding ticket.
    async fn get_model_access_data(
        &self,
        identifier: &str,
        allow_exports: bool,
        backend: bool,
    ) -> CliResult<PlatformModelData> {
        let embed = if backend {
            ModelEmbed::BackendTicket
        } else {
            ModelEmbed::Ticket
        };
        let model = self.get_model(identifier, &[embed]).await?;

        let scopes = if allow_exports {
            vec![TokenScope::GroupView, TokenScope::GroupExport]
        } else {
            vec![TokenScope::GroupView]
        };
        let token = self
            .create_model_token(&ModelTokenRequest::single(identifier, scopes.clone()))
            .await?;

        let ticket = if backend {
            model.backend_ticket.as_ref().map(|t| t.ticket.clone())
        } else {
            model.ticket.as_ref().map(|t| t.ticket.clone())
        };

        let access_data = GeometryAccessData {
            access_token: token.access_token,
            model_view_url: token.model_view_url,
            ticket,
            guid: model.guid.clone(),
            guids: Vec::new(),
            scopes,
        };
        Ok(PlatformModelData { model, access_data })
    }

    /// Token for reading the session analytics of one or several models
    async fn get_analytics_access_data(
        &self,
        ids: &[String],
        guids: &[String],
    ) -> CliResult<GeometryAccessData> {
        let scopes = vec![TokenScope::GroupAnalytics];
        let request = match ids {
            [id] => ModelTokenRequest::single(id.clone(), scopes.clone()),
            _ => ModelTokenRequest::multiple(ids.to_vec(), scopes.clone()),
        };
        let token = self.create_model_token(&request).await?;

        let (guid, guids) = match guids {
            [guid] => (Some(guid.clone()), Vec::new()),
            _ => (None, guids.to_vec()),
        };

        Ok(GeometryAccessData {
            access_token: token.access_token,
            model_view_url: token.model_view_url,
            ticket: None,
            guid,
            guids,
            scopes,
        })
    }

    /// Fetch a model with every field its permissions allow to embed
    async fn get_model_info(&self, identifier: &str) -> CliResult<PlatformModelView> {
        let model = self.get_model(identifier, &[]).await?;
        let embed = ModelEmbed::allowed_by(&model.permissions);
        self.get_model(identifier, &embed).await
    }

    /// Newest published models, optionally restricted to the caller's own
    async fn list_latest_models(&self, limit: u32, own: bool) -> CliResult<Vec<PlatformModelView>> {
        let mut query = PlatformQuery {
            limit: Some(limit),
            strict_limit: Some(true),
            embed: vec![ModelEmbed::User],
            ..Default::default()
        }
        .filter("status[=]", "done")
        .sort("created_at", SortOrder::Desc);

        if own {
            query = query.filter("user_id[=]", self.authenticated_user_id());
        }

        Ok(self.query_models(&query).await?.result)
    }

    /// Walk every page of models matching the filters
    async fn query_all_matching_models(
        &self,
        filters: &[(String, Value)],
    ) -> CliResult<Vec<PlatformModelView>> {
        let mut models = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let query = PlatformQuery {
                filters: filters.to_vec(),
                limit: Some(QUERY_PAGE_SIZE),
                offset: offset.take(),
                strict_limit: Some(false),
                embed: vec![ModelEmbed::User],
                ..Default::default()
            }
            .sort("created_at", SortOrder::Desc);

            let page = self.query_models(&query).await?;
            models.extend(page.result);
            tracing::info!(count = models.len(), "Models found");

            match page.pagination.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(models)
    }

    /// Create a private model with backend access and obtain owner access data
    async fn create_model(&self, filename: &str, title: Option<&str>) -> CliResult<PlatformModelData> {
        let ftype = ModelFileType::from_filename(filename).ok_or_else(|| CliError::FileAccess {
            path: PathBuf::from(filename),
            reason: "File ending must be \".gh\" or \".ghx\"".to_string(),
        })?;

        let request = ModelCreateRequest {
            filename: filename.to_string(),
            ftype,
            title: title.map(str::to_string),
            backendaccess: true,
            visibility: ModelVisibility::Private,
        };
        let model = self.create_model_record(&request).await?;

        let scopes = vec![TokenScope::GroupOwner, TokenScope::GroupView];
        let token = self
            .create_model_token(&ModelTokenRequest::single(model.id.clone(), scopes.clone()))
            .await?;

        tracing::info!(model_id = %model.id, guid = ?token.guid, "Model created");

        let access_data = GeometryAccessData {
            access_token: token.access_token,
            model_view_url: token.model_view_url,
            ticket: None,
            guid: token.guid,
            guids: Vec::new(),
            scopes,
        };
        Ok(PlatformModelData { model, access_data })
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    user_id: String,
}

/// reqwest implementation of `PlatformBackend`
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    user_id: String,
}

impl PlatformClient {
    /// Authenticate with a password grant using the access key pair
    pub async fn authenticate(http: reqwest::Client, credentials: &PlatformCredentials) -> CliResult<Self> {
        let base_url = credentials.base_url.trim_end_matches('/').to_string();
        let url = format!("{}/api/v1/oauth/token", base_url);

        let mut form = vec![
            ("grant_type", "password"),
            ("username", credentials.access_key_id.as_str()),
            ("password", credentials.access_key_secret.as_str()),
        ];
        if let Some(client_id) = credentials.client_id.as_deref() {
            form.push(("client_id", client_id));
        }

        tracing::debug!(url = %url, "Authenticating with Platform Backend");
        let auth: AuthResponse = send_json(http.post(&url).form(&form)).await?;
        tracing::info!(user_id = %auth.user_id, "Authenticated with Platform Backend");

        Ok(Self {
            http,
            base_url,
            access_token: auth.access_token,
            user_id: auth.user_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(&self.access_token)
    }

    fn query(&self, path: &str, query: &PlatformQuery) -> reqwest::RequestBuilder {
        self.get(path).query(&query.to_pairs())
    }
}

#[async_trait]
impl PlatformBackend for PlatformClient {
    fn authenticated_user_id(&self) -> &str {
        &self.user_id
    }

    async fn get_model(&self, identifier: &str, embed: &[ModelEmbed]) -> CliResult<PlatformModelView> {
        let mut request = self.get(&format!("models/{}", identifier));
        if !embed.is_empty() {
            let fields: Vec<&str> = embed.iter().map(ModelEmbed::as_str).collect();
            request = request.query(&[("embed", fields.join(","))]);
        }
        tracing::debug!(identifier = %identifier, "Fetching model");
        send_model_json(request).await
    }

    async fn create_model_token(&self, request: &ModelTokenRequest) -> CliResult<ModelToken> {
        send_model_json(
            self.http
                .post(self.url("model-tokens"))
                .bearer_auth(&self.access_token)
                .json(request),
        )
        .await
    }

    async fn create_model_record(&self, request: &ModelCreateRequest) -> CliResult<PlatformModelView> {
        send_json(
            self.http
                .post(self.url("models"))
                .bearer_auth(&self.access_token)
                .json(request),
        )
        .await
    }

    async fn patch_model_status(
        &self,
        model_id: &str,
        status: Option<PlatformModelStatus>,
    ) -> CliResult<PlatformModelView> {
        tracing::debug!(model_id = %model_id, status = ?status, "Patching model status");
        send_model_json(
            self.http
                .patch(self.url(&format!("models/{}", model_id)))
                .bearer_auth(&self.access_token)
                .json(&ModelStatusPatch { status }),
        )
        .await
    }

    async fn query_models(&self, query: &PlatformQuery) -> CliResult<Page<PlatformModelView>> {
        send_json(self.query("models", query)).await
    }

    async fn query_user_analytics(&self, query: &PlatformQuery) -> CliResult<Page<RawUsageRecord>> {
        send_json(self.query("user-analytics", query)).await
    }

    async fn query_users(&self, query: &PlatformQuery) -> CliResult<Page<UserPublic>> {
        send_json(self.query("users", query)).await
    }

    async fn create_notifications(&self, request: &NotificationCreateRequest) -> CliResult<()> {
        send_empty(
            self.http
                .post(self.url("notifications/multiple"))
                .bearer_auth(&self.access_token)
                .json(request),
        )
        .await
    }
}
