//! Platform Backend views
//!
//! Only the fields the CLI reads are typed; everything else the backend
//! returns is kept in `extra` so display commands can print it verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Publication status of a model on the Platform Backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformModelStatus {
    NotUploaded,
    Uploaded,
    Pending,
    Confirmed,
    Denied,
    /// Published
    Done,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PlatformModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlatformModelStatus::NotUploaded => "not_uploaded",
            PlatformModelStatus::Uploaded => "uploaded",
            PlatformModelStatus::Pending => "pending",
            PlatformModelStatus::Confirmed => "confirmed",
            PlatformModelStatus::Denied => "denied",
            PlatformModelStatus::Done => "done",
            PlatformModelStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketView {
    pub ticket: String,
}

/// Model as seen by its owner on the Platform Backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformModelView {
    pub id: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub status: PlatformModelStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_ticket: Option<TicketView>,
    /// Embedded fields and anything else not typed above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Scope of a model token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenScope {
    #[serde(rename = "group.view")]
    GroupView,
    #[serde(rename = "group.export")]
    GroupExport,
    #[serde(rename = "group.owner")]
    GroupOwner,
    #[serde(rename = "group.analytics")]
    GroupAnalytics,
}

/// Body of the model token request: either one model `id` or several `ids`
#[derive(Debug, Clone, Serialize)]
pub struct ModelTokenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    pub scope: Vec<TokenScope>,
}

impl ModelTokenRequest {
    pub fn single(id: impl Into<String>, scope: Vec<TokenScope>) -> Self {
        Self {
            id: Some(id.into()),
            ids: Vec::new(),
            scope,
        }
    }

    pub fn multiple(ids: Vec<String>, scope: Vec<TokenScope>) -> Self {
        Self { id: None, ids, scope }
    }
}

/// Response of the model token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ModelToken {
    pub access_token: String,
    pub model_view_url: String,
    #[serde(default)]
    pub guid: Option<String>,
}

/// Data required to access one (or several) models on the Geometry Backend
#[derive(Debug, Clone, Serialize)]
pub struct GeometryAccessData {
    /// JWT
    pub access_token: String,
    /// API endpoint of the Geometry Backend system
    pub model_view_url: String,
    /// Encrypted model identifier, only available once a model is confirmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Id of the model on the Geometry Backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Ids of several models, used by analytics tokens
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guids: Vec<String>,
    pub scopes: Vec<TokenScope>,
}

/// A model together with its Geometry Backend access data
#[derive(Debug, Clone, Serialize)]
pub struct PlatformModelData {
    pub model: PlatformModelView,
    pub access_data: GeometryAccessData,
}

/// Grasshopper definition file kinds accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFileType {
    /// Binary definition
    Gh,
    /// XML definition
    Ghx,
}

impl ModelFileType {
    /// Derive the file kind from a file name (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".ghx") {
            Some(ModelFileType::Ghx)
        } else if lower.ends_with(".gh") {
            Some(ModelFileType::Gh)
        } else {
            None
        }
    }

    /// Content type used when uploading the raw file
    pub fn content_type(&self) -> &'static str {
        match self {
            ModelFileType::Gh => "application/octet-stream",
            ModelFileType::Ghx => "application/xml",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVisibility {
    Private,
    Organization,
    Public,
}

/// Body of the model creation request
#[derive(Debug, Clone, Serialize)]
pub struct ModelCreateRequest {
    pub filename: String,
    pub ftype: ModelFileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub backendaccess: bool,
    pub visibility: ModelVisibility,
}

/// Body of the model patch request
///
/// An omitted status asks the backend to re-derive it from the Geometry
/// Backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelStatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlatformModelStatus>,
}

/// Fields which can be embedded when fetching a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEmbed {
    Ticket,
    BackendTicket,
    AccessDomains,
    GlobalAccessDomains,
    BackendProperties,
    BackendSystem,
    Bookmark,
    Decoration,
    Organization,
    Tags,
    User,
}

impl ModelEmbed {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelEmbed::Ticket => "ticket",
            ModelEmbed::BackendTicket => "backend_ticket",
            ModelEmbed::AccessDomains => "accessdomains",
            ModelEmbed::GlobalAccessDomains => "global_accessdomains",
            ModelEmbed::BackendProperties => "backend_properties",
            ModelEmbed::BackendSystem => "backend_system",
            ModelEmbed::Bookmark => "bookmark",
            ModelEmbed::Decoration => "decoration",
            ModelEmbed::Organization => "organization",
            ModelEmbed::Tags => "tags",
            ModelEmbed::User => "user",
        }
    }

    /// Embeddable fields the caller is permitted to see
    pub fn allowed_by(permissions: &[String]) -> Vec<ModelEmbed> {
        let has = |p: &str| permissions.iter().any(|perm| perm == p);
        let mut fields = Vec::new();

        if has("embed_accessdomains") {
            fields.push(ModelEmbed::AccessDomains);
            fields.push(ModelEmbed::GlobalAccessDomains);
        }
        let single = [
            ("embed_backend_properties", ModelEmbed::BackendProperties),
            ("embed_backend_systems", ModelEmbed::BackendSystem),
            ("embed_bookmark", ModelEmbed::Bookmark),
            ("embed_decoration", ModelEmbed::Decoration),
            ("embed_organization", ModelEmbed::Organization),
            ("embed_tags", ModelEmbed::Tags),
            ("embed_user", ModelEmbed::User),
        ];
        for (permission, field) in single {
            if has(permission) {
                fields.push(field);
            }
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Generic query against a Platform Backend collection
#[derive(Debug, Clone, Default)]
pub struct PlatformQuery {
    /// Filter expressions such as `status[=]` → `"done"`
    pub filters: Vec<(String, Value)>,
    pub sorters: Vec<(String, SortOrder)>,
    pub limit: Option<u32>,
    pub offset: Option<String>,
    pub strict_limit: Option<bool>,
    pub embed: Vec<ModelEmbed>,
}

impl PlatformQuery {
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sorters.push((field.into(), order));
        self
    }

    /// Encode the query as URL query pairs
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        for (key, value) in &self.filters {
            pairs.push((format!("filters[{}]", key), filter_value_to_string(value)));
        }
        for (field, order) in &self.sorters {
            pairs.push((format!("sorters[{}]", field), order.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = &self.offset {
            pairs.push(("offset".to_string(), offset.clone()));
        }
        if let Some(strict) = self.strict_limit {
            pairs.push(("strict_limit".to_string(), strict.to_string()));
        }
        if !self.embed.is_empty() {
            let embed: Vec<&str> = self.embed.iter().map(ModelEmbed::as_str).collect();
            pairs.push(("embed".to_string(), embed.join(",")));
        }
        pairs
    }
}

fn filter_value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(filter_value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_offset: Option<String>,
}

/// One page of a collection query
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub result: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Publicly visible user fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Notification types accepted by the Platform Backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Announcement,
    Billing,
    Feature,
    Maintenance,
    Subscription,
}

impl NotificationType {
    pub const ALL: [NotificationType; 5] = [
        NotificationType::Announcement,
        NotificationType::Billing,
        NotificationType::Feature,
        NotificationType::Maintenance,
        NotificationType::Subscription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Announcement => "announcement",
            NotificationType::Billing => "billing",
            NotificationType::Feature => "feature",
            NotificationType::Maintenance => "maintenance",
            NotificationType::Subscription => "subscription",
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = NotificationType::ALL.iter().map(|t| t.as_str()).collect();
                format!("Notification type must be one of {}", known.join(","))
            })
    }
}

/// Body of the bulk notification request
#[derive(Debug, Clone, Serialize)]
pub struct NotificationCreateRequest {
    pub creator: &'static str,
    pub level: &'static str,
    pub class: &'static str,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub description: String,
    pub receiver_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}
