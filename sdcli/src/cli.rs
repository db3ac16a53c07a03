//! Command-line interface definitions

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use sdcli_common::config::CliOverrides;

use crate::services::OrganizationFilter;

const DEFAULT_LATEST_MODELS: u32 = 10;
const DEFAULT_WINDOW_DAYS: u32 = 31;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "sdcli",
    version,
    about = "Automation toolkit for the Platform and Geometry Backends."
)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Platform Backend base URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// OAuth client id.
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Platform access key id.
    #[arg(long, global = true)]
    pub access_key_id: Option<String>,

    /// Platform access key secret.
    #[arg(long, global = true)]
    pub access_key_secret: Option<String>,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            base_url: self.base_url.clone(),
            client_id: self.client_id.clone(),
            access_key_id: self.access_key_id.clone(),
            access_key_secret: self.access_key_secret.clone(),
        }
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print a Geometry Backend access token and ticket for a model.
    ModelAccessData(ModelAccessDataArgs),
    /// List the most recently published models.
    ListLatestModels(ListLatestModelsArgs),
    /// Print a model as seen by the Platform Backend.
    ModelInfoPlatform(ModelIdArgs),
    /// Print parameters, outputs and exports of a model's default session.
    ModelInfoGeometry(ModelIdArgs),
    /// Create a model, upload its Grasshopper file and publish it.
    UploadModel(UploadModelArgs),
    /// Publish a model that has already been uploaded.
    PublishModel(ModelIdArgs),
    /// Print the credit usage of a user.
    CreditUsage(CreditUsageArgs),
    /// Run a customization whose inputs come from an sdTF container.
    SdtfExample(SdtfExampleArgs),
    /// Print the contents of an sdTF container.
    ParseSdtf(ParseSdtfArgs),
    /// Send a notification to every user matching a filter.
    NotifyUsers(NotifyUsersArgs),
    /// Print session statistics for every matching model.
    SessionAnalytics(SessionAnalyticsArgs),
}

/// Model id or slug.
#[derive(Debug, Args, Clone)]
pub struct ModelIdArgs {
    /// Model id or slug.
    #[arg(short = 'i', long = "id")]
    pub id: String,
}

#[derive(Debug, Args, Clone)]
pub struct ModelAccessDataArgs {
    /// Model id or slug.
    #[arg(short = 'i', long = "id")]
    pub id: String,

    /// Request a token that also allows exports.
    #[arg(short = 'e', long = "allow-exports")]
    pub allow_exports: bool,

    /// Use the backend ticket instead of the embedding ticket.
    #[arg(short = 'b', long = "backend")]
    pub backend: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ListLatestModelsArgs {
    /// Maximum number of models to list.
    #[arg(short = 'l', long = "limit", default_value_t = DEFAULT_LATEST_MODELS)]
    pub limit: u32,

    /// Only list models owned by the authenticated user.
    #[arg(
        short = 'o',
        long = "own",
        default_value_t = true,
        action = ArgAction::Set,
    )]
    pub own: bool,
}

#[derive(Debug, Args, Clone)]
pub struct UploadModelArgs {
    /// Grasshopper file (.gh or .ghx) to upload.
    #[arg(short = 'f', long = "filename")]
    pub filename: PathBuf,

    /// Model title.
    #[arg(short = 't', long = "title")]
    pub title: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CreditUsageArgs {
    /// User id (defaults to the authenticated user).
    #[arg(short = 'i', long = "user-id")]
    pub user_id: Option<String>,

    /// Number of days to report, ending today.
    #[arg(short = 'd', long = "days", default_value_t = DEFAULT_WINDOW_DAYS)]
    pub days: u32,

    /// First day to report (YYYYMMDD).
    #[arg(short = 'f', long = "from")]
    pub from: Option<String>,

    /// Last day to report (YYYYMMDD).
    #[arg(short = 't', long = "to")]
    pub to: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SdtfExampleArgs {
    /// Model id or slug.
    #[arg(short = 'i', long = "id")]
    pub id: String,

    /// sdTF container to use instead of the built-in example.
    #[arg(short = 'f', long = "filename")]
    pub filename: Option<PathBuf>,

    /// Save the container that was used to this path.
    #[arg(short = 's', long = "save")]
    pub save: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ParseSdtfArgs {
    /// Path or http(s) URL of the container.
    #[arg(short = 'f', long = "filename")]
    pub filename: String,
}

/// Organization membership of notified users.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OrganizationArg {
    /// Do not filter by organization.
    #[default]
    Any,
    /// Only users belonging to an organization.
    Member,
    /// Only users without an organization.
    NonMember,
}

impl From<OrganizationArg> for OrganizationFilter {
    fn from(arg: OrganizationArg) -> Self {
        match arg {
            OrganizationArg::Any => OrganizationFilter::NoFilter,
            OrganizationArg::Member => OrganizationFilter::InOrganization,
            OrganizationArg::NonMember => OrganizationFilter::NotInOrganization,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct NotifyUsersArgs {
    /// Notification type, e.g. `announcement` or `maintenance`.
    #[arg(long = "type")]
    pub notification_type: String,

    /// Notification text.
    #[arg(long)]
    pub description: String,

    /// Link attached to the notification.
    #[arg(long)]
    pub href: Option<String>,

    /// Partial name of the subscribed plan.
    #[arg(long)]
    pub plan_name: Option<String>,

    /// Exact name of the subscribed plan (takes precedence over --plan-name).
    #[arg(long)]
    pub plan_name_exact: Option<String>,

    /// Features that must be enabled (comma separated).
    #[arg(long = "feature-true", value_delimiter = ',')]
    pub features_true: Vec<String>,

    /// Features that must be disabled (comma separated).
    #[arg(long = "feature-false", value_delimiter = ',')]
    pub features_false: Vec<String>,

    /// Organization membership.
    #[arg(long, value_enum, default_value_t = OrganizationArg::Any)]
    pub organization: OrganizationArg,

    /// Organization roles (comma separated).
    #[arg(long = "role", value_delimiter = ',')]
    pub roles: Vec<String>,

    /// Only list the matching users.
    #[arg(long)]
    pub dry_run: bool,

    /// Offset to resume paging from.
    #[arg(long)]
    pub offset: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SessionAnalyticsArgs {
    /// Model filter as KEY=VALUE, repeatable (defaults to own models).
    #[arg(long = "filter", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// Number of days to report, ending today.
    #[arg(short = 'd', long = "days", default_value_t = DEFAULT_WINDOW_DAYS)]
    pub days: u32,

    /// First day to report (YYYYMMDD).
    #[arg(short = 'f', long = "from")]
    pub from: Option<String>,

    /// Last day to report (YYYYMMDD).
    #[arg(short = 't', long = "to")]
    pub to: Option<String>,
}

/// Split `KEY=VALUE`, ignoring `=` inside the key's operator brackets
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let mut depth = 0usize;
    let split = s.char_indices().find(|&(_, c)| {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return true,
            _ => {}
        }
        false
    });

    match split {
        Some((i, _)) if !s[..i].trim().is_empty() => Ok((s[..i].trim().to_string(), s[i + 1..].to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
