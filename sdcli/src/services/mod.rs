//! Backend adapters and the workflows built on them

pub mod credit_usage;
pub mod geometry_client;
pub(crate) mod http;
pub mod model_check_poller;
pub mod notify_users;
pub mod platform_client;
pub mod publication;
pub mod sdtf_customization;
pub mod sdtf_matcher;
pub mod session_analytics;

pub use credit_usage::{aggregate_credit_usage, query_user_credit_usage};
pub use geometry_client::{GeometryBackend, GeometryClient, GeometryConnector};
pub use http::build_http_client;
pub use model_check_poller::{ModelCheckPoller, PollConfig, PollResult};
pub use notify_users::{notify_users, NotificationOptions, NotifyUsersOptions, OrganizationFilter};
pub use platform_client::{PlatformBackend, PlatformClient};
pub use publication::{PublicationOutcome, PublicationWorkflow};
pub use sdtf_customization::{run_customization_using_sdtf, ParameterValue, SdtfCustomizationResult, SdtfSource};
pub use sdtf_matcher::{ChunkMatcher, ChunkParameterBinding, MatchDiagnostic, MatchOutcome, SdtfInput};
pub use session_analytics::{fetch_session_analytics, SessionAnalyticsReport};
