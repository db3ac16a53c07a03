//! Data models for sdcli
//!
//! Explicit views over the two backends' responses. Core logic only sees
//! these types, never raw response shapes.

pub mod credit_usage;
pub mod geometry;
pub mod platform;

pub use credit_usage::{CreditUsage, RawUsageRecord, UsageGranularity};
pub use geometry::{
    ComputationResponse, ExportView, GeometryModelView, GeometrySessionView, ModelCheckState,
    OutputView, ParameterDescriptor, ParameterType, SdtfUploadSpec, UploadSlot,
    SDTF_CONTENT_TYPE,
};
pub use platform::{
    GeometryAccessData, ModelCreateRequest, ModelEmbed, ModelFileType, ModelStatusPatch,
    ModelToken, ModelTokenRequest, ModelVisibility, NotificationCreateRequest, NotificationType,
    Page, Pagination, PlatformModelData, PlatformModelStatus, PlatformModelView, PlatformQuery,
    SortOrder, TokenScope, UserPublic,
};
