//! Test Helper Utilities
//!
//! In-memory Platform and Geometry Backends for driving the workflows
//! without network access.

#![allow(dead_code)]

pub mod mock_geometry;
pub mod mock_platform;
pub mod mock_server;

pub use mock_geometry::{MockGeometry, RecordedUpload};
pub use mock_platform::{platform_model, MockPlatform};
pub use mock_server::MockServer;
