//! teams_export - Export Teams artifact metadata from a Microsoft 365 tenant.
//!
//! This library provides functionality to:
//! - Authenticate with the OAuth2 client-credentials flow
//! - Walk every SharePoint site's document libraries
//! - Walk every user's OneDrive, fully or via well-known artifact folders
//! - Stream the discovered files as a single JSON array
//!
//! # Example
//!
//! ```no_run
//! use teams_export::{Credentials, ExportConfig, ExportJob};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = Credentials::from_env()?;
//!     let job = ExportJob::new(ExportConfig::default(), credentials, CancellationToken::new())?;
//!
//!     let summary = job.run(std::io::stdout().lock()).await?;
//!     eprintln!("{} artifact(s)", summary.artifacts);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod emitter;
pub mod error;
pub mod job;
pub mod models;
pub mod sites;
pub mod users;
pub mod walker;

// Re-exports for convenience
pub use auth::{Credential, TokenProvider};
pub use client::GraphClient;
pub use config::{Credentials, ExportConfig};
pub use emitter::ArtifactEmitter;
pub use error::{ExportError, Result};
pub use job::{ExportJob, ExportSummary};
pub use models::{ArtifactRecord, DriveItem};
pub use sites::SiteCollectionWalker;
pub use users::{UserDriveWalker, WELL_KNOWN_FOLDERS};
pub use walker::FolderWalker;
