//! Walks every user's personal drive.

use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, info, warn};

use crate::client::GraphClient;
use crate::error::{ExportError, Result};
use crate::models::{DriveItem, User};
use crate::walker::FolderWalker;

/// Folders probed in each personal drive when not doing a full walk.
pub const WELL_KNOWN_FOLDERS: [&str; 3] = ["Recordings", "Meetings", "Whiteboards"];

/// Enumerates users and walks their personal drives.
pub struct UserDriveWalker {
    graph: GraphClient,
    walker: FolderWalker,
    concurrency: usize,
}

impl UserDriveWalker {
    pub fn new(graph: GraphClient, walker: FolderWalker, concurrency: usize) -> Self {
        Self {
            graph,
            walker,
            concurrency: concurrency.max(1),
        }
    }

    /// Walk every user's drive.
    ///
    /// With `full` the whole tree is walked and any failure is fatal.
    /// Otherwise only the direct children of the well-known folders are
    /// considered, and folders that cannot be resolved or listed are skipped.
    pub async fn run(&self, full: bool) -> Result<usize> {
        let users = self.graph.list_users().await?;
        info!("found {} user(s)", users.len());

        stream::iter(users.into_iter().filter(|u| !u.id.is_empty()))
            .map(|user| async move { self.visit_user(&user, full).await })
            .buffer_unordered(self.concurrency)
            .try_fold(0, |total, n| async move { Ok(total + n) })
            .await
    }

    async fn visit_user(&self, user: &User, full: bool) -> Result<usize> {
        debug!(
            "visiting drive of user {} ({})",
            user.id,
            user.user_principal_name.as_deref().unwrap_or("-")
        );
        let root = self.graph.user_drive_root(&user.id).await?;

        if full {
            if !root.is_non_empty_folder() || root.id.is_empty() {
                return Ok(0);
            }
            let drive_id = drive_id_of(&root, &user.id)?;
            return self.walker.walk(drive_id, &root.id, true).await;
        }

        let mut found = 0;
        for name in WELL_KNOWN_FOLDERS {
            found += self.probe(&user.id, name).await?;
        }
        Ok(found)
    }

    /// Walk one well-known folder's direct children, tolerating its absence.
    async fn probe(&self, user_id: &str, name: &str) -> Result<usize> {
        let folder = match self.graph.user_item_by_path(user_id, name).await {
            Ok(folder) => folder,
            Err(e @ (ExportError::Cancelled | ExportError::AuthError(_))) => return Err(e),
            Err(e) => {
                log_probe_miss(user_id, name, &e);
                return Ok(0);
            }
        };

        if !folder.is_non_empty_folder() || folder.id.is_empty() {
            return Ok(0);
        }
        let Some(drive_id) = folder.parent_drive_id() else {
            warn!("{} of user {} has no parent drive id, skipping", name, user_id);
            return Ok(0);
        };

        match self.walker.walk(drive_id, &folder.id, false).await {
            Ok(n) => Ok(n),
            Err(e @ (ExportError::Cancelled | ExportError::SinkClosed | ExportError::AuthError(_))) => {
                Err(e)
            }
            Err(e) => {
                warn!("skipping {} of user {}: {}", name, user_id, e);
                Ok(0)
            }
        }
    }
}

fn drive_id_of<'a>(root: &'a DriveItem, user_id: &str) -> Result<&'a str> {
    root.parent_drive_id().ok_or_else(|| ExportError::ListingError {
        url: format!("users/{}/drive/root", user_id),
        status: 200,
        message: "drive root carries no parentReference.driveId".to_string(),
    })
}

fn log_probe_miss(user_id: &str, name: &str, err: &ExportError) {
    match err.status() {
        Some(404) => debug!("user {} has no {} folder", user_id, name),
        _ => debug!("probe of {} for user {} failed: {}", name, user_id, err),
    }
}
