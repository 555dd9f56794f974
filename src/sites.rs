//! Walks every SharePoint site's document libraries.

use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, info};

use crate::client::GraphClient;
use crate::error::Result;
use crate::models::{Drive, Site};
use crate::walker::FolderWalker;

/// Enumerates sites, their drives, and walks each drive from its root.
pub struct SiteCollectionWalker {
    graph: GraphClient,
    walker: FolderWalker,
    concurrency: usize,
}

impl SiteCollectionWalker {
    pub fn new(graph: GraphClient, walker: FolderWalker, concurrency: usize) -> Self {
        Self {
            graph,
            walker,
            concurrency: concurrency.max(1),
        }
    }

    /// Walk every drive of every site. Any listing failure is fatal.
    pub async fn run(&self) -> Result<usize> {
        let sites = self.graph.list_sites().await?;
        info!("found {} site(s)", sites.len());

        stream::iter(sites.into_iter().filter(|s| !s.id.is_empty()))
            .map(|site| async move { self.visit_site(&site).await })
            .buffer_unordered(self.concurrency)
            .try_fold(0, |total, n| async move { Ok(total + n) })
            .await
    }

    async fn visit_site(&self, site: &Site) -> Result<usize> {
        let drives = self.graph.list_site_drives(&site.id).await?;
        debug!(
            "site {} ({}) has {} drive(s)",
            site.id,
            site.display_name.as_deref().unwrap_or("-"),
            drives.len()
        );

        let found = stream::iter(drives.into_iter().filter(|d| !d.id.is_empty()))
            .map(|drive| async move { self.visit_drive(&drive).await })
            .buffer_unordered(self.concurrency)
            .try_fold(0, |total, n| async move { Ok(total + n) })
            .await?;

        Ok(found)
    }

    async fn visit_drive(&self, drive: &Drive) -> Result<usize> {
        let root = self.graph.drive_root(&drive.id).await?;
        if !root.is_non_empty_folder() || root.id.is_empty() {
            debug!("drive {} is empty", drive.id);
            return Ok(0);
        }

        debug!(
            "walking drive {} ({})",
            drive.id,
            drive.name.as_deref().unwrap_or("-")
        );
        self.walker.walk(&drive.id, &root.id, true).await
    }
}
