//! Depth-first walk of a single drive folder tree.

use log::debug;
use tokio::sync::mpsc;

use crate::client::GraphClient;
use crate::error::{ExportError, Result};
use crate::models::{ArtifactRecord, DriveItem, ItemKind};

/// Channel end that carries discovered artifacts to the emitter.
pub type ArtifactSink = mpsc::Sender<ArtifactRecord>;

/// Lists folders and forwards every file found to the artifact sink.
#[derive(Clone)]
pub struct FolderWalker {
    graph: GraphClient,
    sink: ArtifactSink,
}

impl FolderWalker {
    pub fn new(graph: GraphClient, sink: ArtifactSink) -> Self {
        Self { graph, sink }
    }

    /// Walk the children of `folder_id` in `drive_id`.
    ///
    /// Files are emitted in listing order. Folders with a positive child
    /// count are descended into before the next sibling when `recurse` is
    /// set; empty folders are never listed. Returns the number of artifacts
    /// found.
    pub async fn walk(&self, drive_id: &str, folder_id: &str, recurse: bool) -> Result<usize> {
        let mut found = 0;
        // Each frame holds the not-yet-visited children of one folder.
        let mut stack = vec![self.list(drive_id, folder_id).await?.into_iter()];

        while let Some(frame) = stack.last_mut() {
            let Some(child) = frame.next() else {
                stack.pop();
                continue;
            };

            if child.id.is_empty() {
                debug!("skipping child without id in drive {}", drive_id);
                continue;
            }

            match child.kind() {
                ItemKind::File => {
                    if let Some(record) = child.to_artifact() {
                        self.send(record).await?;
                        found += 1;
                    }
                }
                ItemKind::Folder { child_count } if child_count > 0 && recurse => {
                    let children = self.list(drive_id, &child.id).await?;
                    stack.push(children.into_iter());
                }
                _ => {}
            }
        }

        Ok(found)
    }

    async fn list(&self, drive_id: &str, folder_id: &str) -> Result<Vec<DriveItem>> {
        debug!("listing {} in drive {}", folder_id, drive_id);
        self.graph.list_children(drive_id, folder_id).await
    }

    async fn send(&self, record: ArtifactRecord) -> Result<()> {
        self.sink.send(record).await.map_err(|_| ExportError::SinkClosed)
    }
}
