//! Export orchestration: token, output framing, site walk, user walk.

use std::io::Write;

use log::{info, warn};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::TokenProvider;
use crate::client::GraphClient;
use crate::config::{Credentials, ExportConfig};
use crate::emitter::ArtifactEmitter;
use crate::error::{ExportError, Result};
use crate::models::ArtifactRecord;
use crate::sites::SiteCollectionWalker;
use crate::users::UserDriveWalker;
use crate::walker::FolderWalker;

/// Records buffered between the walkers and the emitter.
const SINK_CAPACITY: usize = 256;

/// Outcome of a completed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub artifacts: usize,
}

/// A single export run against one tenant.
pub struct ExportJob {
    config: ExportConfig,
    graph: GraphClient,
    cancel: CancellationToken,
}

impl ExportJob {
    /// Build a job and its HTTP context.
    ///
    /// Cancelling `cancel` stops the job. The job also stops itself when
    /// the output can no longer be written.
    pub fn new(config: ExportConfig, credentials: Credentials, cancel: CancellationToken) -> Result<Self> {
        let cancel = cancel.child_token();
        let http = Client::builder().timeout(config.timeout).build()?;
        let auth = TokenProvider::new(credentials, &config.login_base_url, http.clone());
        let graph = GraphClient::new(&config, auth, http, cancel.clone());
        Ok(Self {
            config,
            graph,
            cancel,
        })
    }

    /// Run the export, writing the JSON array to `out`.
    ///
    /// On a fatal walk error the array is left unterminated and the error is
    /// returned; callers must discard the output. On cancellation the array
    /// is closed and `ExportError::Cancelled` is returned.
    pub async fn run<W: Write>(&self, out: W) -> Result<ExportSummary> {
        let credential = self.graph.auth().acquire().await?;
        info!(
            "authenticated ({} token, expires in {}s)",
            credential.token_type, credential.expires_in
        );

        let mut emitter = ArtifactEmitter::new(out);
        emitter.open()?;

        let (tx, rx) = mpsc::channel::<ArtifactRecord>(SINK_CAPACITY);
        let walk = self.walk(tx);
        let drain = drain(emitter, rx, &self.cancel);
        let (walked, drained) = tokio::join!(walk, drain);

        let mut emitter = drained?;
        match walked {
            Ok(()) => {
                emitter.close()?;
                info!("exported {} artifact(s)", emitter.count());
                Ok(ExportSummary {
                    artifacts: emitter.count(),
                })
            }
            Err(ExportError::Cancelled) => {
                warn!("export cancelled after {} artifact(s)", emitter.count());
                emitter.close()?;
                Err(ExportError::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    async fn walk(&self, tx: mpsc::Sender<ArtifactRecord>) -> Result<()> {
        let walker = FolderWalker::new(self.graph.clone(), tx);
        let workers = self.config.workers();

        let sites = SiteCollectionWalker::new(self.graph.clone(), walker.clone(), workers);
        let found = sites.run().await?;
        info!("site walk found {} artifact(s)", found);

        let users = UserDriveWalker::new(self.graph.clone(), walker, workers);
        let found = users.run(self.config.full).await?;
        info!("user drive walk found {} artifact(s)", found);

        Ok(())
    }
}

/// Sole writer of the output: feeds every received record to the emitter.
///
/// A write failure cancels the walk so no further listing is requested.
async fn drain<W: Write>(
    mut emitter: ArtifactEmitter<W>,
    mut rx: mpsc::Receiver<ArtifactRecord>,
    cancel: &CancellationToken,
) -> Result<ArtifactEmitter<W>> {
    while let Some(record) = rx.recv().await {
        if let Err(e) = emitter.emit(&record) {
            warn!("output write failed, stopping export: {}", e);
            cancel.cancel();
            return Err(e);
        }
    }
    Ok(emitter)
}
