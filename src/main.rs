//! teams_export CLI - Export Teams artifact metadata as JSON.

use std::io::{self, BufWriter};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use tokio_util::sync::CancellationToken;

use teams_export::config::{
    CLIENT_ID_VAR, CLIENT_SECRET_VAR, GRAPH_API_BASE, LOGIN_BASE, TENANT_ID_VAR,
};
use teams_export::{Credentials, ExportConfig, ExportError, ExportJob};

/// Export the metadata of recordings, transcripts, whiteboards and other
/// files found in SharePoint sites and OneDrive as a JSON array on stdout.
#[derive(Parser)]
#[command(name = "teams_export")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Application (client) id. Defaults to EXPORT_TOOL.CLIENT_ID.
    #[arg(long)]
    client_id: Option<String>,

    /// Directory (tenant) id. Defaults to EXPORT_TOOL.TENANT_ID.
    #[arg(long)]
    tenant_id: Option<String>,

    /// Client secret. Defaults to EXPORT_TOOL.CLIENT_SECRET.
    #[arg(long)]
    client_secret: Option<String>,

    /// Walk each user's entire OneDrive instead of only the well-known
    /// Recordings, Meetings and Whiteboards folders. Without this flag,
    /// personal-drive files outside those folders are not exported.
    #[arg(long, env = "EXPORT_TOOL_FULL")]
    full: bool,

    /// Maximum number of concurrent Graph requests.
    #[arg(long, env = "EXPORT_TOOL_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries for throttled or unavailable responses.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Microsoft Graph base URL.
    #[arg(long, env = "EXPORT_TOOL_GRAPH_URL", default_value = GRAPH_API_BASE)]
    graph_url: String,

    /// Azure AD login base URL.
    #[arg(long, env = "EXPORT_TOOL_LOGIN_URL", default_value = LOGIN_BASE)]
    login_url: String,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all diagnostics.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn init_logging(&self) {
        if self.quiet {
            log::set_max_level(LevelFilter::Off);
            return;
        }
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
        match self.verbose {
            0 => {}
            1 => {
                builder.filter_level(LevelFilter::Info);
            }
            _ => {
                builder.filter_level(LevelFilter::Debug);
            }
        }
        builder.target(env_logger::Target::Stderr).init();
    }

    /// Flags win over the environment.
    fn credentials(&self) -> teams_export::Result<Credentials> {
        Credentials::from_lookup(|key| {
            let flag = match key {
                CLIENT_ID_VAR => self.client_id.clone(),
                TENANT_ID_VAR => self.tenant_id.clone(),
                CLIENT_SECRET_VAR => self.client_secret.clone(),
                _ => None,
            };
            flag.or_else(|| std::env::var(key).ok())
        })
    }

    fn export_config(&self) -> ExportConfig {
        ExportConfig {
            graph_base_url: self.graph_url.clone(),
            login_base_url: self.login_url.clone(),
            full: self.full,
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.timeout_secs),
            ..ExportConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    let credentials = cli.credentials().context("Missing credentials")?;
    let cancel = CancellationToken::new();

    let job = ExportJob::new(cli.export_config(), credentials, cancel.clone())
        .context("Failed to initialize export")?;

    // Ctrl-C stops the crawl but still closes the array.
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping export");
                cancel.cancel();
            }
        }
    });

    let out = BufWriter::new(io::stdout().lock());

    match job.run(out).await {
        Ok(summary) => {
            info!("done, {} artifact(s) exported", summary.artifacts);
            Ok(())
        }
        Err(ExportError::Cancelled) => {
            anyhow::bail!("Export cancelled; the output is incomplete")
        }
        Err(e @ (ExportError::ConfigurationError(_) | ExportError::AuthError(_))) => {
            Err(e).context("Export could not start")
        }
        Err(e) => Err(e).context("Export aborted; discard the partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_full_is_opt_in() {
        let cli = Cli::parse_from(["teams_export"]);
        assert!(!cli.full);
        assert_eq!(cli.concurrency, 4);

        let cli = Cli::parse_from(["teams_export", "--full"]);
        assert!(cli.full);
    }

    #[test]
    fn test_full_help_names_what_is_skipped() {
        let help = Cli::command().render_long_help().to_string();
        let help = help.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(help.contains("outside those folders are not exported"));
    }
}
