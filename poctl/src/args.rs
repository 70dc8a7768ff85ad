use crate::{analyze::AnalyzeArgs, apply::ApplyArgs, service_monitor, ClientArgs};
use anyhow::Result;
use clap::{Parser, Subcommand};

/// Command-line companion for the Prometheus operator.
#[derive(Debug, Parser)]
#[clap(name = "poctl", version, about)]
pub struct Args {
    #[clap(long, default_value = "poctl=info,warn", env = "POCTL_LOG", global = true)]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "POCTL_LOG_FORMAT", global = true)]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: ClientArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create monitoring resources.
    Create {
        #[clap(subcommand)]
        resource: CreateResource,
    },

    /// Server-side apply the objects in a manifest file.
    Apply(ApplyArgs),

    /// Check that monitoring resources are deployed correctly.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Subcommand)]
enum CreateResource {
    /// Create a ServiceMonitor from an existing Service.
    #[clap(name = "servicemonitor")]
    ServiceMonitor(service_monitor::CreateArgs),
}

// === impl Args ===

impl Args {
    pub async fn parse_and_run() -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            command,
        } = Self::parse();

        log_format.try_init(log_level)?;

        let res = match command {
            Command::Create {
                resource: CreateResource::ServiceMonitor(args),
            } => args.run(&client).await,
            Command::Apply(args) => args.run(&client).await,
            Command::Analyze(args) => args.run(&client).await,
        };
        if let Err(error) = &res {
            tracing::error!("{error:#}");
        }
        res
    }
}
