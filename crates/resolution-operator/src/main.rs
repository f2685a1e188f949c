//! Resolution Operator - fetches remote pipeline resources for ResolutionRequests

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::{Client, CustomResourceExt};

use resolution_common::crd::ResolutionRequest;
use resolution_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use resolution_framework::ResolverConfig;
use resolution_operator::config::{into_map, parse_key_value, OperatorConfig};
use resolution_operator::{default_registry, ensure_crds_installed, resolve_once, run_controller};

/// Resolution - resolves remote resources referenced by pipelines
#[derive(Parser, Debug)]
#[command(name = "resolution-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (json or text)
    #[arg(long, env = "RESOLUTION_LOG_FORMAT", default_value = "json", global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    config: OperatorConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Installs the ResolutionRequest CRD, then watches labeled requests and
    /// resolves them with the registered resolvers.
    Controller,

    /// Resolve once locally and print the content to stdout
    Resolve {
        /// Resolver type, e.g. git
        #[arg(long = "type")]
        resolver_type: String,

        /// Resolver param as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Resolver config entry as key=value (repeatable), e.g. timeout=30s
        #[arg(long = "config", value_parser = parse_key_value)]
        config: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let crd = serde_yaml::to_string(&ResolutionRequest::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        service_name: "resolution-operator".to_string(),
        format: cli.log_format,
    })?;

    let registry = Arc::new(default_registry()?);

    match cli.command.unwrap_or(Commands::Controller) {
        Commands::Controller => {
            let client = Client::try_default().await?;
            ensure_crds_installed(&client).await?;
            run_controller(client, cli.config, registry).await;
            Ok(())
        }
        Commands::Resolve {
            resolver_type,
            params,
            config,
        } => {
            let resource = resolve_once(
                &registry,
                &resolver_type,
                into_map(params),
                ResolverConfig::new(into_map(config)),
                cli.config.default_resolver_timeout,
            )
            .await?;

            for (key, value) in resource.annotations() {
                tracing::info!(annotation = %key, %value, "resolved annotation");
            }
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(resource.data())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
