//! Image Registry Config tool
//!
//! Works with the image registry operator's `Config` resource outside the
//! cluster and serves the validating admission webhook inside it.
//!
//! ```text
//! imageregistry-config crd                          print the CRD
//! imageregistry-config validate config.yaml ...     validate manifests
//! imageregistry-config apply --base b --patch p     merge patch + validate
//! imageregistry-config serve --tls-cert c --tls-key k
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use imageregistry::admission::{self, WebhookConfig};
use imageregistry::crd::Config;
use imageregistry::{apply_merge_patch, manifest};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image registry operator configuration tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the Config CustomResourceDefinition as YAML
    Crd,

    /// Validate Config manifests (YAML, multi-document YAML or JSON)
    Validate {
        /// Manifest files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Apply a merge patch to a Config and print the result
    Apply {
        /// Manifest holding the current Config
        #[arg(long)]
        base: PathBuf,

        /// Merge patch (YAML or JSON)
        #[arg(long)]
        patch: PathBuf,
    },

    /// Run the validating admission webhook
    Serve {
        /// Bind address
        #[arg(long, env = "WEBHOOK_ADDR", default_value = "0.0.0.0:8443")]
        addr: SocketAddr,

        /// PEM certificate chain (TLS is enabled with --tls-key)
        #[arg(long, env = "TLS_CERT_FILE")]
        tls_cert: Option<PathBuf>,

        /// PEM private key
        #[arg(long, env = "TLS_KEY_FILE")]
        tls_key: Option<PathBuf>,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Crd => {
            let crd = serde_yaml::to_string(&Config::crd()).context("rendering CRD")?;
            print!("{}", crd);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { files } => validate(&files),
        Commands::Apply { base, patch } => apply(&base, &patch),
        Commands::Serve {
            addr,
            tls_cert,
            tls_key,
        } => {
            let config = WebhookConfig {
                addr,
                tls_cert,
                tls_key,
            };
            info!(addr = %config.addr, "Starting admission webhook");
            admission::serve(config, shutdown_signal()).await?;
            info!("Admission webhook shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn validate(files: &[PathBuf]) -> Result<ExitCode> {
    let mut checked = 0;
    let mut rejected = 0;

    for file in files {
        let documents = manifest::load_documents(file)
            .with_context(|| format!("reading {}", file.display()))?;

        for document in documents {
            checked += 1;
            let label = format!("{}#{}", file.display(), document.index);
            let config = match document.config {
                Ok(config) => config,
                Err(e) => {
                    rejected += 1;
                    println!("{}: rejected: {}", label, e);
                    continue;
                }
            };

            let report = config.validate();
            for warning in &report.warnings {
                println!("{} ({}): warning: {}", label, config.name(), warning);
            }
            if report.is_allowed() {
                println!("{} ({}): valid", label, config.name());
            } else {
                rejected += 1;
                for field_error in &report.errors {
                    println!("{} ({}): {}", label, config.name(), field_error);
                }
            }
        }
    }

    info!(checked, rejected, "Validation complete");
    if rejected > 0 {
        warn!("{} of {} objects rejected", rejected, checked);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn apply(base: &std::path::Path, patch: &std::path::Path) -> Result<ExitCode> {
    let config = manifest::load_config(base).with_context(|| format!("reading {}", base.display()))?;
    let patch = manifest::load_patch(patch).with_context(|| format!("reading {}", patch.display()))?;

    let updated = apply_merge_patch(&config, &patch).context("applying patch")?;

    let warnings = updated
        .validate()
        .into_result()
        .context("patched Config is invalid")?;
    for warning in warnings {
        warn!("{}", warning);
    }

    print!("{}", manifest::to_yaml(&updated)?);
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(cli: &Cli) {
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries command output
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
