//! # Surge CLI
//!
//! Finds the concurrency level at which each API endpoint starts to degrade.
//!
//! ## Usage
//!
//! ```bash
//! # Write a starting configuration
//! surge init-config --output surge.toml
//!
//! # Escalate every configured endpoint
//! surge stress --config surge.toml --output results.json
//!
//! # Quick sweep of one endpoint with 5 second levels
//! surge stress --target http://localhost:3000 --duration 5 --endpoint health
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use surge_core::{FanoutProgress, LoggingConfig, ProgressSink, StressConfig, TracingProgress};
use surge_loadtest::{run_http, ConsoleProgress, PrometheusProgress};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "surge")]
#[command(author = "Surge Contributors")]
#[command(version)]
#[command(about = "Concurrency escalation stress testing for HTTP APIs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Escalate load on each endpoint until it degrades
    Stress {
        /// Configuration file (TOML)
        #[arg(short, long, env = "SURGE_CONFIG")]
        config: Option<PathBuf>,

        /// Target base URL, overrides the configuration
        #[arg(short, long)]
        target: Option<String>,

        /// Load duration per concurrency level in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Only test the named endpoint (repeatable)
        #[arg(short, long = "endpoint", value_name = "NAME")]
        endpoints: Vec<String>,

        /// Write results to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write Prometheus metrics to a file after the sweep
        #[arg(long)]
        metrics_out: Option<PathBuf>,

        /// Suppress per-level console output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the concurrency ladder of each endpoint without sending traffic
    Plan {
        /// Configuration file (TOML)
        #[arg(short, long, env = "SURGE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "surge.toml")]
        output: PathBuf,
    },
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(false).with_file(false))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StressConfig> {
    match path {
        Some(path) => StressConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(StressConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stress {
            config,
            target,
            duration,
            endpoints,
            output,
            metrics_out,
            quiet,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(target) = target {
                config.target.base_url = target;
            }
            if let Some(duration) = duration {
                config.escalation.duration_secs = duration;
            }
            init_logging(&config.logging, cli.verbose);

            info!("Surge v{}", env!("CARGO_PKG_VERSION"));

            let prometheus =
                Arc::new(PrometheusProgress::new().context("failed to register metrics")?);
            let console: Arc<dyn ProgressSink> = if quiet {
                Arc::new(TracingProgress)
            } else {
                Arc::new(ConsoleProgress)
            };
            let progress = FanoutProgress::new().with(console).with(prometheus.clone());

            let report = run_http(config, endpoints, Arc::new(progress)).await?;
            report.print_report();

            if let Some(path) = output {
                report
                    .save_json(&path)
                    .with_context(|| format!("failed to write results to {}", path.display()))?;
                info!("Results saved to {}", path.display());
            }

            if let Some(path) = metrics_out {
                let text = prometheus.encode().context("failed to encode metrics")?;
                std::fs::write(&path, text)
                    .with_context(|| format!("failed to write metrics to {}", path.display()))?;
                info!("Metrics saved to {}", path.display());
            }
        }

        Commands::Plan { config } => {
            let config = load_config(config.as_deref())?;
            init_logging(&config.logging, cli.verbose);

            println!("\n╔══════════════════════════════════════════════════════════════╗");
            println!("║                    SURGE ESCALATION PLAN                     ║");
            println!("╚══════════════════════════════════════════════════════════════╝");
            println!("  Target:          {}", config.target.base_url);
            println!("  Level duration:  {}s", config.escalation.duration_secs);
            println!("  Request timeout: {}s", config.escalation.timeout_secs);

            for spec in &config.endpoints {
                let ladder: Vec<String> =
                    spec.effective_ladder().iter().map(u32::to_string).collect();
                let auth = if spec.requires_auth { " [auth]" } else { "" };
                println!("\n  {} {} {}{}", spec.method, spec.path, spec.name, auth);
                println!("    max connections: {}", spec.max_connections);
                println!("    ladder:          {}", ladder.join(" → "));
            }
            println!();
        }

        Commands::InitConfig { output } => {
            let config = StressConfig::default();
            config
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("✅ Configuration written to {}", output.display());
        }
    }

    Ok(())
}
