use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use prometheus::Registry;
use reporter_config::{InfluxDbReporterConfig, ReporterConfig};
use reporter_influxdb::InfluxDbReporterAdapter;
use reporter_telemetry::ReporterMetrics;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enable every configured reporter and push metrics until interrupted
    Run(ConfigArgs),
    /// Validate the configuration and print each reporter's candidate hosts
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file. Without it, `config/reporter.yaml` and the
    /// `REPORTER_*` environment are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: ConfigArgs,

    /// Also print the merged configuration as YAML
    #[arg(long)]
    pub print: bool,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run(load(&args)?).await,
        Commands::Check(args) => {
            let config = load(&args.source)?;
            if args.print {
                print!("{}", serde_yaml::to_string(&config).context("rendering configuration")?);
            }
            for line in describe(&config) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn load(args: &ConfigArgs) -> anyhow::Result<ReporterConfig> {
    match &args.config {
        Some(path) => ReporterConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => ReporterConfig::load().context("loading default configuration"),
    }
}

fn reporter_name(index: usize) -> String {
    format!("influxdb-{}", index)
}

async fn run(config: ReporterConfig) -> anyhow::Result<()> {
    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    registry
        .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))
        .context("registering process metrics")?;

    let mut adapters = Vec::new();
    for (index, reporter_config) in config.influxdb.into_iter().enumerate() {
        let name = reporter_name(index);
        let metrics = ReporterMetrics::register(&name, &registry)
            .with_context(|| format!("registering metrics for {}", name))?;

        let mut adapter = InfluxDbReporterAdapter::new(reporter_config).with_metrics(metrics);
        if adapter.enable(&registry).await {
            adapters.push(adapter);
        } else {
            warn!(reporter = %name, "Reporter could not be enabled, continuing without it");
        }
    }

    if adapters.is_empty() {
        warn!("No reporter is enabled, metrics will not be pushed");
    }
    info!(enabled = adapters.len(), "Reporting metrics, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("Shutting down, pushing final report");
    for adapter in &adapters {
        adapter.report().await;
    }
    Ok(())
}

/// Human readable summary of the configured reporters.
fn describe(config: &ReporterConfig) -> Vec<String> {
    if config.influxdb.is_empty() {
        return vec!["no reporters configured".to_string()];
    }

    let mut lines = Vec::new();
    for (index, reporter) in config.influxdb.iter().enumerate() {
        lines.push(summary(&reporter_name(index), reporter));
        let hosts = reporter.full_host_list();
        if hosts.is_empty() {
            lines.push("  (no hosts configured)".to_string());
        }
        for host in hosts {
            lines.push(format!("  {}://{}", reporter.protocol, host));
        }
    }
    lines
}

fn summary(name: &str, reporter: &InfluxDbReporterConfig) -> String {
    format!(
        "{}: db={} tag={} period={} {} rates={} durations={}",
        name,
        reporter.db_name,
        reporter.resolved_tag(),
        reporter.period,
        reporter.timeunit,
        reporter.rateunit,
        reporter.durationunit,
    )
}
