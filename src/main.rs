use anyhow::Context;
use clap::{Parser, ValueEnum};
use component_check::checks::{CheckOutcome, CheckReport, ExecutionMode, Orchestrator};
use component_check::config::{Config, ObservabilityConfig, DEFAULT_CONFIG_PATH};
use component_check::AppError;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "component-check")]
#[command(about = "Verify backing services before the platform starts", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "COMPONENT_CHECK_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Run all checks at the same time
    #[arg(long)]
    concurrent: bool,

    /// Show credentials in error output
    #[arg(long)]
    show_secrets: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config).map_err(AppError::from) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[{}] failed to load {}: {}", e.error_code(), cli.config, e);
            std::process::exit(2);
        }
    };
    config.check.concurrent |= cli.concurrent;
    config.check.show_secrets |= cli.show_secrets;

    init_tracing(&config.observability);

    let orchestrator = Orchestrator::from_config(&config);
    tracing::info!(
        config = %cli.config,
        concurrent = orchestrator.mode() == ExecutionMode::Concurrent,
        "Starting component checks v{}",
        env!("CARGO_PKG_VERSION")
    );

    let report = orchestrator.run().await;

    match cli.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => print_json(&report).context("failed to write check report")?,
    }

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("component_check={}", observability.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json(report: &CheckReport) -> component_check::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report.summaries())?;
    writeln!(stdout)?;
    Ok(())
}

fn print_text(report: &CheckReport) {
    for entry in report.entries() {
        match &entry.result {
            Ok(CheckOutcome::Verified(descriptor)) => println!("✅ {}: {}", entry.backend, descriptor),
            Ok(CheckOutcome::Skipped(reason)) => {
                println!("⚠️  {}: skipped, {}", entry.backend, reason)
            }
            Err(err) => println!("❌ {}: [{}] {}", entry.backend, err.kind(), err),
        }
    }

    let failed = report.failures().count();
    println!();
    if failed == 0 {
        println!("All {} components are ready", report.entries().len());
    } else {
        println!("{} of {} components failed", failed, report.entries().len());
    }
}
