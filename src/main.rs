use anyhow::Result;
use awsrows::aws::error::format_aws_error;
use awsrows::aws::regions;
use awsrows::config::Config;
use awsrows::hydrate::{HydrateError, QueryContext, GLOBAL_REGION};
use awsrows::table::{regional_columns, TableDef};
use awsrows::Connection;
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// SDK crates that log every request at debug level
const NOISY_TARGETS: &[&str] = &["aws_config", "aws_smithy_runtime", "aws_sdk_sts", "hyper"];

/// Resolve the AWS partition, account and region columns
#[derive(Parser, Debug)]
#[command(name = "awsrows", version, about, long_about = None)]
struct Args {
    /// Regions to resolve (repeatable or comma separated)
    #[arg(short, long, value_delimiter = ',')]
    region: Vec<String>,

    /// Resolve every commercial region
    #[arg(long, conflicts_with = "region")]
    all_regions: bool,

    /// Shared config profile for credentials and region
    #[arg(long)]
    profile: Option<String>,

    /// STS endpoint override (local emulator)
    #[arg(long)]
    endpoint: Option<String>,

    /// Print the table schema instead of resolving rows
    #[arg(long)]
    schema: bool,

    /// Remember the selected regions in the config file
    #[arg(long)]
    save: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Log to a file; `RUST_LOG` overrides the filter built from `level`
fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();
    let (dir, file_name) = match (log_path.parent(), log_path.file_name()) {
        (Some(dir), Some(file_name)) => (dir.to_path_buf(), file_name.to_owned()),
        _ => anyhow::bail!("Invalid log path: {:?}", log_path),
    };
    std::fs::create_dir_all(&dir)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = tracing_level.to_string().to_lowercase();
        for target in NOISY_TARGETS {
            directives.push_str(&format!(",{}=warn", target));
        }
        EnvFilter::new(directives)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    tracing::info!("awsrows {} logging to {:?}", env!("CARGO_PKG_VERSION"), log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("awsrows").join("awsrows.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".awsrows").join("awsrows.log");
    }
    PathBuf::from("awsrows.log")
}

/// Regions to query (CLI > config > AWS region chain > global)
async fn select_regions(args: &Args, config: &Config) -> Result<Vec<String>> {
    if args.all_regions {
        return Ok(regions::list_regions());
    }
    if args.region.is_empty() {
        return Ok(config.effective_regions().await);
    }

    for region in &args.region {
        if region != GLOBAL_REGION && !regions::validate_region(region) {
            anyhow::bail!("Invalid region: {}", region);
        }
    }
    Ok(args.region.clone())
}

fn describe_error(err: &HydrateError) -> String {
    match err.source_error() {
        Some(source) => format_aws_error(source),
        None => err.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let table = TableDef::new(
        "aws_account_context",
        "Partition, account and region of the configured credentials",
        regional_columns(Vec::new()),
    );
    if args.schema {
        println!("{}", serde_json::to_string_pretty(&table.schema())?);
        return Ok(());
    }

    let mut config = Config::load();
    if let Some(endpoint) = &args.endpoint {
        config.sts_endpoint = Some(endpoint.clone());
    }
    if let Some(profile) = &args.profile {
        config.profile = Some(profile.clone());
    }

    let regions = select_regions(&args, &config).await?;
    if args.save {
        config.set_regions(regions.clone())?;
    } else {
        config.regions = regions.clone();
    }
    tracing::info!(
        "Resolving common columns for {:?} (STS region {:?}, profile {:?})",
        regions,
        config.default_region(),
        config.profile
    );

    let connection = Connection::from_config(&config);

    // The account context table has no item fields of its own
    let item = Value::Null;
    let contexts = QueryContext::for_regions(regions);
    let results = futures::future::join_all(
        contexts
            .iter()
            .map(|ctx| table.bind_row(&connection, ctx, &item)),
    )
    .await;

    let mut failed = 0;
    for (ctx, result) in contexts.iter().zip(results) {
        match result {
            Ok(row) => println!("{}", serde_json::to_string(&row)?),
            Err(err) => {
                failed += 1;
                tracing::error!("{}: {}", ctx.region(), err);
                eprintln!("Error [{}]: {}", ctx.region(), describe_error(&err));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} regions failed", failed, contexts.len());
    }

    Ok(())
}
