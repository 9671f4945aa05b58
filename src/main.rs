use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use csam_inventory::config::DEFAULT_CONFIG_PATH;
use csam_inventory::Batch;
use csam_inventory::Config;
use csam_inventory::Extractor;
use csam_inventory::RawDocument;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "csam-inventory", version, about = "Extract and consolidate hostnames from hardware inventory documents")]
struct CliArgs {
    #[arg(long, global = true, value_name = "PATH", help = "Configuration file [default: ./config.yml]")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    log_level: Option<String>,

    #[arg(short, long, global = true, conflicts_with = "quiet", help = "Enable debug logging")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Only log errors")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every inventory in the download directory and write the CSV
    Export(ExportArgs),
    /// Print the hostnames found in individual documents
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long, value_name = "DIR", help = "Directory of inventory files")]
    input: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Path of the exported CSV")]
    output: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "System id, organization and acronym CSV")]
    org_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

fn main() {
    let args = CliArgs::parse();
    if let Err(error) = run(&args) {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG_PATH)),
    }
    .context("Failed to load configuration")?;
    init_logging(args, &config);
    debug!("Arguments: {:?}", args);

    match &args.command {
        Commands::Export(export) => handle_export(export, &config),
        Commands::Extract(extract) => handle_extract(extract, &config),
    }
}

fn handle_export(args: &ExportArgs, config: &Config) -> Result<()> {
    let mut batch = Batch::from_config(config);
    if let Some(input) = &args.input {
        batch.org_file = input.join(csam_inventory::inventory::export::ORG_FILE_NAME);
        batch.input = input.to_owned();
    }
    if let Some(output) = &args.output {
        batch.output = output.to_owned();
    }
    if let Some(org_file) = &args.org_file {
        batch.org_file = org_file.to_owned();
    }

    let report = batch
        .run(&Extractor::from_config(config))
        .with_context(|| format!("Failed to export inventories from {}", batch.input.display()))?;
    println!(
        "Exported {} hostnames for {} systems to {} ({} documents, {} failed, {} skipped)",
        report.rows,
        report.systems,
        batch.output.display(),
        report.processed,
        report.failed,
        report.skipped
    );
    Ok(())
}

fn handle_extract(args: &ExtractArgs, config: &Config) -> Result<()> {
    let extractor = Extractor::from_config(config);
    for path in &args.files {
        println!("{}", path.display());
        // Failures are already logged, the remaining files are still read
        if let Ok(hostnames) = extractor.extract(&RawDocument::new(path.to_owned())) {
            for hostname in hostnames {
                println!("  {}", hostname);
            }
        }
    }
    Ok(())
}

fn init_logging(args: &CliArgs, config: &Config) {
    let level = if let Some(level) = &args.log_level {
        parse_level(level)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        parse_level(&config.log_level)
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("csam_inventory={}", level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn parse_level(level: &str) -> Level {
    level.trim().parse::<Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error", level);
        Level::INFO
    })
}
