use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use flowsentry::alert::select_most_severe;
use flowsentry::config::Config;
use flowsentry::database::Database;
use flowsentry::detect::ClassifierRegistry;
use flowsentry::models::PredictionResult;
use flowsentry::FlowSentry;

#[derive(Parser)]
#[command(name = "flowsentry")]
#[command(author, version, about = "Flow-based network intrusion detection pipeline")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the capture/detection pipeline
    Start,

    /// Classify an existing flow CSV without the live pipeline
    Analyze {
        /// Header-stripped flow file to classify
        flow_file: PathBuf,
    },

    /// Validate configuration, directories and classifier registry
    Check,
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Start => FlowSentry::new(config).run().await,
        Commands::Analyze { flow_file } => analyze(config, &flow_file),
        Commands::Check => check(config),
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Attack Type")]
    attack_type: String,
    #[tabled(rename = "Anomaly %")]
    percentage: String,
    #[tabled(rename = "Normal")]
    normal: String,
    #[tabled(rename = "Anomaly")]
    anomaly: String,
    #[tabled(rename = "Source IP")]
    source_ip: String,
}

fn result_row(result: &PredictionResult) -> ResultRow {
    match &result.error {
        Some(err) => ResultRow {
            attack_type: result.attack_type.clone(),
            percentage: "-".to_string(),
            normal: "-".to_string(),
            anomaly: "-".to_string(),
            source_ip: format!("error: {}", err),
        },
        None => ResultRow {
            attack_type: result.attack_type.clone(),
            percentage: format!("{:.2}", result.anomaly_percentage),
            normal: result.normal_count.to_string(),
            anomaly: result.anomaly_count.to_string(),
            source_ip: result.source_ip.clone().unwrap_or_else(|| "-".to_string()),
        },
    }
}

fn analyze(config: Config, flow_file: &PathBuf) -> Result<()> {
    let report_threshold = config.detection.report_threshold;
    let alert_threshold = config.detection.alert_threshold;

    let results = FlowSentry::new(config).analyze_file(flow_file)?;
    if results.is_empty() {
        println!("{}", "No classifiers loaded; nothing to evaluate".yellow());
        return Ok(());
    }

    let table = Table::new(results.iter().map(result_row)).to_string();
    println!("{}", table);

    match select_most_severe(&results, report_threshold) {
        Some(severe) if severe.anomaly_percentage > alert_threshold => {
            println!(
                "{}",
                format!(
                    "ALERT: {} at {:.2}% (source {})",
                    severe.attack_type,
                    severe.anomaly_percentage,
                    severe.source_ip.as_deref().unwrap_or("Unknown")
                )
                .red()
                .bold()
            );
        }
        Some(severe) => {
            println!(
                "{}",
                format!(
                    "Above report threshold: {} at {:.2}%",
                    severe.attack_type, severe.anomaly_percentage
                )
                .yellow()
            );
        }
        None => println!("{}", "No attack type above report threshold".green()),
    }

    Ok(())
}

fn check(config: Config) -> Result<()> {
    config.validate()?;
    config.ensure_directories()?;

    println!(
        "Thresholds: report > {}%, alert > {}%",
        config.detection.report_threshold, config.detection.alert_threshold
    );

    let registry = ClassifierRegistry::load(
        &config.detection.models_dir,
        &config.detection.attack_types,
    );
    if registry.is_empty() {
        println!(
            "{}",
            format!(
                "No classifiers loaded from {}",
                config.detection.models_dir.display()
            )
            .yellow()
        );
    } else {
        println!(
            "Loaded {} of {} classifiers: {}",
            registry.len(),
            config.detection.attack_types.len(),
            registry.attack_types().join(", ")
        );
    }

    if config.metrics.enabled {
        match Database::open(&config.metrics.db_path) {
            Ok(_) => println!("Metrics sink: {}", config.metrics.db_path.display()),
            Err(e) => println!("{}", format!("Metrics sink unavailable: {:#}", e).yellow()),
        }
    } else {
        println!("Metrics sink disabled");
    }

    println!("{}", "Configuration OK".green());
    Ok(())
}
