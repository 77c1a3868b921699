mod config;
mod db;
mod dedup;
mod driver;
mod error;
mod export;
#[cfg(test)]
mod fixtures;
mod judges;
mod model;
mod normalize;
mod pagination;
mod parser;
mod pipeline;
mod sink;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::dedup::DedupPolicy;
use crate::driver::PageDriver;
use crate::pipeline::{Pipeline, RunStats};
use crate::sink::RecordSink;

#[derive(Parser)]
#[command(name = "expedientes", about = "Corruption case listing scraper and normalizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the live listing through a Chrome session
    Scrape {
        #[command(flatten)]
        run: RunArgs,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
    /// Run the pipeline over saved HTML snapshots (<dir>/<tab-button-id>/<NNN>.html)
    Replay {
        dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Load judges from a court directory CSV export
    Judges {
        csv: PathBuf,
    },
    /// Show row counts per table
    Stats,
}

#[derive(Args)]
struct RunArgs {
    /// Skip the SQLite sink
    #[arg(long)]
    no_db: bool,
    /// Skip the CSV sink
    #[arg(long)]
    no_csv: bool,
    /// Don't expand filing history panels
    #[arg(long)]
    no_expand: bool,
    /// Override the dedup policy
    #[arg(long, value_enum)]
    dedup: Option<DedupPolicy>,
    /// Only scan tabs with these status labels
    #[arg(long = "tab")]
    tabs: Vec<String>,
}

impl RunArgs {
    fn apply(&self, cfg: &mut AppConfig) {
        if self.no_db {
            cfg.sinks.db = false;
        }
        if self.no_csv {
            cfg.sinks.csv = false;
        }
        if self.no_expand {
            cfg.expand_history = false;
        }
        if let Some(policy) = self.dedup {
            cfg.dedup = policy;
        }
        if !self.tabs.is_empty() {
            cfg.tabs.retain(|t| self.tabs.iter().any(|s| s.eq_ignore_ascii_case(&t.status_label)));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut cfg = config::load().context("loading configuration")?;

    let result = match cli.command {
        Commands::Scrape { run, headed } => {
            run.apply(&mut cfg);
            if headed {
                cfg.headless = false;
            }
            scrape_live(&cfg).await
        }
        Commands::Replay { dir, run } => {
            run.apply(&mut cfg);
            let mut driver = driver::snapshot::SnapshotDriver::from_dir(&dir)?;
            let stats = run_pipeline(&cfg, &mut driver).await?;
            stats.print();
            Ok(())
        }
        Commands::Judges { csv } => {
            let sink = db::SqliteSink::open(&cfg.db_path)?;
            let s = judges::import_directory(sink.connection(), &csv)?;
            println!(
                "Imported {} rows: {} courts, {} judge assignments ({} skipped).",
                s.rows, s.courts, s.assignments, s.skipped
            );
            Ok(())
        }
        Commands::Stats => {
            let sink = db::SqliteSink::open(&cfg.db_path)?;
            for (table, n) in db::get_stats(sink.connection())? {
                println!("{:<16} {}", table, n);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

#[cfg(feature = "browser")]
async fn scrape_live(cfg: &AppConfig) -> anyhow::Result<()> {
    let mut driver = driver::chrome::ChromeDriver::launch(cfg.headless).await?;
    let result = run_pipeline(cfg, &mut driver).await;
    driver.close().await;
    result?.print();
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn scrape_live(_cfg: &AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("built without the `browser` feature; rebuild with `--features browser` or use `replay`")
}

async fn run_pipeline<D: PageDriver>(cfg: &AppConfig, driver: &mut D) -> anyhow::Result<RunStats> {
    let mut owned: Vec<Box<dyn RecordSink>> = Vec::new();
    if cfg.sinks.db {
        owned.push(Box::new(db::SqliteSink::open(&cfg.db_path)?));
    }
    if cfg.sinks.csv {
        owned.push(Box::new(export::CsvSink::create(&cfg.csv_dir, &cfg.csv_prefix)?));
    }
    let mut sinks: Vec<&mut dyn RecordSink> = owned
        .iter_mut()
        .map(|s| s.as_mut() as &mut dyn RecordSink)
        .collect();

    let stats = Pipeline::new(cfg).run(driver, &mut sinks).await?;
    Ok(stats)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
