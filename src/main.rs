use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floor_presence::report::{self, DetailFilter};
use floor_presence::{
    AggregationResult, ClassificationRun, EngineConfig, Ordering, PresenceEngine, PresenceFlag,
    UnscannedPolicy,
};

#[derive(Parser)]
#[command(name = "floor-presence")]
#[command(about = "Live floor presence for warehouse associates", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Evaluation instant (RFC 3339), defaults to now
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,
    /// Unscanned policy: derived | explicit-marker
    #[arg(long, global = true)]
    policy: Option<UnscannedPolicy>,
    /// On-floor freshness window in minutes, 0 disables windowing
    #[arg(long, global = true)]
    floor_window: Option<i64>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Headcount per presence tile with a one-level breakdown
    Summary {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "job_department")]
        by: String,
    },
    /// Nested breakdown of one presence category
    Breakdown {
        #[arg(long)]
        csv: PathBuf,
        /// On Floor | Scanned In | Unscanned | Clocked In | In Position; all associates when omitted
        #[arg(long)]
        flag: Option<PresenceFlag>,
        #[arg(long, value_delimiter = ',', default_value = "work_department_group,sub_department,line")]
        by: Vec<String>,
        /// Reference order for the outermost level
        #[arg(long, value_delimiter = ',')]
        template: Vec<String>,
        /// Label collecting groups missing from the template
        #[arg(long)]
        catch_all: Option<String>,
    },
    /// Latest activity per associate
    Associates {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        job_department: Option<String>,
        #[arg(long)]
        work_department: Option<String>,
        #[arg(long)]
        work_position: Option<String>,
        #[arg(long)]
        scanned_in: Option<bool>,
        #[arg(long)]
        hide_names: bool,
    },
    /// Generate a markdown wallboard report
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_delimiter = ',', default_value = "work_department_group,sub_department")]
        by: Vec<String>,
        #[arg(long, default_value = "presence.md")]
        out: PathBuf,
        #[arg(long)]
        hide_names: bool,
    },
}

#[derive(Serialize)]
struct TileSummary<'a> {
    flag: PresenceFlag,
    title: &'static str,
    count: usize,
    breakdown: &'a AggregationResult,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("floor_presence=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if cli.at.is_some() {
        config.evaluation_instant = cli.at;
    }
    if let Some(policy) = cli.policy {
        config.unscanned_policy = policy;
    }
    if cli.floor_window.is_some() {
        config.floor_window_minutes = cli.floor_window;
    }
    let engine = PresenceEngine::new(config).context("invalid configuration")?;

    match cli.command {
        Commands::Summary { csv, by } => {
            let run = classify(&engine, &csv)?;
            let levels = engine.levels(&[by])?;
            let mut tiles = Vec::new();
            for flag in PresenceFlag::ALL {
                tiles.push((flag, run.count(flag), run.breakdown(Some(flag), &levels)?));
            }

            if cli.json {
                let summary: Vec<TileSummary> = tiles
                    .iter()
                    .map(|(flag, count, breakdown)| TileSummary {
                        flag: *flag,
                        title: flag.title(),
                        count: *count,
                        breakdown,
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!(
                "Presence as of {} ({} policy):",
                run.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                run.unscanned_policy
            );
            for (flag, count, breakdown) in &tiles {
                println!("{}: {}", flag.title(), count);
                for row in &breakdown.rows {
                    println!("  - {}: {}", row.label, row.count);
                }
            }
        }
        Commands::Breakdown {
            csv,
            flag,
            by,
            template,
            catch_all,
        } => {
            let run = classify(&engine, &csv)?;
            let mut levels = engine.levels(&by)?;
            if !template.is_empty() {
                if let Some(outer) = levels.first_mut() {
                    outer.ordering = Ordering::template(template, catch_all.as_deref());
                }
            }
            let breakdown = run.breakdown(flag, &levels)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
                return Ok(());
            }

            let title = flag.map_or("All Associates", PresenceFlag::title);
            println!("{} — {}", title, breakdown.total);
            if breakdown.is_empty() {
                println!("No associates found for this category.");
            } else {
                let mut output = String::new();
                report::write_tree(&mut output, &breakdown, 0);
                print!("{output}");
            }
        }
        Commands::Associates {
            csv,
            id,
            name,
            job_department,
            work_department,
            work_position,
            scanned_in,
            hide_names,
        } => {
            let run = classify(&engine, &csv)?;
            let filter = DetailFilter {
                id,
                name,
                job_department,
                work_department,
                work_position,
                scanned_in,
            };
            let rows = report::detail_rows(&run, &filter, hide_names);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            if rows.is_empty() {
                println!("No associates match these filters.");
                return Ok(());
            }
            let mut output = String::new();
            report::write_detail_table(&mut output, &rows, run.placeholder());
            print!("{output}");
        }
        Commands::Report {
            csv,
            by,
            out,
            hide_names,
        } => {
            let run = classify(&engine, &csv)?;
            let levels = engine.levels(&by)?;
            let markdown = report::build_report(&run, &levels, hide_names)?;
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn classify(engine: &PresenceEngine, csv: &Path) -> anyhow::Result<ClassificationRun> {
    let table = floor_presence::ingest::read_csv_path(csv)
        .with_context(|| format!("failed to read {}", csv.display()))?;
    let run = engine.run(&table)?;
    Ok(run)
}
