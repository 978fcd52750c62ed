//! Keystone Command Line Interface
//!
//! Advises materialized-index schemas for wide-column stores from a
//! workload file.

mod error;
mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keystone::{load_workload, Advisor, AdvisorConfig};
use keystone_plan::CostModelKind;

use crate::error::Result;

/// Keystone Command Line Interface
///
/// An automated schema advisor for wide-column NoSQL stores.
#[derive(Parser, Debug)]
#[command(name = "keystone")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON
    Json,
}

/// Which cost model prices plan steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CostModelArg {
    /// Rows touched
    EntryCount,
    /// Bytes moved
    FieldSize,
}

impl From<CostModelArg> for CostModelKind {
    fn from(arg: CostModelArg) -> Self {
        match arg {
            CostModelArg::EntryCount => Self::EntryCount,
            CostModelArg::FieldSize => Self::FieldSize,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recommend a schema for a workload file
    Advise {
        /// Path to the workload file
        workload: PathBuf,

        /// Storage budget in bytes (overrides the file's Budget)
        #[arg(short, long)]
        budget: Option<u64>,

        /// Active mix label (overrides the file's Mix)
        #[arg(short, long)]
        mix: Option<String>,

        /// Cost model
        #[arg(short, long, value_enum, default_value = "entry-count")]
        cost_model: CostModelArg,

        /// Wall-clock limit in seconds for planning and selection
        #[arg(short, long)]
        deadline_secs: Option<u64>,
    },

    /// Validate a workload file and report every problem
    Check {
        /// Path to the workload file
        workload: PathBuf,
    },

    /// Show the plan one statement gets under the recommended schema
    Plan {
        /// Path to the workload file
        workload: PathBuf,

        /// The statement to plan
        statement: String,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Advise { workload, budget, mix, cost_model, deadline_secs } => {
            advise(&workload, budget, mix, cost_model, deadline_secs, cli.format)
        }
        Commands::Check { workload } => check(&workload),
        Commands::Plan { workload, statement } => plan(&workload, &statement, cli.format),
    }
}

fn advise(
    path: &Path,
    budget: Option<u64>,
    mix: Option<String>,
    cost_model: CostModelArg,
    deadline_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let workload = load_workload(&text)?;

    let mut config = AdvisorConfig::new().with_cost_model(cost_model.into());
    config.budget = budget;
    config.mix = mix;
    config.deadline = deadline_secs.map(Duration::from_secs);

    let recommendation = Advisor::new(config).advise(&workload)?;
    output::print_recommendation(&recommendation, format)
}

fn check(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let workload = load_workload(&text)?;

    if workload.is_valid() {
        println!(
            "ok: {} entities, {} statements",
            workload.model().len(),
            workload.statements().len()
        );
        for (_, entity) in workload.model().entities() {
            println!("  {} * {} ({} fields)", entity.name, entity.count, entity.fields.len());
        }
        return Ok(());
    }

    for (statement, problem) in workload.problems() {
        eprintln!("invalid: {statement}\n  {problem}");
    }
    Err(keystone::Error::InvalidWorkload(format!(
        "{} invalid statements",
        workload.problems().len()
    ))
    .into())
}

fn plan(path: &Path, statement: &str, format: OutputFormat) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let workload = load_workload(&text)?;

    let recommendation = Advisor::new(AdvisorConfig::new()).advise(&workload)?;
    let rendered = keystone_query::parse_statement(workload.model(), statement)
        .map_err(keystone::Error::from)?
        .display(workload.model());

    // Read queries carry a chosen plan; mutations carry maintenance plans,
    // one per affected chosen index.
    let query = recommendation
        .queries
        .iter()
        .find(|q| planned_matches(&q.statement, statement, &rendered, workload.model()));
    if let Some(query) = query {
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(query)
                    .map_err(|e| anyhow::anyhow!("serializing plan: {e}"))?;
                println!("{json}");
            }
            OutputFormat::Table => {
                println!("{} (cost {:.2})", query.statement, query.cost);
                for step in &query.steps {
                    println!("  {step}");
                }
            }
        }
        return Ok(());
    }

    let updates: Vec<&keystone::UpdateRecommendation> = recommendation
        .updates
        .iter()
        .filter(|u| planned_matches(&u.statement, statement, &rendered, workload.model()))
        .collect();
    if !updates.is_empty() {
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&updates)
                    .map_err(|e| anyhow::anyhow!("serializing plan: {e}"))?;
                println!("{json}");
            }
            OutputFormat::Table => {
                for update in updates {
                    println!(
                        "{} -> {} (cost {:.2})",
                        update.statement, update.index_key, update.cost
                    );
                    for support in &update.support_queries {
                        println!("  support: {support}");
                    }
                    for step in &update.steps {
                        println!("  {step}");
                    }
                }
            }
        }
        return Ok(());
    }

    // A mutation can be in the workload yet touch no chosen index.
    let in_workload = workload
        .statements()
        .iter()
        .any(|ws| planned_matches(&ws.text, statement, &rendered, workload.model()));
    if in_workload {
        println!("statement needs no maintenance under the recommended schema");
        return Ok(());
    }
    Err(anyhow::anyhow!("statement is not part of the workload: {statement}").into())
}

/// Matches a planned statement against the requested one, tolerating
/// formatting differences by comparing the parsed rendering.
fn planned_matches(
    planned: &str,
    requested: &str,
    requested_rendered: &str,
    model: &keystone_model::Model,
) -> bool {
    if planned == requested {
        return true;
    }
    keystone_query::parse_statement(model, planned)
        .map(|s| s.display(model) == requested_rendered)
        .unwrap_or(false)
}
