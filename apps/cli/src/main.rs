#![deny(warnings)]

//! Command line front end: manage recurring rules and expand them into
//! quests for a day.

mod config;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::AppConfig;
use expansion::{
    parse_target_date, CancellationToken, DeleteScope, ExpansionEngine, RuleService, RuleStore,
};
use persistence::SqliteStore;
use quest_core::{Rule, RuleDraft, RuleId};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "quests", version = VERSION, about = "Recurring quest tracker")]
struct Cli {
    /// YAML config file; `quests.yaml` in the working directory is used when present.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and its schema.
    Init,
    /// Add a recurring rule described in a YAML file.
    AddRule { path: PathBuf },
    /// List stored rules with their next firing date.
    ListRules,
    /// List stored quests by due date.
    ListQuests,
    /// Delete a rule.
    DeleteRule {
        id: String,
        /// Also delete its generated quests due today or later.
        #[arg(long)]
        cascade: bool,
    },
    /// Show the next firing dates of a rule.
    Preview {
        id: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// First date to consider (YYYY-MM-DD), default today.
        #[arg(long)]
        from: Option<String>,
    },
    /// Expand all rules for a date and print the run report as JSON.
    Run {
        /// Target date (YYYY-MM-DD), default today.
        #[arg(long)]
        date: Option<String>,
    },
}

fn init_logging(cfg: &AppConfig) {
    let fallback = cfg.log_filter.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn read_draft(path: &Path) -> Result<RuleDraft> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading rule file {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing rule file {}", path.display()))
}

async fn require_rule(store: &SqliteStore, id: &RuleId) -> Result<Rule> {
    match store.get(id).await? {
        Some(rule) => Ok(rule),
        None => bail!("rule not found: {id}"),
    }
}

/// One `list-rules` row: schedule, firings used and left, next and last date.
fn rule_line(rule: &Rule, from: NaiveDate) -> String {
    let date_or_dash = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    let next = recurrence::upcoming(rule, from, 1).first().copied();
    let left = recurrence::remaining_firings(rule)
        .map_or_else(|| "-".to_string(), |n| n.to_string());
    format!(
        "{}\t{}/{}\t{}\t{}\tfired {}\tleft {}\tnext {}\tends {}",
        rule.id,
        rule.frequency,
        rule.interval,
        rule.quest_rank,
        rule.task_name,
        rule.fired_count,
        left,
        date_or_dash(next),
        date_or_dash(recurrence::final_firing(rule)),
    )
}

async fn run_command(cli: Cli, cfg: AppConfig) -> Result<ExitCode> {
    let store = Arc::new(
        SqliteStore::connect(&cfg.database_url)
            .await
            .with_context(|| format!("opening database {}", cfg.database_url))?,
    );
    let rules = RuleService::new(store.clone(), store.clone());

    match cli.command {
        Commands::Init => {
            println!("database ready at {}", cfg.database_url);
        }
        Commands::AddRule { path } => {
            let rule = rules.create(read_draft(&path)?, today()).await?;
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }
        Commands::ListRules => {
            let from = today();
            for rule in store.list_active_rules().await? {
                println!("{}", rule_line(&rule, from));
            }
        }
        Commands::ListQuests => {
            for quest in store.list_quests().await? {
                let source = quest
                    .source_rule
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    quest.due_date,
                    quest.status,
                    quest.quest_rank,
                    quest.quest_name,
                    quest.id,
                    source
                );
            }
        }
        Commands::DeleteRule { id, cascade } => {
            let scope = if cascade {
                DeleteScope::WithFutureInstances
            } else {
                DeleteScope::RuleOnly
            };
            let deleted = rules.delete(&RuleId(id.clone()), scope, today()).await?;
            println!(
                "deleted rule {} ({} future quests removed)",
                id, deleted.removed_quests
            );
        }
        Commands::Preview { id, count, from } => {
            let rule = require_rule(&store, &RuleId(id)).await?;
            let from = match from {
                Some(raw) => parse_target_date(&raw)?,
                None => today(),
            };
            for date in recurrence::upcoming(&rule, from, count) {
                println!("{} {}", date, date.format("%a"));
            }
        }
        Commands::Run { date } => {
            let target = match date {
                Some(raw) => parse_target_date(&raw)?,
                None => today(),
            };
            let engine = ExpansionEngine::new(store.clone(), store, cfg.engine_config());
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current rule");
                    on_signal.cancel();
                }
            });
            let report = engine.run(target, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref())?;
    init_logging(&cfg);
    info!(version = VERSION, database = %cfg.database_url, "starting");
    run_command(cli, cfg).await
}
