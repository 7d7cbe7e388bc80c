use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use marshal::config::Config;
use marshal::core::{Priority, TaskId};
use marshal::orchestration::{
    CollectFormat, DispatchMode, DispatchRequest, StageInputs, Strictness, Tally, TestTallies,
};
use marshal::orchestrator::Orchestrator;
use marshal::workspace::{GitWorkspaces, StubWorkspaces, WorkspaceProvider};
use marshal::{mlog, mlog_warn, AgentName, Result};

/// Marshal - fixed-roster task orchestration for externally-executed work
#[derive(Parser, Debug)]
#[command(name = "marshal")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    MARSHAL_DEBUG=1     Enable debug logging (alternative to --debug)")]
struct Cli {
    /// Enable debug logging (writes to ~/.marshal/marshal.log)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Repository the workspace provider creates worktrees from
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Show agents and tasks, optionally narrowed to one agent
    Status {
        /// Agent name (e.g. natasha, dr-strange)
        agent: Option<String>,
    },

    /// Create a pending task without starting it
    Assign {
        title: String,

        /// Agent to note as assignee
        #[arg(long)]
        assignee: Option<String>,

        /// Dependency task ids, comma separated (e.g. T001,T002)
        #[arg(long, value_delimiter = ',')]
        deps: Vec<String>,
    },

    /// Dispatch a task to an agent, starting or queuing it
    Dispatch {
        /// Agent name
        agent: String,

        /// Task description
        task: String,

        /// Dependency task ids, comma separated
        #[arg(long, value_delimiter = ',')]
        deps: Vec<String>,

        /// Priority: critical, high, medium, low
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Provision an isolated worktree for the task
        #[arg(long)]
        isolate: bool,

        /// Reporting mode: background (compact) or foreground (full)
        #[arg(long, default_value = "background")]
        mode: String,

        /// Acceptance criteria, repeatable
        #[arg(long = "criterion")]
        criteria: Vec<String>,
    },

    /// Build a staged execution plan from a required roster
    Plan {
        /// Required agents, comma separated (e.g. jarvis,ironman,groot)
        #[arg(value_delimiter = ',')]
        roster: Vec<String>,
    },

    /// Wait for and aggregate results of one or more tasks
    Collect {
        /// Task ids
        ids: Vec<String>,

        /// Max seconds to wait for in-progress tasks
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// Output format: summary, detailed, json
        #[arg(long, default_value = "summary")]
        format: String,
    },

    /// Validate a task's completion evidence
    Validate {
        /// Task id
        task: String,

        /// Acceptance criteria, repeatable
        #[arg(long = "criterion")]
        criteria: Vec<String>,

        /// Unit test tally as passed,failed
        #[arg(long)]
        unit: Option<String>,

        /// Integration test tally as passed,failed
        #[arg(long)]
        integration: Option<String>,

        /// End-to-end test tally as passed,failed
        #[arg(long)]
        e2e: Option<String>,

        /// Coverage percentage
        #[arg(long)]
        coverage: Option<f64>,

        /// Documentation paths, repeatable
        #[arg(long = "doc")]
        docs: Vec<String>,

        /// Strictness: strict, moderate, flexible
        #[arg(long)]
        strictness: Option<String>,
    },

    /// Record a task as completed, releasing its agent
    Complete {
        /// Task id
        task: String,
    },

    /// Save a durable snapshot of the session
    Save {
        /// Snapshot id (timestamp when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Free-form reason recorded in the snapshot
        #[arg(long)]
        reason: Option<String>,
    },

    /// Restore the session from a snapshot
    Restore {
        /// Snapshot id
        #[arg(default_value = "latest")]
        id: String,
    },
}

fn parse_ids(raw: &[String]) -> Result<Vec<TaskId>> {
    raw.iter().map(|s| TaskId::from_str(s)).collect()
}

fn parse_agents(raw: &[String]) -> Result<Vec<AgentName>> {
    raw.iter().map(|s| AgentName::from_str(s)).collect()
}

fn parse_tally(raw: &Option<String>) -> Result<Option<Tally>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut parts = raw.splitn(2, ',');
    let passed = parts.next().unwrap_or_default().trim();
    let failed = parts.next().unwrap_or("0").trim();
    let parse = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| marshal::Error::Validation(format!("invalid tally: {}", raw)))
    };
    Ok(Some(Tally::new(parse(passed)?, parse(failed)?)))
}

fn parse_priority(raw: &str) -> Result<Priority> {
    match raw {
        "critical" => Ok(Priority::Critical),
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => Err(marshal::Error::Validation(format!(
            "unknown priority: {} (expected critical, high, medium, or low)",
            other
        ))),
    }
}

fn parse_mode(raw: &str) -> Result<DispatchMode> {
    match raw {
        "background" => Ok(DispatchMode::Background),
        "foreground" => Ok(DispatchMode::Foreground),
        other => Err(marshal::Error::Validation(format!(
            "unknown mode: {} (expected background or foreground)",
            other
        ))),
    }
}

fn parse_strictness(raw: &Option<String>) -> Result<Option<Strictness>> {
    match raw.as_deref() {
        None => Ok(None),
        Some("strict") => Ok(Some(Strictness::Strict)),
        Some("moderate") => Ok(Some(Strictness::Moderate)),
        Some("flexible") => Ok(Some(Strictness::Flexible)),
        Some(other) => Err(marshal::Error::Validation(format!(
            "unknown strictness: {} (expected strict, moderate, or flexible)",
            other
        ))),
    }
}

/// Worktree-backed workspaces when the target is a git repository,
/// otherwise a no-op provider so tracking still works without isolation.
fn workspace_provider(config: &Config, repo: &PathBuf) -> Result<Arc<dyn WorkspaceProvider>> {
    match GitWorkspaces::new(repo, &config.worktrees_dir()?) {
        Ok(git) => Ok(Arc::new(git)),
        Err(e) => {
            mlog_warn!(
                "No git repository at {}, workspace isolation unavailable: {}",
                repo.display(),
                e
            );
            Ok(Arc::new(StubWorkspaces::new()))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    config.ensure_dirs()?;
    let workspaces = workspace_provider(&config, &cli.repo)?;
    let orchestrator = Orchestrator::new(&config, workspaces, &Config::state_dir()?);

    // Sessions persist through the snapshot store: pick up where the last
    // invocation left off, if there is anything to pick up.
    let resumed = orchestrator.restore_state("latest").await.is_ok();
    if resumed {
        mlog!("Resumed session from latest snapshot");
    }

    let mut dirty = true;
    match cli.command {
        Command::Status { agent } => {
            dirty = false;
            let agent = agent.as_deref().map(AgentName::from_str).transpose()?;
            let report = orchestrator.get_status(agent).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Assign {
            title,
            assignee,
            deps,
        } => {
            let assignee = assignee.as_deref().map(AgentName::from_str).transpose()?;
            let task = orchestrator
                .assign_task(&title, assignee, parse_ids(&deps)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Command::Dispatch {
            agent,
            task,
            deps,
            priority,
            isolate,
            mode,
            criteria,
        } => {
            let mut request = DispatchRequest::new(AgentName::from_str(&agent)?, &task)
                .with_dependencies(parse_ids(&deps)?)
                .with_priority(parse_priority(&priority)?);
            request.isolate = isolate;
            request.mode = parse_mode(&mode)?;
            request.acceptance_criteria = criteria;
            let outcome = orchestrator.dispatch(request).await?;
            match outcome.mode {
                // Background dispatches report just enough to track.
                DispatchMode::Background => {
                    let blocked: Vec<String> =
                        outcome.blocked_by.iter().map(|t| t.to_string()).collect();
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "task": outcome.task.to_string(),
                            "agent": outcome.agent,
                            "status": outcome.status,
                            "blocked_by": blocked,
                            "estimated_duration": outcome.estimated_duration,
                            "warnings": outcome.warnings,
                        }))?
                    );
                }
                DispatchMode::Foreground => {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
            }
        }
        Command::Plan { roster } => {
            dirty = false;
            let plan = orchestrator
                .build_execution_plan(&parse_agents(&roster)?, &StageInputs::new());
            plan.validate()?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Collect {
            ids,
            timeout,
            format,
        } => {
            dirty = false;
            let format = CollectFormat::from_str(&format)?;
            let result = orchestrator
                .collect_results(&parse_ids(&ids)?, Duration::from_secs(timeout))
                .await;
            println!("{}", result.render(format)?);
        }
        Command::Validate {
            task,
            criteria,
            unit,
            integration,
            e2e,
            coverage,
            docs,
            strictness,
        } => {
            let tallies = match (parse_tally(&unit)?, parse_tally(&integration)?, parse_tally(&e2e)?)
            {
                (None, None, None) if coverage.is_none() => None,
                (unit, integration, e2e) => Some(TestTallies {
                    unit: unit.unwrap_or_default(),
                    integration: integration.unwrap_or_default(),
                    e2e: e2e.unwrap_or_default(),
                    coverage: coverage.unwrap_or(0.0),
                }),
            };
            let result = orchestrator
                .validate_completion(
                    TaskId::from_str(&task)?,
                    &criteria,
                    tallies,
                    &docs,
                    parse_strictness(&strictness)?,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Complete { task } => {
            let promoted = orchestrator.complete_task(TaskId::from_str(&task)?).await?;
            let promoted: Vec<String> = promoted.iter().map(|t| t.to_string()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "completed": task,
                    "promoted": promoted,
                }))?
            );
        }
        Command::Save { id, reason } => {
            dirty = false;
            let id = orchestrator
                .snapshot_state(id.as_deref(), reason.as_deref())
                .await?;
            println!("Saved snapshot: {}", id);
        }
        Command::Restore { id } => {
            dirty = false;
            let report = orchestrator.restore_state(&id).await?;
            orchestrator.snapshot_state(Some("latest"), None).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if dirty {
        orchestrator.snapshot_state(Some("latest"), None).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    marshal::log::init_with_debug(cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
