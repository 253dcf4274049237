//! Taskboard CLI - Command-line interface for the Taskboard daemon

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Taskboard recurrence and dependency CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "TASKBOARD_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a generation pass now
    Run,

    /// Manage recurring definitions
    #[command(subcommand)]
    Recurring(RecurringCommand),

    /// Manage task dependencies
    #[command(subcommand)]
    Dep(DepCommand),

    /// List blocked tasks across all boards
    Blocked,
}

#[derive(Subcommand)]
enum RecurringCommand {
    /// Attach a recurrence to a template task
    Create {
        #[arg(short, long)]
        board: String,

        /// Template task ID
        #[arg(short, long)]
        template: String,

        #[command(flatten)]
        pattern: PatternArgs,

        /// Project the first due date from this date (YYYY-MM-DD, default now)
        #[arg(long)]
        anchor: Option<String>,
    },

    /// Change the pattern or pause/resume a definition
    Update {
        definition_id: String,

        /// New frequency; the other pattern flags apply to it
        #[arg(short, long)]
        frequency: Option<String>,

        #[arg(short, long, default_value = "1")]
        interval: u32,

        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,

        #[arg(long)]
        day_of_month: Option<u32>,

        #[arg(long)]
        end_date: Option<String>,

        #[arg(long, conflicts_with = "resume")]
        pause: bool,

        #[arg(long)]
        resume: bool,
    },

    /// Delete a definition (generated tasks are kept)
    Delete { definition_id: String },
}

#[derive(Args)]
struct PatternArgs {
    /// daily | weekly | monthly | yearly | custom
    #[arg(short, long)]
    frequency: String,

    #[arg(short, long, default_value = "1")]
    interval: u32,

    /// Weekdays for weekly patterns, 0 = Sunday (e.g. 1,3)
    #[arg(long, value_delimiter = ',')]
    days: Vec<u8>,

    /// Day of month for monthly patterns (1-31)
    #[arg(long)]
    day_of_month: Option<u32>,

    /// Last due date (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<String>,
}

#[derive(Subcommand)]
enum DepCommand {
    /// TASK depends on DEPENDS_ON
    Add {
        #[arg(short, long)]
        board: String,
        task: String,
        depends_on: String,
    },

    /// Remove a dependency edge
    Remove {
        #[arg(short, long)]
        board: String,
        task: String,
        depends_on: String,
    },

    /// Show what a task waits on and what waits on it
    Show {
        #[arg(short, long)]
        board: String,
        task: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct Definition {
    id: String,
    board_id: String,
    template_task_id: String,
    pattern: serde_json::Value,
    next_due_date: i64,
    is_active: bool,
}

#[derive(Tabled)]
struct DefinitionRow {
    id: String,
    board: String,
    template: String,
    frequency: String,
    next_due: String,
    active: bool,
}

impl From<Definition> for DefinitionRow {
    fn from(def: Definition) -> Self {
        Self {
            id: def.id,
            board: def.board_id,
            template: def.template_task_id,
            frequency: def.pattern["frequency"].as_str().unwrap_or("?").to_string(),
            next_due: format_date(def.next_due_date),
            active: def.is_active,
        }
    }
}

#[derive(Deserialize)]
struct TaskView {
    id: String,
    title: String,
    completed: bool,
}

#[derive(Tabled)]
struct TaskRow {
    id: String,
    title: String,
    done: String,
}

impl From<&TaskView> for TaskRow {
    fn from(task: &TaskView) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            done: if task.completed { "✓" } else { "" }.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct BlockedView {
    task: TaskView,
    blocking_tasks: Vec<TaskView>,
}

#[derive(Tabled)]
struct BlockedRow {
    task: String,
    title: String,
    waiting_on: String,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// YYYY-MM-DD at 00:00 UTC, as epoch ms
fn parse_date(value: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid time of day")?;
    Ok(midnight.and_utc().timestamp_millis())
}

fn format_date(millis: i64) -> String {
    chrono::DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn pattern_json(
    frequency: &str,
    interval: u32,
    days: &[u8],
    day_of_month: Option<u32>,
    end_date: Option<&str>,
) -> Result<serde_json::Value> {
    Ok(json!({
        "frequency": frequency.to_lowercase(),
        "interval": interval,
        "days_of_week": days,
        "day_of_month": day_of_month,
        "end_date": end_date.map(parse_date).transpose()?,
    }))
}

fn print_definition(result: serde_json::Value) -> Result<()> {
    let def: Definition = serde_json::from_value(result)?;
    println!("{}", Table::new(vec![DefinitionRow::from(def)]));
    Ok(())
}

fn print_tasks(heading: &str, tasks: &[TaskView]) {
    println!("{}", heading.cyan().bold());
    if tasks.is_empty() {
        println!("  {}", "(none)".dimmed());
    } else {
        println!("{}", Table::new(tasks.iter().map(TaskRow::from)));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let result = call_rpc(&cli.rpc_url, "recurring.run.v1", json!({})).await?;
            println!("{}", "✓ Generation pass completed".green().bold());
            println!();
            println!("  {} {}", "Generated:".bold(), result["generated"]);
            println!("  {} {}", "Deactivated:".bold(), result["deactivated"]);

            for (key, label) in [("skipped", "Skipped"), ("failed", "Failed"), ("deferred", "Deferred")] {
                let count = result[key].as_array().map(Vec::len).unwrap_or(0);
                if count > 0 {
                    println!("  {} {}", format!("{}:", label).yellow().bold(), count);
                }
            }
        }

        Commands::Recurring(RecurringCommand::Create {
            board,
            template,
            pattern,
            anchor,
        }) => {
            let params = json!({
                "board_id": board,
                "template_task_id": template,
                "pattern": pattern_json(
                    &pattern.frequency,
                    pattern.interval,
                    &pattern.days,
                    pattern.day_of_month,
                    pattern.end_date.as_deref(),
                )?,
                "anchor": anchor.as_deref().map(parse_date).transpose()?,
            });

            let result = call_rpc(&cli.rpc_url, "recurring.create.v1", params).await?;
            println!("{}", "✓ Recurring definition created".green().bold());
            println!();
            print_definition(result)?;
        }

        Commands::Recurring(RecurringCommand::Update {
            definition_id,
            frequency,
            interval,
            days,
            day_of_month,
            end_date,
            pause,
            resume,
        }) => {
            let mut params = json!({ "definition_id": definition_id });
            if let Some(frequency) = frequency {
                params["pattern"] =
                    pattern_json(&frequency, interval, &days, day_of_month, end_date.as_deref())?;
            }
            if pause || resume {
                params["is_active"] = json!(resume);
            }

            let result = call_rpc(&cli.rpc_url, "recurring.update.v1", params).await?;
            println!("{}", "✓ Recurring definition updated".green().bold());
            println!();
            print_definition(result)?;
        }

        Commands::Recurring(RecurringCommand::Delete { definition_id }) => {
            let result = call_rpc(
                &cli.rpc_url,
                "recurring.delete.v1",
                json!({ "definition_id": definition_id }),
            )
            .await?;

            if result["deleted"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Definition {} deleted", definition_id).green().bold());
            } else {
                println!("{}", format!("Definition {} not found", definition_id).yellow());
            }
        }

        Commands::Dep(DepCommand::Add {
            board,
            task,
            depends_on,
        }) => {
            let params = json!({ "board_id": board, "task_id": task, "depends_on": depends_on });
            call_rpc(&cli.rpc_url, "dependency.add.v1", params).await?;
            println!(
                "{}",
                format!("✓ {} now depends on {}", task, depends_on).green().bold()
            );
        }

        Commands::Dep(DepCommand::Remove {
            board,
            task,
            depends_on,
        }) => {
            let params = json!({ "board_id": board, "task_id": task, "depends_on": depends_on });
            let result = call_rpc(&cli.rpc_url, "dependency.remove.v1", params).await?;

            if result["removed"].as_bool().unwrap_or(false) {
                println!(
                    "{}",
                    format!("✓ {} no longer depends on {}", task, depends_on).green().bold()
                );
            } else {
                println!("{}", "No such dependency".yellow());
            }
        }

        Commands::Dep(DepCommand::Show { board, task }) => {
            let params = json!({ "board_id": board, "task_id": task });
            let result = call_rpc(&cli.rpc_url, "dependency.show.v1", params).await?;

            let dependencies: Vec<TaskView> = serde_json::from_value(result["dependencies"].clone())?;
            let blockers: Vec<TaskView> = serde_json::from_value(result["blockers"].clone())?;

            print_tasks("Depends on", &dependencies);
            println!();
            print_tasks("Blocking", &blockers);
            println!();
            if result["can_start"].as_bool().unwrap_or(false) {
                println!("  {} {}", "Can start:".bold(), "YES".green());
            } else {
                println!("  {} {}", "Can start:".bold(), "NO".red());
            }
        }

        Commands::Blocked => {
            let result = call_rpc(&cli.rpc_url, "dependency.blocked.v1", json!({})).await?;
            let blocked: Vec<BlockedView> = serde_json::from_value(result["tasks"].clone())?;

            if blocked.is_empty() {
                println!("{}", "No blocked tasks".green());
                return Ok(());
            }

            let rows: Vec<BlockedRow> = blocked
                .into_iter()
                .map(|b| BlockedRow {
                    task: b.task.id,
                    title: b.task.title,
                    waiting_on: b
                        .blocking_tasks
                        .iter()
                        .map(|t| t.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}
