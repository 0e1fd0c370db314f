use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

use taskboard::board::{BoardReconciler, DragOutcome, DragSession, DropTarget};
use taskboard::cache::{Mutation, TaskCacheStore};
use taskboard::config::{Config, DEFAULT_CONFIG};
use taskboard::gateway::{HttpTaskGateway, MemoryTaskGateway, TaskGateway};
use taskboard::log;
use taskboard::model::{
    timestamp, FilterCriteria, OwnerId, Session, SortKey, SortOrder, Task, TaskDraft, TaskId,
    TaskPatch, TaskStatus,
};
use taskboard::projection::project;

/// Command-line client for the task board backend
#[derive(Parser)]
#[command(version, about, name = "taskboard")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "TASKBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Run against an empty in-process backend instead of the configured one
    #[arg(long, global = true)]
    offline: bool,

    /// Bearer token for the backend
    #[arg(long, global = true, env = "TASKBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Owner id the token belongs to
    #[arg(long, global = true, env = "TASKBOARD_OWNER")]
    owner: Option<OwnerId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tasks
    #[command(alias = "ls")]
    List(Filters),
    /// Show tasks in status columns
    Board(Filters),
    /// Create a task
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
    },
    /// Change fields of a task
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Drop a task onto a column (todo, in_progress, done)
    Move { id: TaskId, column: String },
    /// Delete a task
    #[command(alias = "rm")]
    Delete { id: TaskId },
}

#[derive(Args, Clone)]
struct Filters {
    #[arg(long)]
    status: Option<TaskStatus>,
    #[arg(long)]
    priority: Option<u8>,
    #[arg(long)]
    search: Option<String>,
    /// due_date, priority or title
    #[arg(long)]
    sort: Option<SortKey>,
    #[arg(long)]
    desc: bool,
}

impl From<Filters> for FilterCriteria {
    fn from(filters: Filters) -> Self {
        FilterCriteria {
            status: filters.status,
            priority: filters.priority,
            search: filters.search,
            sort_by: filters.sort,
            sort_order: if filters.desc {
                SortOrder::Desc
            } else {
                SortOrder::Asc
            },
        }
    }
}

fn parse_due(raw: &str) -> Result<DateTime<Utc>, String> {
    timestamp::parse(raw).ok_or_else(|| format!("'{}' is not a date or date-time", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::from_str(DEFAULT_CONFIG)?,
    };
    log::setup(EnvFilter::try_from_env("TASKBOARD_LOG"), &config.log);
    event!(Level::INFO, "Starting taskboard: {}", env!("CARGO_PKG_VERSION"));

    if cli.offline {
        let session = Session::bearer(
            cli.token.clone().unwrap_or_else(|| "offline".to_string()),
            cli.owner.or(Some(1)),
        );
        run(TaskCacheStore::new(MemoryTaskGateway::new(), session), cli.command).await
    } else {
        let session = match &cli.token {
            Some(token) => Session::bearer(token.clone(), cli.owner),
            None => Session::anonymous(),
        };
        let gateway = HttpTaskGateway::new(
            &config.gateway.url,
            config.gateway.timeout()?,
            config.gateway.user_agent.as_deref(),
        )?;
        run(TaskCacheStore::new(gateway, session), cli.command).await
    }
}

async fn run<G: TaskGateway>(store: TaskCacheStore<G>, command: Command) -> anyhow::Result<()> {
    let store = Arc::new(store);
    match command {
        Command::List(filters) => {
            let criteria = FilterCriteria::from(filters);
            store.refresh(criteria.clone()).await?;
            print_list(&project(&store.read(), &criteria));
        }
        Command::Board(filters) => {
            let criteria = FilterCriteria::from(filters);
            store.refresh(criteria.clone()).await?;
            print_board(&project(&store.read(), &criteria));
        }
        Command::Create {
            title,
            description,
            priority,
            due,
        } => {
            let draft = TaskDraft {
                title,
                description,
                priority,
                due_date: due,
            };
            store.refresh(FilterCriteria::default()).await?;
            store.mutate(Mutation::Create(draft))?.submit().await?;
            print_list(&store.read());
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
            due,
            status,
        } => {
            let patch = TaskPatch {
                title,
                description,
                priority,
                due_date: due,
                status,
            };
            if patch.is_empty() {
                bail!("nothing to change");
            }
            store.refresh(FilterCriteria::default()).await?;
            store.mutate(Mutation::Update(id, patch))?.submit().await?;
            print_list(&store.read());
        }
        Command::Move { id, column } => {
            let Some(target) = DropTarget::parse_column(&column) else {
                bail!("unknown column '{}'", column);
            };
            store.refresh(FilterCriteria::default()).await?;
            let reconciler = BoardReconciler::new(store.clone());
            let mut drag = DragSession::start(id);
            drag.hover(target);
            if reconciler.complete_drag(drag).await? == DragOutcome::Ignored {
                println!("nothing to move");
            }
            print_board(&store.read());
        }
        Command::Delete { id } => {
            store.refresh(FilterCriteria::default()).await?;
            store.mutate(Mutation::Delete(id))?.submit().await?;
            print_list(&store.read());
        }
    }
    Ok(())
}

fn describe(task: &Task) -> String {
    let mut line = format!("#{} {}", task.id, task.title);
    if let Some(priority) = task.priority {
        line.push_str(&format!(" (p{})", priority));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
    }
    line
}

fn print_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("no tasks");
    }
    for task in tasks {
        println!("{:<12} {}", task.status.as_str(), describe(task));
    }
}

fn print_board(tasks: &[Task]) {
    let board = taskboard::board::Board::partition(tasks);
    for (column, tasks) in board.columns() {
        println!("== {} ({})", column.title, tasks.len());
        for task in tasks {
            println!("  {}", describe(task));
        }
    }
}
