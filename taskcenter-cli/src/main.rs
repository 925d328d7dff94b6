use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod auth;
mod config;
mod llm;
mod plan_cmd;
mod state;
mod store;
mod tasks_cmd;

use config::Config;
use store::JsonStore;

#[derive(Parser, Debug)]
#[command(
    name = "taskcenter",
    version,
    about = "Personal task center: parse task lists, score them, plan the day"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse free-form tasks (argument, --file, or stdin) and store them
    Add {
        /// Task list text; one task per line
        text: Option<String>,

        /// Read the list from a file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Classify new tasks with the configured model
        #[arg(long, default_value_t = false)]
        classify: bool,

        /// Extra context passed to the classifier
        #[arg(long)]
        context: Option<String>,
    },

    /// List tasks
    List {
        /// Only this status (new, in_progress, blocked, review, done, cancelled)
        #[arg(long)]
        status: Option<String>,

        /// Only this priority (1-5 or backlog/low/medium/high/critical)
        #[arg(long)]
        priority: Option<String>,

        /// Only tasks without AI classification
        #[arg(long, default_value_t = false)]
        unclassified: bool,

        /// Include done and cancelled tasks
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Show one task in full
    Show { id: String },

    /// Rank open tasks by priority score
    Prioritize {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Explain the score of one task factor by factor
    Score { id: String },

    /// Recommend tasks for today within the hours budget
    Today {
        /// Available hours (default from config)
        #[arg(long)]
        hours: Option<f64>,

        /// Max tasks (default from config)
        #[arg(long)]
        max: Option<usize>,
    },

    /// Change a task's status
    Status {
        id: String,
        status: String,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Change a task's priority (1-5 or backlog/low/medium/high/critical)
    Priority { id: String, priority: String },

    /// Manage dependencies between tasks
    Deps {
        #[command(subcommand)]
        command: tasks_cmd::DepsCommand,
    },

    /// Set the estimate in hours (0-16)
    Estimate { id: String, hours: f64 },

    /// Set a deadline ("YYYY-MM-DD" or "YYYY-MM-DD HH:MM", local to config timezone)
    Deadline {
        id: String,
        when: Option<String>,

        /// Remove the deadline
        #[arg(long, default_value_t = false)]
        clear: bool,
    },

    /// Append a note
    Note { id: String, text: String },

    /// Classify one task, or every unclassified open task
    Classify {
        id: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },

    /// Delete a task
    Delete { id: String },

    /// Show the change history of a task
    History { id: String },

    /// Counts by status, priority and type
    Stats,

    /// Config helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Store the Anthropic API key in ~/.taskcenter/auth.json
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Paste an Anthropic API key
    PasteAnthropicKey,
}

/// Loaded config + opened store, shared by command handlers.
pub struct App {
    pub cfg: Config,
    pub store: JsonStore,
}

impl App {
    fn load() -> Result<Self> {
        let cfg = config::load_config()?;
        let store = JsonStore::open(state::data_dir(&cfg)?)?;
        Ok(Self { cfg, store })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("# {}", config::config_path()?.display());
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        },

        Command::Auth { command } => match command {
            AuthCommand::PasteAnthropicKey => auth::anthropic_paste_key()?,
        },

        command => {
            let app = App::load()?;
            run(command, &app)?;
        }
    }

    Ok(())
}

fn run(command: Command, app: &App) -> Result<()> {
    match command {
        Command::Add {
            text,
            file,
            classify,
            context,
        } => tasks_cmd::add(app, text, file, classify, context.as_deref()),
        Command::List {
            status,
            priority,
            unclassified,
            all,
        } => tasks_cmd::list(app, status.as_deref(), priority.as_deref(), unclassified, all),
        Command::Show { id } => tasks_cmd::show(app, &id),
        Command::Prioritize { limit } => plan_cmd::prioritize(app, limit),
        Command::Score { id } => plan_cmd::score(app, &id),
        Command::Today { hours, max } => plan_cmd::today(app, hours, max),
        Command::Status {
            id,
            status,
            comment,
        } => tasks_cmd::set_status(app, &id, &status, comment),
        Command::Priority { id, priority } => tasks_cmd::set_priority(app, &id, &priority),
        Command::Deps { command } => tasks_cmd::deps(app, command),
        Command::Estimate { id, hours } => tasks_cmd::set_estimate(app, &id, hours),
        Command::Deadline { id, when, clear } => tasks_cmd::set_deadline(app, &id, when, clear),
        Command::Note { id, text } => tasks_cmd::add_note(app, &id, &text),
        Command::Classify { id, context } => tasks_cmd::classify(app, id.as_deref(), context.as_deref()),
        Command::Delete { id } => tasks_cmd::delete(app, &id),
        Command::History { id } => tasks_cmd::history(app, &id),
        Command::Stats => tasks_cmd::stats(app),
        Command::Config { .. } | Command::Auth { .. } => Ok(()),
    }
}
