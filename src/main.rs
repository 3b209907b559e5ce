use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use noetic::cli::{self, App, Output};
use noetic::config::NoeticConfig;
use noetic::model::entities::{Importance, ReflexPhase, ScopeVector};
use noetic::model::types::RootCauseVector;

#[derive(Parser)]
#[command(
    name = "noetic",
    version,
    about = "Epistemic self-awareness for AI coding agents"
)]
struct Cli {
    /// Human-readable output instead of JSON
    #[arg(long = "text", global = true)]
    text_output: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Crumb {
    /// File path or topic this applies to
    #[arg(long)]
    scope: Option<String>,
    /// Impact in [0, 1]
    #[arg(long)]
    impact: Option<f64>,
}

impl From<Crumb> for cli::log::LogOptions {
    fn from(c: Crumb) -> Self {
        Self {
            scope: c.scope,
            impact: c.impact,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start a session and print the decision context
    Start {
        objective: String,
        #[arg(long)]
        ai_id: Option<String>,
    },
    /// Log something you learned
    Learned {
        text: String,
        #[command(flatten)]
        crumb: Crumb,
    },
    /// Log something you are unsure about
    Uncertain {
        text: String,
        #[command(flatten)]
        crumb: Crumb,
    },
    /// Resolve an open unknown by text or id
    Resolved {
        text: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// What resolved it
        #[arg(long)]
        by: Option<String>,
    },
    /// Log an approach that failed
    Tried {
        approach: String,
        why_failed: String,
        #[command(flatten)]
        crumb: Crumb,
    },
    /// Log a mistake and how to prevent it
    Mistake {
        text: String,
        why_wrong: String,
        #[arg(long)]
        cost: Option<String>,
        #[arg(long)]
        root_cause: Option<RootCauseVector>,
        #[arg(long)]
        prevention: Option<String>,
    },
    /// Show the active session
    Status,
    /// End the session and write a handoff
    Done {
        summary: String,
        /// Context for whoever picks this up next
        #[arg(long)]
        next: Option<String>,
    },
    /// Confirm a finding is still true
    Verify {
        text: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// Replace the finding text
        #[arg(long)]
        update: Option<String>,
    },
    /// Browse or search breadcrumbs
    Query {
        text: Option<String>,
        #[arg(short, long)]
        unknowns: bool,
        #[arg(short, long)]
        dead_ends: bool,
        #[arg(short, long)]
        all: bool,
        #[arg(short, long)]
        fuzzy: bool,
        #[arg(short, long)]
        threshold: Option<f64>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Record a 13-vector self-assessment
    Checkpoint {
        #[arg(value_parser = ReflexPhase::parse_loose)]
        phase: ReflexPhase,
        #[arg(long)]
        vectors: String,
        #[arg(long)]
        reasoning: Option<String>,
    },
    /// Manage goals in the active session
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },
    /// Manage subtasks of a goal
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },
    /// Manage investigation branches
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum GoalAction {
    Add {
        objective: String,
        #[arg(long, default_value_t = 0.5)]
        breadth: f64,
        #[arg(long, default_value_t = 0.5)]
        duration: f64,
        #[arg(long, default_value_t = 0.0)]
        coordination: f64,
        /// Required success criterion (repeatable)
        #[arg(long = "criterion")]
        criteria: Vec<String>,
        #[arg(long)]
        complexity: Option<f64>,
    },
    List {
        #[arg(long, conflicts_with = "open")]
        completed: bool,
        #[arg(long)]
        open: bool,
    },
    /// Complete a goal (default: the current one)
    Complete { id: Option<String> },
}

#[derive(Subcommand)]
enum SubtaskAction {
    Add {
        description: String,
        /// Goal id (default: the current goal)
        #[arg(long)]
        goal: Option<String>,
        #[arg(long, default_value = "medium")]
        importance: Importance,
    },
    List {
        #[arg(long)]
        goal: Option<String>,
    },
    Complete {
        id: String,
        #[arg(long)]
        evidence: Option<String>,
    },
}

#[derive(Subcommand)]
enum BranchAction {
    Open {
        name: String,
        /// What this branch investigates
        path: String,
        /// Preflight vectors JSON (default: latest session preflight)
        #[arg(long)]
        vectors: Option<String>,
    },
    Checkpoint {
        name: String,
        #[arg(long)]
        vectors: String,
        #[arg(long, default_value_t = 0)]
        tokens: u64,
        #[arg(long, default_value_t = 0)]
        minutes: u64,
    },
    List,
    Winner {
        name: String,
        #[arg(long)]
        rationale: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let text_mode = cli.text_output;

    match run(cli).await {
        Ok(output) => output.print(text_mode),
        Err(e) => {
            cli::print_error(&e, text_mode);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Output> {
    let config = NoeticConfig::load()?;

    // stdout carries command output; logs go to stderr.
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.log_level.as_str()
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        // Doctor inspects the database without creating it.
        Command::Doctor => cli::doctor::doctor(&config),
        command => {
            let app = App::open(config)?;
            dispatch(&app, command).await
        }
    }
}

async fn dispatch(app: &App, command: Command) -> Result<Output> {
    match command {
        Command::Start { objective, ai_id } => {
            cli::start::start(app, &objective, ai_id.as_deref()).await
        }
        Command::Learned { text, crumb } => cli::log::learned(app, &text, crumb.into()).await,
        Command::Uncertain { text, crumb } => cli::log::uncertain(app, &text, crumb.into()),
        Command::Resolved { text, id, by } => {
            cli::log::resolved(app, text.as_deref(), id.as_deref(), by.as_deref())
        }
        Command::Tried {
            approach,
            why_failed,
            crumb,
        } => cli::log::tried(app, &approach, &why_failed, crumb.into()),
        Command::Mistake {
            text,
            why_wrong,
            cost,
            root_cause,
            prevention,
        } => cli::log::mistake(
            app,
            &text,
            &why_wrong,
            cli::log::MistakeOptions {
                cost,
                root_cause,
                prevention,
            },
        ),
        Command::Status => cli::start::status(app).await,
        Command::Done { summary, next } => cli::done::done(app, &summary, next.as_deref()).await,
        Command::Verify { text, id, update } => {
            cli::verify::verify(app, text.as_deref(), id.as_deref(), update.as_deref()).await
        }
        Command::Query {
            text,
            unknowns,
            dead_ends,
            all,
            fuzzy,
            threshold,
            limit,
        } => {
            let args = cli::query::QueryArgs {
                text,
                unknowns,
                dead_ends,
                all,
                fuzzy,
                threshold,
                limit,
            };
            cli::query::query(app, &args).await
        }
        Command::Checkpoint {
            phase,
            vectors,
            reasoning,
        } => cli::checkpoint::checkpoint(app, phase, &vectors, reasoning.as_deref()),
        Command::Goal { action } => match action {
            GoalAction::Add {
                objective,
                breadth,
                duration,
                coordination,
                criteria,
                complexity,
            } => cli::goal::add(
                app,
                cli::goal::NewGoal {
                    objective,
                    scope: ScopeVector {
                        breadth,
                        duration,
                        coordination,
                    },
                    criteria,
                    complexity,
                },
            ),
            GoalAction::List { completed, open } => {
                let filter = match (completed, open) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                cli::goal::list(app, filter)
            }
            GoalAction::Complete { id } => cli::goal::complete(app, id.as_deref()),
        },
        Command::Subtask { action } => match action {
            SubtaskAction::Add {
                description,
                goal,
                importance,
            } => cli::goal::add_subtask(app, &description, goal.as_deref(), importance),
            SubtaskAction::List { goal } => cli::goal::list_subtasks(app, goal.as_deref()),
            SubtaskAction::Complete { id, evidence } => {
                cli::goal::complete_subtask(app, &id, evidence.as_deref())
            }
        },
        Command::Branch { action } => match action {
            BranchAction::Open {
                name,
                path,
                vectors,
            } => cli::branch::open(app, &name, &path, vectors.as_deref()),
            BranchAction::Checkpoint {
                name,
                vectors,
                tokens,
                minutes,
            } => cli::branch::checkpoint(app, &name, &vectors, tokens, minutes),
            BranchAction::List => cli::branch::list(app),
            BranchAction::Winner { name, rationale } => {
                cli::branch::winner(app, &name, &rationale)
            }
        },
        Command::Doctor => cli::doctor::doctor(&app.config),
    }
}
