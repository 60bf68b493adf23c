use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use showrunner::app::App;
use showrunner::collaborators::{WorkItem, WorkKind};
use showrunner::config::Config;
use showrunner::crew::CrewDirectory;
use showrunner::logging;
use showrunner::rest;
use showrunner::services::ReconcileJob;
use showrunner::types::{Actor, EpisodeId, ProgramId, Role, UserId};
use showrunner::workflow::{StepNumber, StepStatus, WorkflowError};

#[derive(Parser)]
#[command(name = "showrunner")]
#[command(about = "Episode workflow engine for multi-role production pipelines")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Who is performing a transition
#[derive(Args, Debug, Clone, Copy)]
struct ActorArgs {
    /// Acting user id
    #[arg(long = "as")]
    user: UserId,

    /// Acting user's role (e.g. editor, program_manager)
    #[arg(long, default_value = "admin")]
    role: Role,
}

impl ActorArgs {
    fn actor(&self) -> Actor {
        Actor::new(self.user, self.role)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server (and the reconcile sweep when configured)
    Serve {
        /// Port to listen on (default: 7008)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the workflow steps in order
    Steps,

    /// Create the workflow for an episode
    Init {
        episode: EpisodeId,
        #[arg(long)]
        program: ProgramId,
    },

    /// Show an episode's workflow board
    Show {
        episode: EpisodeId,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show per-step history for an episode
    History { episode: EpisodeId },

    /// Start a step
    Start {
        episode: EpisodeId,
        step: StepNumber,
        /// User to assign while starting
        #[arg(long)]
        assign: Option<UserId>,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Complete a step
    Complete {
        episode: EpisodeId,
        step: StepNumber,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Assign a user to a step
    Assign {
        episode: EpisodeId,
        step: StepNumber,
        user: UserId,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Reset a step to pending
    Reset {
        episode: EpisodeId,
        step: StepNumber,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Replace (or clear) a step's notes
    Notes {
        episode: EpisodeId,
        step: StepNumber,
        /// New notes; omit to clear
        notes: Option<String>,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Reconcile one episode, or every episode with --all
    Reconcile {
        episode: Option<EpisodeId>,
        #[arg(long, conflicts_with = "episode")]
        all: bool,
    },

    /// Show the activity log for an episode
    Activity {
        episode: EpisodeId,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Record a collaborator's status for an episode
    WorkItem {
        episode: EpisodeId,
        /// Work kind (creative, production, editor, promotion, design, ...)
        kind: WorkKind,
        /// Collaborator status (draft, submitted, completed, ...)
        status: String,
    },

    /// Manage program crew
    Crew {
        #[command(subcommand)]
        command: CrewCommands,
    },
}

#[derive(Subcommand)]
enum CrewCommands {
    /// Register a user
    AddUser { user: UserId },
    /// Set a program's manager
    SetManager { program: ProgramId, user: UserId },
    /// Add a user to a program's crew for a role
    Assign {
        program: ProgramId,
        role: Role,
        user: UserId,
    },
    /// List a program's crew
    List { program: ProgramId },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let is_server = matches!(cli.command, Commands::Serve { .. });
    let logging_handle = logging::init_logging(&config, is_server, cli.debug)?;

    let result = run(cli.command, config).await;

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.exists() {
            eprintln!("Server log: {}", log_path.display());
        }
    }

    result
}

async fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Serve { port } => cmd_serve(config, port).await,
        Commands::Crew { command } => cmd_crew(&config, command),
        command => {
            let app = App::open(config)?;
            tokio::task::spawn_blocking(move || cmd_engine(&app, command))
                .await
                .context("Command panicked")?
        }
    }
}

fn print_record_status(step: StepNumber, status: StepStatus) {
    println!("Step {} is now {}", step, status);
}

/// Commands that run a single engine operation
fn cmd_engine(app: &App, command: Commands) -> Result<()> {
    let engine = &app.engine;
    match command {
        Commands::Steps => {
            for def in engine.steps() {
                let roles: Vec<String> = def.responsible_roles.iter().map(Role::to_string).collect();
                println!("{:>2}. {:<28} {}", def.step_number, def.name, roles.join(", "));
            }
        }
        Commands::Init { episode, program } => {
            let workflow = engine.initialize_workflow(episode, program, None)?;
            println!(
                "Initialized workflow for episode {} ({} steps)",
                episode,
                workflow.steps.len()
            );
        }
        Commands::Show { episode, json } => {
            let view = engine.get_visualization(episode)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }
            println!(
                "Episode {} - {}% complete",
                view.episode_id, view.completion_percentage
            );
            println!("{}", "─".repeat(72));
            for step in &view.steps {
                let marker = match step.status {
                    StepStatus::Completed => "✓",
                    StepStatus::InProgress => "▶",
                    StepStatus::Pending => "·",
                };
                let current = if view.current_step == Some(step.step_number) {
                    " <- current"
                } else {
                    ""
                };
                let assignee = step
                    .assigned_user
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unassigned".to_string());
                println!(
                    "{} {:>2}. {:<28} {:<12} {}{}",
                    marker, step.step_number, step.step_name, step.status, assignee, current
                );
            }
            for failure in &view.reconcile_failures {
                eprintln!(
                    "warning: step {} could not be reconciled: {}",
                    failure.step_number, failure.error
                );
            }
        }
        Commands::History { episode } => {
            for row in engine.get_history(episode)? {
                let duration = row
                    .duration_secs
                    .map(|s| format!("{}s", s))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>2}. {:<12} started {:<25} completed {:<25} {}",
                    row.step_number,
                    row.status,
                    row.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    row.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    duration
                );
            }
        }
        Commands::Start {
            episode,
            step,
            assign,
            actor,
        } => {
            ensure_access(app, &actor.actor(), step)?;
            let record = engine.start_step(episode, step, assign, Some(actor.user))?;
            print_record_status(step, record.status);
        }
        Commands::Complete {
            episode,
            step,
            notes,
            actor,
        } => {
            ensure_access(app, &actor.actor(), step)?;
            let record = engine.complete_step(episode, step, notes, Some(actor.user))?;
            print_record_status(step, record.status);
        }
        Commands::Assign {
            episode,
            step,
            user,
            actor,
        } => {
            ensure_access(app, &actor.actor(), step)?;
            engine.assign_user(episode, step, user, Some(actor.user))?;
            println!("Assigned {} to step {}", user, step);
        }
        Commands::Reset {
            episode,
            step,
            actor,
        } => {
            let record = engine.reset_step(episode, step, &actor.actor())?;
            print_record_status(step, record.status);
        }
        Commands::Notes {
            episode,
            step,
            notes,
            actor,
        } => {
            ensure_access(app, &actor.actor(), step)?;
            engine.update_step_notes(episode, step, notes, Some(actor.user))?;
            println!("Notes updated on step {}", step);
        }
        Commands::Reconcile { episode, all } => {
            let episodes = match (episode, all) {
                (Some(episode), _) => vec![episode],
                (None, true) => engine.episode_ids()?,
                (None, false) => anyhow::bail!("Pass an episode id or --all"),
            };
            for episode in episodes {
                let report = engine.reconcile(episode)?;
                if report.is_noop() {
                    println!("{}: up to date", episode);
                    continue;
                }
                for step in &report.corrected {
                    println!("{}: step {} completed from collaborator status", episode, step);
                }
                for failure in &report.failures {
                    println!(
                        "{}: step {} failed: {}",
                        episode, failure.step_number, failure.error
                    );
                }
            }
        }
        Commands::Activity { episode, limit } => {
            let entries = engine.activity(episode, limit)?;
            if entries.is_empty() {
                println!("No activity");
            }
            for entry in entries {
                let actor = entry
                    .actor
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "system".to_string());
                println!(
                    "{} [{}] {} ({})",
                    entry.created_at.to_rfc3339(),
                    entry.action,
                    entry.description,
                    actor
                );
            }
        }
        Commands::WorkItem {
            episode,
            kind,
            status,
        } => {
            let item = WorkItem::new(episode, kind, status);
            item.parsed_status()?;
            app.work_items.upsert(item)?;
            println!("Recorded {} status for episode {}", kind, episode);
        }
        Commands::Serve { .. } | Commands::Crew { .. } => {
            anyhow::bail!("Not an engine command")
        }
    }
    Ok(())
}

fn ensure_access(app: &App, actor: &Actor, step: StepNumber) -> Result<()> {
    if !app.engine.registry().is_valid_step(step) {
        return Err(WorkflowError::StepNotFound(step).into());
    }
    if !app.engine.can_user_access_step(actor, step) {
        anyhow::bail!("{} may not work on step {}", actor.role, step);
    }
    Ok(())
}

fn cmd_crew(config: &Config, command: CrewCommands) -> Result<()> {
    let mut crew = CrewDirectory::load(&config.state_path())?;
    match command {
        CrewCommands::AddUser { user } => {
            crew.add_user(user);
            println!("Registered user {}", user);
        }
        CrewCommands::SetManager { program, user } => {
            crew.set_manager(program, user);
            println!("{} now manages program {}", user, program);
        }
        CrewCommands::Assign {
            program,
            role,
            user,
        } => {
            crew.assign(program, role, user);
            println!("{} added to {} crew on program {}", user, role, program);
        }
        CrewCommands::List { program } => {
            use showrunner::crew::CrewSource;
            if let Some(manager) = crew.program_manager(program) {
                println!("{:<24} {}", Role::ProgramManager, manager);
            }
            for assignment in crew.assignments_for(program) {
                println!("{:<24} {}", assignment.role, assignment.user_id);
            }
            return Ok(());
        }
    }
    crew.save()
}

async fn cmd_serve(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.rest_api.port);
    let interval_secs = config.reconcile.interval_secs;
    let app = App::open(config)?;

    println!("Starting showrunner...");
    println!("  Port:  {}", port);
    println!("  State: {}", app.config.state_path().display());
    if interval_secs > 0 {
        println!("  Reconcile sweep every {}s", interval_secs);
    } else {
        println!("  Reconcile on read only");
    }
    println!();

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let job = ReconcileJob::from_interval_secs(app.engine.clone(), interval_secs)
        .map(|job| job.with_shutdown(shutdown_rx));
    let job_handle = job.map(|mut job| {
        tokio::spawn(async move {
            if let Err(e) = job.run().await {
                tracing::error!(error = %e, "Reconcile job exited with error");
            }
        })
    });

    let state = rest::ApiState::from_app(&app);
    rest::serve(state, port, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
    })
    .await?;

    let _ = shutdown_tx.send(()).await;
    if let Some(handle) = job_handle {
        let _ = handle.await;
    }
    Ok(())
}
