//! Steward CLI
//!
//! Command-line interface for the Steward daemon: lifecycle control plus a
//! thin front end over every tool the daemon serves.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use steward_core::StewardConfig;
use steward_ipc::{
    CheckpointFields, ContextOp, IpcClient, IpcError, LoopOp, MemoryOp, Request, Response,
    ResponseData, ScopeOp, WorkOp,
};

#[derive(Parser)]
#[command(name = "steward")]
#[command(about = "Steward - persistent memory and guard rails for AI coding assistants")]
#[command(version)]
struct Cli {
    /// Project path (default: current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Steward daemon
    Start {
        /// Run in foreground (for debugging)
        #[arg(short, long)]
        foreground: bool,
    },

    /// Stop the Steward daemon
    Stop,

    /// Show daemon status
    Status,

    /// Check if daemon is running
    Ping,

    /// Session lifecycle
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Advisory check before editing a file
    PreEdit { file: String },

    /// Store a memory
    Remember {
        content: String,

        /// One of rule, mistake, discovery, context
        #[arg(short, long, default_value = "discovery")]
        category: String,

        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Search memories by text, file or tag
    Search {
        query: Option<String>,

        #[arg(long)]
        file: Option<String>,

        #[arg(short, long)]
        tag: Vec<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Newest memories first
    Recent {
        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Project rules
    Rule {
        #[command(subcommand)]
        action: RuleAction,
    },

    /// Instructions repeated back on demand
    Instruction {
        #[command(subcommand)]
        action: InstructionAction,
    },

    /// Merge, decay and prune memories (dry run unless --apply)
    Cleanup {
        #[arg(long)]
        apply: bool,
    },

    /// Log a mistake so later sessions avoid it
    Mistake {
        description: String,

        #[arg(long)]
        file: Option<String>,

        #[arg(long)]
        fix: Option<String>,
    },

    /// Log a decision and its reason
    Decision { decision: String, reason: String },

    /// Declared edit boundary
    Scope {
        #[command(subcommand)]
        action: ScopeAction,
    },

    /// Task checkpoints
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Edit/test loop tracking
    Loop {
        #[command(subcommand)]
        action: LoopAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Clean up state and print the briefing
    Start,
    /// Summarize and close the session
    End,
}

#[derive(Subcommand)]
enum RuleAction {
    Add {
        content: String,

        #[arg(short, long)]
        reason: Option<String>,

        #[arg(long)]
        relevance: Option<u8>,
    },
    List,
}

#[derive(Subcommand)]
enum InstructionAction {
    Add {
        instruction: String,

        #[arg(short, long)]
        reason: Option<String>,

        /// 1 to 10
        #[arg(short, long)]
        importance: Option<u8>,
    },
    /// Print the most important instructions
    Reinforce,
}

#[derive(Subcommand)]
enum ScopeAction {
    Declare {
        task: String,

        #[arg(short, long)]
        file: Vec<String>,

        #[arg(short = 'g', long)]
        pattern: Vec<String>,

        /// Files that stay off limits even when a pattern matches
        #[arg(short = 'x', long)]
        exclude: Vec<String>,
    },
    Check {
        file: String,
    },
    Expand {
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(short, long, default_value = "")]
        reason: String,
    },
    Status,
    Clear,
}

#[derive(Subcommand)]
enum CheckpointAction {
    Save {
        task: String,

        #[arg(long)]
        step: String,

        #[arg(long)]
        done: Vec<String>,

        #[arg(long)]
        todo: Vec<String>,

        #[arg(long)]
        file: Vec<String>,
    },
    Restore {
        task_id: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
enum LoopAction {
    /// Record an edit to a file
    Edit {
        file: String,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Record a test run
    Test {
        #[arg(long)]
        failed: bool,

        #[arg(short, long)]
        error: Option<String>,
    },
    Check {
        file: String,
    },
    Status,
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Simple logging for CLI
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_target(false).init();
    }

    let cli = Cli::parse();
    let config = StewardConfig::load();
    let client = IpcClient::with_socket_path(&config.socket_path);

    match cli.command {
        Commands::Start { foreground } => cmd_start(&client, foreground).await,
        Commands::Stop => cmd_stop(&client).await,
        Commands::Status => cmd_status(&client).await,
        Commands::Ping => cmd_ping(&client).await,
        command => {
            let cwd = project_dir(&cli.project)?;
            match build_request(cwd, command) {
                Some(request) => cmd_tool(&client, request).await,
                None => Ok(()),
            }
        }
    }
}

fn project_dir(path: &str) -> Result<PathBuf> {
    PathBuf::from(path)
        .canonicalize()
        .with_context(|| format!("Invalid project path: {}", path))
}

/// Translate a tool subcommand into its daemon request.
fn build_request(cwd: PathBuf, command: Commands) -> Option<Request> {
    let request = match command {
        Commands::Session { action } => match action {
            SessionAction::Start => Request::SessionStart { cwd },
            SessionAction::End => Request::SessionEnd { cwd },
        },
        Commands::PreEdit { file } => Request::PreEditCheck {
            cwd,
            file_path: file,
        },
        Commands::Remember {
            content,
            category,
            tag,
        } => Request::Memory {
            cwd,
            op: MemoryOp::Remember {
                content,
                category,
                tags: tag,
                relevance: None,
                source_file: None,
            },
        },
        Commands::Search {
            query,
            file,
            tag,
            limit,
        } => Request::Memory {
            cwd,
            op: MemoryOp::Search {
                file_path: file,
                tags: tag,
                query,
                limit,
            },
        },
        Commands::Recent { category, limit } => Request::Memory {
            cwd,
            op: MemoryOp::Recent { category, limit },
        },
        Commands::Rule { action } => Request::Memory {
            cwd,
            op: match action {
                RuleAction::Add {
                    content,
                    reason,
                    relevance,
                } => MemoryOp::AddRule {
                    content,
                    reason,
                    relevance,
                },
                RuleAction::List => MemoryOp::ListRules,
            },
        },
        Commands::Instruction { action } => Request::Context {
            cwd,
            op: match action {
                InstructionAction::Add {
                    instruction,
                    reason,
                    importance,
                } => ContextOp::InstructionAdd {
                    instruction,
                    reason,
                    importance,
                },
                InstructionAction::Reinforce => ContextOp::InstructionReinforce,
            },
        },
        Commands::Cleanup { apply } => Request::Memory {
            cwd,
            op: MemoryOp::Cleanup {
                dry_run: !apply,
                min_relevance: None,
                max_age_days: None,
            },
        },
        Commands::Mistake {
            description,
            file,
            fix,
        } => Request::Work {
            cwd,
            op: WorkOp::LogMistake {
                description,
                file_path: file,
                how_to_avoid: fix,
            },
        },
        Commands::Decision { decision, reason } => Request::Work {
            cwd,
            op: WorkOp::LogDecision { decision, reason },
        },
        Commands::Scope { action } => Request::Scope {
            cwd,
            op: match action {
                ScopeAction::Declare {
                    task,
                    file,
                    pattern,
                    exclude,
                } => ScopeOp::Declare {
                    task_description: task,
                    in_scope_files: file,
                    in_scope_patterns: pattern,
                    out_of_scope_files: exclude,
                },
                ScopeAction::Check { file } => ScopeOp::Check { file_path: file },
                ScopeAction::Expand { files, reason } => ScopeOp::Expand {
                    files_to_add: files,
                    reason,
                },
                ScopeAction::Status => ScopeOp::Status,
                ScopeAction::Clear => ScopeOp::Clear,
            },
        },
        Commands::Checkpoint { action } => Request::Context {
            cwd,
            op: match action {
                CheckpointAction::Save {
                    task,
                    step,
                    done,
                    todo,
                    file,
                } => ContextOp::CheckpointSave(CheckpointFields {
                    task_description: task,
                    current_step: step,
                    completed_steps: done,
                    pending_steps: todo,
                    files_involved: file,
                    ..Default::default()
                }),
                CheckpointAction::Restore { task_id } => ContextOp::CheckpointRestore { task_id },
                CheckpointAction::List => ContextOp::CheckpointList,
            },
        },
        Commands::Loop { action } => Request::Loop {
            cwd,
            op: match action {
                LoopAction::Edit { file, description } => LoopOp::RecordEdit {
                    file_path: file,
                    description,
                },
                LoopAction::Test { failed, error } => LoopOp::RecordTest {
                    passed: !failed,
                    error_message: error,
                },
                LoopAction::Check { file } => LoopOp::Check { file_path: file },
                LoopAction::Status => LoopOp::Status,
                LoopAction::Reset => LoopOp::Reset,
            },
        },
        Commands::Start { .. } | Commands::Stop | Commands::Status | Commands::Ping => {
            return None
        }
    };
    Some(request)
}

async fn cmd_start(client: &IpcClient, foreground: bool) -> Result<()> {
    if foreground {
        println!("Starting Steward daemon in foreground...");
        println!("Press Ctrl+C to stop.");

        let status = std::process::Command::new("steward-daemon")
            .status()
            .context("Failed to start daemon. Is steward-daemon in PATH?")?;

        if !status.success() {
            anyhow::bail!("Daemon exited with error");
        }
    } else {
        if client.is_daemon_running() {
            println!("Steward daemon is already running.");
            return Ok(());
        }

        let child = std::process::Command::new("steward-daemon")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("Failed to start daemon")?;

        println!("✓ Steward daemon started (PID: {})", child.id());
    }

    Ok(())
}

async fn cmd_stop(client: &IpcClient) -> Result<()> {
    if !client.is_daemon_running() {
        println!("Steward daemon is not running.");
        return Ok(());
    }

    match client.request(Request::Shutdown).await {
        Ok(Response::Ack) => {
            println!("✓ Steward daemon stopping...");

            // Wait a moment for cleanup
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;

            if !client.is_daemon_running() {
                println!("✓ Daemon stopped.");
            }
        }
        Ok(resp) => {
            println!("Unexpected response: {:?}", resp);
        }
        Err(e) => {
            println!("Failed to stop daemon: {}", e);
        }
    }

    Ok(())
}

async fn cmd_status(client: &IpcClient) -> Result<()> {
    if !client.is_daemon_running() {
        println!("Steward daemon is not running.");
        println!("\nStart with: steward start");
        return Ok(());
    }

    match client.get_status().await {
        Ok(ResponseData::Status {
            version,
            uptime_secs,
            projects_loaded,
            requests_total,
            errors_total,
            avg_latency_ms,
            cache_hit_rate,
            model,
            llm_url,
        }) => {
            println!("Steward Daemon v{}", version);
            println!();
            println!("  Status:      Running");
            println!("  Uptime:      {}", format_duration(uptime_secs));
            println!("  Projects:    {} cached", projects_loaded);
            println!();
            println!("  Requests:    {} ({} failed)", requests_total, errors_total);
            println!("  Avg Latency: {}ms", avg_latency_ms);
            println!("  Cache Hit:   {:.1}%", cache_hit_rate * 100.0);
            if let Some(model) = model {
                println!("  Model:       {}", model);
            }
            if let Some(url) = llm_url {
                println!("  LLM URL:     {}", url);
            }
        }
        Ok(_) => {
            println!("Unexpected status response");
        }
        Err(e) => {
            println!("Failed to get status: {}", e);
        }
    }

    Ok(())
}

async fn cmd_ping(client: &IpcClient) -> Result<()> {
    if !client.is_daemon_running() {
        println!("✗ Daemon not running");
        return Ok(());
    }

    let start = std::time::Instant::now();
    match client.request(Request::Ping).await {
        Ok(Response::Ok {
            data: Some(ResponseData::Pong { .. }),
            ..
        }) => {
            let elapsed = start.elapsed();
            println!("✓ Pong! ({:.2}ms)", elapsed.as_secs_f64() * 1000.0);
        }
        Ok(_) => {
            println!("✗ Unexpected response");
        }
        Err(e) => {
            println!("✗ Error: {}", e);
        }
    }

    Ok(())
}

async fn cmd_tool(client: &IpcClient, request: Request) -> Result<()> {
    if !client.is_daemon_running() {
        println!("✗ Daemon not running. Start with: steward start");
        return Ok(());
    }

    match client.call(request).await {
        Ok((data, warnings)) => {
            print_data(data);
            for warning in warnings {
                println!("! {}", warning);
            }
        }
        Err(IpcError::Daemon { code, message }) => {
            println!("✗ {:?}: {}", code, message);
        }
        Err(e) => {
            println!("✗ Error: {}", e);
        }
    }

    Ok(())
}

fn print_data(data: ResponseData) {
    match data {
        ResponseData::Memory { memory } => {
            println!("✓ [{}] {} ({})", memory.category, memory.content, memory.id);
        }
        ResponseData::Memories { memories } => {
            if memories.is_empty() {
                println!("No memories found.");
            }
            for memory in memories {
                println!(
                    "  [{}] r{} {} ({})",
                    memory.category, memory.relevance, memory.content, memory.id
                );
            }
        }
        ResponseData::Cleanup { report } => {
            let verb = if report.dry_run { "Would" } else { "Did" };
            println!(
                "{} merge {}, decay {}, delete {} ({} -> {} memories, {} clusters)",
                verb,
                report.merged.len(),
                report.decayed.len(),
                report.deleted.len(),
                report.total_before,
                report.total_after,
                report.clusters
            );
        }
        ResponseData::SessionBriefing { briefing } => {
            println!("Project: {}", briefing.project_path.display());
            for memory in briefing.protected_memories.iter().chain(&briefing.memories) {
                println!("  [{}] {}", memory.category, memory.content);
            }
            if let Some(checkpoint) = briefing.restored_checkpoint {
                println!(
                    "  Resuming {} at \"{}\" ({}% done)",
                    checkpoint.task_id,
                    checkpoint.current_step,
                    checkpoint.progress_percent()
                );
            }
            if let Some(task) = briefing.active_scope {
                println!("  Scope: {}", task);
            }
            for warning in briefing.warnings {
                println!("! {}", warning);
            }
        }
        ResponseData::SessionSummary { summary } => println!("✓ {}", summary.summary),
        ResponseData::PreEdit { report } => {
            if report.is_clear() {
                println!("✓ {} is clear to edit", report.file_path);
            }
            for warning in report.warnings {
                println!("! {}", warning);
            }
        }
        ResponseData::ScopeVerdict { verdict } => {
            let mark = if verdict.in_scope { "✓" } else { "✗" };
            println!("{} {}: {}", mark, verdict.file_path, verdict.reason);
        }
        ResponseData::ScopeStatus { status } => match status.task_description {
            Some(task) => {
                println!("Scope: {}", task);
                println!("  Files:      {}", status.declared_files.join(", "));
                println!("  Patterns:   {}", status.declared_patterns.join(", "));
                println!("  Violations: {}", status.violations.len());
                println!("  Expansions: {}", status.expansions.len());
            }
            None => println!("No active scope."),
        },
        ResponseData::LoopCheck { check } => {
            let mark = if check.is_flagged() { "!" } else { "✓" };
            println!("{} {} [{}] {}", mark, check.file_path, check.state, check.advisory_text);
        }
        ResponseData::LoopStatus { files } => {
            if files.is_empty() {
                println!("No edits recorded.");
            }
            for (file, state) in files {
                println!("  {:<12} {}", state.to_string(), file);
            }
        }
        ResponseData::Checkpoint { checkpoint } => {
            println!(
                "✓ {} \"{}\" at \"{}\" ({}% done)",
                checkpoint.task_id,
                checkpoint.task_description,
                checkpoint.current_step,
                checkpoint.progress_percent()
            );
        }
        ResponseData::Checkpoints { checkpoints } => {
            if checkpoints.is_empty() {
                println!("No checkpoints saved.");
            }
            for checkpoint in checkpoints {
                println!(
                    "  {} {} \"{}\"",
                    checkpoint.saved_at.format("%Y-%m-%d %H:%M"),
                    checkpoint.task_id,
                    checkpoint.task_description
                );
            }
        }
        ResponseData::Instruction { instruction } => {
            println!(
                "✓ [{}] {} ({})",
                instruction.importance, instruction.instruction, instruction.reason
            );
        }
        ResponseData::Reinforcement { reinforcement } => {
            if reinforcement.instructions.is_empty() {
                println!("No instructions registered.");
            } else {
                println!("{}", reinforcement.reminder);
            }
        }
        other => println!("{:#?}", other),
    }
}

fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}
