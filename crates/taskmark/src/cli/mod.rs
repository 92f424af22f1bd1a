//! CLI definition and command handling

pub mod output;
mod project;
mod reporter;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;

use taskmark_core::Document;
use taskmark_tasks::{CancellationToken, TaskReporter, TaskScheduler, TracingReporter};

use crate::exit_codes;
use project::Project;
use reporter::ConsoleReporter;

/// Taskmark - run documented tasks and their dependencies
#[derive(Debug, Parser)]
#[command(name = "taskmark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tasks to run, together with everything they depend on
    pub tasks: Vec<String>,

    /// Print the loaded document as JSON instead of running tasks
    #[arg(long)]
    pub dry_run: bool,

    /// Write a starter manifest into the working directory
    #[arg(long, conflicts_with_all = ["tasks", "dry_run", "file"])]
    pub init: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Working directory
    #[arg(short = 'C', long)]
    pub directory: Option<PathBuf>,

    /// Manifest file (searched upwards from the working directory by default)
    #[arg(short, long, env = "TASKMARK_FILE")]
    pub file: Option<PathBuf>,
}

impl Cli {
    /// Console log level implied by the verbosity flags
    pub fn console_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    /// Execute the CLI command and return the process exit code
    pub fn execute(self) -> anyhow::Result<i32> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Cannot change directory to {}", dir.display()))?;
        }
        let cwd = std::env::current_dir()?;

        if self.init {
            let path = project::init(&cwd)?;
            if !self.quiet {
                output::success(&format!("Created {}", path.display()));
            }
            return Ok(exit_codes::SUCCESS);
        }

        let project = Project::load(&cwd, self.file.as_deref())?;
        let document = project.document()?;

        if self.dry_run {
            println!("{}", serde_json::to_string_pretty(&document)?);
            return Ok(exit_codes::SUCCESS);
        }

        if self.tasks.is_empty() {
            if !self.quiet {
                print_task_list(&project, &document);
            }
            return Ok(exit_codes::SUCCESS);
        }

        let runtime = tokio::runtime::Runtime::new()?;
        Ok(runtime.block_on(self.run(&project, document)))
    }

    async fn run(&self, project: &Project, mut document: Document) -> i32 {
        let cancel = CancellationToken::new();
        let signals = tokio::spawn(signals::cancel_on_signal(cancel.clone()));

        let reporter: Arc<dyn TaskReporter> = if self.quiet {
            Arc::new(TracingReporter)
        } else {
            Arc::new(ConsoleReporter::new(self.verbose))
        };

        let scheduler = TaskScheduler::with_processes(project.scheduler_options(), reporter);
        let report = scheduler.execute(&mut document, &self.tasks, &cancel).await;
        signals.abort();

        project.save_state(&document);

        for name in &report.unknown {
            output::warning(&format!("Unknown task: {}", name));
        }

        if report.cancelled {
            output::error("Run cancelled");
            return exit_codes::CANCELLED;
        }
        report.exit_code
    }
}

fn print_task_list(project: &Project, document: &Document) {
    let title = if document.title().is_empty() {
        "Tasks"
    } else {
        document.title()
    };
    println!("{}", output::header(title));
    if !document.description().is_empty() {
        println!("{}", style(document.description()).dim());
    }
    println!();

    if document.is_empty() {
        output::info("No tasks defined");
        return;
    }

    let width = document.tasks().keys().map(String::len).max().unwrap_or(0);
    for (call, task) in document.tasks() {
        let padding = " ".repeat(width - call.len());
        let mut line = format!("  {}{}", style(call).cyan().bold(), padding);
        if !task.title.is_empty() {
            line.push_str(&format!("  {}", task.display_name()));
        }
        if !task.depends.is_empty() {
            line.push_str(&format!(
                "  {}",
                style(format!("(after {})", task.depends.join(", "))).dim()
            ));
        }
        println!("{}", line);
    }

    println!();
    println!(
        "{}",
        output::key_value("manifest", &project.manifest_path().display().to_string())
    );
    println!(
        "{}",
        output::key_value("state", &project.state_path().display().to_string())
    );
    output::info(&format!(
        "{} defined. Run `taskmark <TASK>...` to execute.",
        output::plural(document.len(), "task")
    ));
}
