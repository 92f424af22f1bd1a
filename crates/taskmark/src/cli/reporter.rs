//! Console reporter with live output

use console::style;

use taskmark_tasks::{TaskEvent, TaskReporter};

/// Prints task progress to the terminal
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { call, scripts } => {
                println!(
                    "  {} {} {}",
                    style("▸").dim(),
                    style(call).bold(),
                    if self.verbose {
                        style(format!("({} scripts)", scripts)).dim().to_string()
                    } else {
                        String::new()
                    }
                );
            }
            TaskEvent::Output {
                call,
                line,
                is_stderr,
            } => {
                if *is_stderr {
                    eprintln!("    {} {}", style(format!("[{}]", call)).red().dim(), line);
                } else {
                    println!("    {} {}", style(format!("[{}]", call)).dim(), line);
                }
            }
            TaskEvent::Completed { call, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(call).green(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed {
                call,
                exit_code,
                duration,
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(call).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(format!("exit code {}", exit_code)).red().dim()
                );
            }
            TaskEvent::Skipped { call, reason } => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(call).yellow(),
                    style(format!("({})", reason)).dim()
                );
            }
            TaskEvent::RequireUnsatisfied { call } => {
                println!(
                    "  {} {} {}",
                    style("✗").red(),
                    style(call).red(),
                    style("(required files are missing)").red().dim()
                );
            }
            TaskEvent::AllCompleted {
                total,
                succeeded,
                skipped,
                failed,
                duration,
            } => {
                println!();
                println!(
                    "  {} {}/{} succeeded, {} skipped, {} failed ({:.1}s)",
                    if *failed == 0 && succeeded + skipped == *total {
                        style("✓").green().bold()
                    } else {
                        style("✗").red().bold()
                    },
                    succeeded,
                    total,
                    skipped,
                    failed,
                    duration.as_secs_f64()
                );
            }
        }
    }
}
