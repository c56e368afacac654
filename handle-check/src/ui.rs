//! Display logic for the handle-check CLI.
//!
//! Headers and summaries go to stdout with `console` styling; logs go to
//! stderr through tracing.

use console::{pad_str, style, Alignment};
use handle_check_lib::{HandleCheckError, Outcome, RunReport, Settings, Status};
use std::io::Write;

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a run.
pub fn print_header(input_count: usize, queued: usize, settings: &Settings) {
    println!(
        "{} {} {}",
        style("handle-check").bold(),
        style(format!("v{}", handle_check_lib::VERSION)).dim(),
        style(format!(
            "- {} of {} username{} to check",
            queued,
            input_count,
            if input_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let run = &settings.run;
    let meta_parts = [
        format!("Workers: {}", run.workers()),
        format!("Delay: {:?}", run.base_delay),
        format!("Retries: {}", run.attempts()),
        format!("State: {}", run.state_path.display()),
    ];
    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Dry run ──────────────────────────────────────────────────────────────────

/// Print the queue a run would process, one username per line.
pub fn print_plan(queue: &[String], input_count: usize) {
    for identifier in queue {
        println!("{}", identifier);
    }
    eprintln!(
        "{}",
        style(format!(
            "{} to check, {} skipped",
            queue.len(),
            input_count.saturating_sub(queue.len())
        ))
        .dim()
    );
}

// ── Interactive ──────────────────────────────────────────────────────────────

/// Explain the interactive prompt on stderr.
pub fn print_interactive_banner() {
    eprintln!(
        "{}",
        style("Type usernames to check, one per line. Type 'exit' to quit.").dim()
    );
}

/// Prompt for the next username on stderr.
pub fn print_prompt() {
    eprint!("{} ", style(">").cyan().bold());
    let _ = std::io::stderr().flush();
}

/// Print one verdict to stdout as `<username> <status>`.
pub fn print_verdict(outcome: &Outcome) {
    println!("{} {}", outcome.identifier, styled_status(outcome.status));
}

pub fn print_check_error(username: &str, error: &HandleCheckError) {
    eprintln!(
        "{} {}: {}",
        style("Error checking").red(),
        username,
        error
    );
}

// ── Summary ──────────────────────────────────────────────────────────────────

fn colored(status: Status, text: String) -> String {
    match status {
        Status::Available => style(text).green().to_string(),
        Status::Taken => style(text).red().to_string(),
        Status::Invalid => style(text).yellow().to_string(),
        Status::Purchasable => style(text).cyan().to_string(),
        Status::Error => style(text).magenta().to_string(),
    }
}

fn styled_status(status: Status) -> String {
    colored(status, status.as_str().to_string())
}

fn styled_count(status: Status, count: usize) -> String {
    let label = pad_str(status.as_str(), 12, Alignment::Left, None);
    colored(status, format!("{} {}", label, count))
}

/// Print the final summary with per-status counts.
pub fn print_summary(report: &RunReport, settings: &Settings) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} checked this run in {:.1}s",
        style(report.completed).bold(),
        report.elapsed.as_secs_f64(),
    );

    for status in Status::ALL {
        let count = report.count(status);
        if count > 0 {
            println!("  {}", styled_count(status, count));
        }
    }

    if report.interrupted {
        println!(
            "  {}",
            style(format!(
                "Interrupted: {} pending, run again to resume from {}",
                report.pending,
                settings.run.state_path.display()
            ))
            .yellow()
        );
    } else {
        println!(
            "  {}",
            style(format!("Results saved to {}", settings.run.output_dir.display())).dim()
        );
    }
}
