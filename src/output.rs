use std::io::Write;

use camino::Utf8Path;
use console::{Style, Term};

use crate::cache::CacheEntry;
use crate::mutants::{MutantStatus, MutationId};
use crate::orchestrator::{Reporter, Tally};

const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn print_legend(test_command: &str) {
    let dim = Style::new().dim();
    println!(
        "\n- Mutation testing starting -\n\n\
         These are the steps:\n\
         1. A full test suite run will be made to make sure we\n   \
            can run the tests successfully and we know how long\n   \
            it takes (to detect infinite loops for example)\n\
         2. Mutants will be generated and checked\n\n\
         Results are stored in .mutator-cache.json.\n\
         Print found mutants with `mutator results`.\n\n\
         Legend for output:\n\
         🎉 Killed mutants.   The goal is for everything to end up in this bucket.\n\
         ⏰ Timeout.          Test suite took 10 times as long as the baseline so were killed.\n\
         🤔 Suspicious.       Tests took a long time, but not long enough to be fatal.\n\
         🙁 Survived.         This means your tests need to be expanded.\n\
         🔇 Skipped.          Skipped.\n"
    );
    println!("{} {}", dim.apply_to("Test command:"), test_command);
}

pub fn progress_line(tally: &Tally, spin: usize) -> String {
    format!(
        "{} {}/{}  🎉 {}  ⏰ {}  🤔 {}  🙁 {}  🔇 {}",
        SPINNER[spin % SPINNER.len()],
        tally.progress,
        tally.total,
        tally.killed,
        tally.timeout,
        tally.suspicious,
        tally.survived,
        tally.skipped,
    )
}

/// Redraws one status line on the terminal as the run advances.
pub struct ConsoleReporter {
    term: Term,
    spin: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        ConsoleReporter {
            term: Term::stdout(),
            spin: 0,
        }
    }

    pub fn finish(&mut self) {
        let _ = writeln!(self.term);
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn progress(&mut self, tally: &Tally) {
        self.spin += 1;
        let line = progress_line(tally, self.spin);
        if self.term.is_term() {
            let _ = self.term.clear_line();
            let _ = write!(self.term, "{line}");
            let _ = self.term.flush();
        } else if tally.progress == tally.total {
            let _ = writeln!(self.term, "{line}");
        }
    }

    fn mutant_done(&mut self, filename: &Utf8Path, id: &MutationId, status: MutantStatus) {
        tracing::debug!("{filename} {id}: {status}");
    }

    fn output(&mut self, line: &str) {
        if self.term.is_term() {
            let _ = self.term.clear_line();
        }
        let _ = writeln!(self.term, "{line}");
    }
}

fn status_style(status: MutantStatus) -> Style {
    match status {
        MutantStatus::OkKilled => Style::new().green(),
        MutantStatus::OkSuspicious => Style::new().yellow(),
        MutantStatus::BadTimeout => Style::new().magenta(),
        MutantStatus::BadSurvived => Style::new().red().bold(),
        MutantStatus::Untested => Style::new().dim(),
    }
}

pub fn print_summary(tally: &Tally) {
    let style = if tally.survived + tally.timeout + tally.suspicious == 0 {
        Style::new().green().bold()
    } else {
        Style::new().yellow().bold()
    };
    let mark = if tally.survived == 0 { "✓" } else { "!" };
    println!(
        "{} {} mutants: {} killed, {} survived, {} timeout, {} suspicious, {} skipped",
        style.apply_to(mark),
        tally.total,
        tally.killed,
        tally.survived,
        tally.timeout,
        tally.suspicious,
        tally.skipped,
    );
}

/// Lists every non-killed mutant, grouped by status then file.
pub fn print_results(entries: &[CacheEntry]) {
    let groups = [
        (MutantStatus::BadTimeout, "Timed out ⏰"),
        (MutantStatus::OkSuspicious, "Suspicious 🤔"),
        (MutantStatus::BadSurvived, "Survived 🙁"),
        (MutantStatus::Untested, "Untested/skipped"),
    ];
    println!("To apply a mutant on disk:\n    mutator apply <id>\n");
    println!("To show a mutant:\n    mutator show <id>\n");

    let id_style = Style::new().cyan().bold();
    let dim = Style::new().dim();
    for (status, title) in groups {
        let matching: Vec<&CacheEntry> = entries.iter().filter(|e| e.status == status).collect();
        if matching.is_empty() {
            continue;
        }
        println!("{} ({})\n", status_style(status).apply_to(title), matching.len());
        let mut current_file: Option<&Utf8Path> = None;
        for entry in matching {
            if current_file != Some(entry.filename.as_path()) {
                println!("---- {} ----\n", entry.filename);
                current_file = Some(&entry.filename);
            }
            println!(
                "  {} {}",
                id_style.apply_to(entry.id),
                dim.apply_to(format!(
                    "line {}: {}",
                    entry.mutation.line_number + 1,
                    entry.mutation.line.trim()
                )),
            );
        }
        println!();
    }
}

pub fn print_diff(diff: &str) {
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", Style::new().bold().apply_to(line));
        } else if line.starts_with('-') {
            println!("{}", Style::new().red().apply_to(line));
        } else if line.starts_with('+') {
            println!("{}", Style::new().green().apply_to(line));
        } else if line.starts_with("@@") {
            println!("{}", Style::new().cyan().apply_to(line));
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_shows_counts() {
        let tally = Tally {
            total: 10,
            progress: 4,
            killed: 2,
            timeout: 1,
            suspicious: 0,
            survived: 1,
            skipped: 0,
        };
        let line = progress_line(&tally, 0);
        assert!(line.starts_with('⠋'));
        assert!(line.contains("4/10"));
        assert!(line.contains("🎉 2"));
        assert!(line.contains("⏰ 1"));
        assert!(line.contains("🙁 1"));
    }
}
