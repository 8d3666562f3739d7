//! Run report: one entry per step, printed as colored status lines.

use crate::guard::StepOutcome;
use crate::selector::Strategy;
use crossterm::style::Stylize;

/// One step of the run and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Everything that happened during one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub strategy: Strategy,
    pub steps: Vec<StepReport>,
    /// Nothing was changed; `NowSatisfied` means "would be done"
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            steps: Vec::new(),
            dry_run: false,
        }
    }

    /// Mark the report as a preview.
    pub fn preview(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Status text for `outcome`, honoring dry-run.
    pub fn describe(&self, outcome: &StepOutcome) -> String {
        match outcome {
            StepOutcome::NowSatisfied if self.dry_run => "would do".to_string(),
            other => other.to_string(),
        }
    }

    fn done_word(&self) -> &'static str {
        if self.dry_run { "would do" } else { "done" }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: StepOutcome) {
        self.steps.push(StepReport {
            name: name.into(),
            outcome,
        });
    }

    /// Outcome of the first step called `name`.
    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name).map(|s| &s.outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.is_failure())
    }

    /// Process exit code: 1 if any step failed, else 0.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.has_failures())
    }

    /// (already done, done, skipped, failed)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        self.steps
            .iter()
            .fold((0, 0, 0, 0), |(a, d, s, f), step| match step.outcome {
                StepOutcome::AlreadySatisfied => (a + 1, d, s, f),
                StepOutcome::NowSatisfied => (a, d + 1, s, f),
                StepOutcome::Skipped(_) => (a, d, s + 1, f),
                StepOutcome::Failed(_) => (a, d, s, f + 1),
            })
    }

    /// Uncolored summary lines.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.steps.len() + 2);
        out.push(self.heading());
        for step in &self.steps {
            out.push(format!("[{}] {}", self.describe(&step.outcome), step.name));
        }
        out.push(self.totals());
        out
    }

    fn heading(&self) -> String {
        if self.dry_run {
            format!("Strategy: {} (dry run)", self.strategy)
        } else {
            format!("Strategy: {}", self.strategy)
        }
    }

    fn totals(&self) -> String {
        let (already, done, skipped, failed) = self.counts();
        format!(
            "{already} already done, {done} {}, {skipped} skipped, {failed} failed",
            self.done_word()
        )
    }

    /// Print the colored summary to stdout.
    pub fn print_summary(&self) {
        println!();
        println!("{}", self.heading().bold());
        for step in &self.steps {
            let status = match &step.outcome {
                StepOutcome::AlreadySatisfied => "✓ already done".to_string().green(),
                StepOutcome::NowSatisfied if self.dry_run => "→ would do".to_string().cyan(),
                StepOutcome::NowSatisfied => "✓ done".to_string().green(),
                StepOutcome::Skipped(reason) => format!("- skipped ({reason})").yellow(),
                StepOutcome::Failed(reason) => format!("✗ error ({reason})").red(),
            };
            println!("  {:<28} {}", step.name, status);
        }

        println!("\n{}", self.totals());
        if self.has_failures() {
            println!("{}", "Provisioning finished with errors.".red().bold());
        } else if self.dry_run {
            println!("{}", "Dry run complete. Nothing was changed.".cyan().bold());
        } else {
            println!("{}", "Provisioning complete.".green().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        let mut report = RunReport::new(Strategy::FastPath);
        report.push("Visual Studio Code", StepOutcome::AlreadySatisfied);
        report.push("MSYS2", StepOutcome::NowSatisfied);
        report.push("extension", StepOutcome::Skipped("code not found".into()));
        report
    }

    #[test]
    fn test_counts_and_exit_code() {
        let mut report = sample();
        assert_eq!(report.counts(), (1, 1, 1, 0));
        assert_eq!(report.exit_code(), 0);

        report.push("settings", StepOutcome::Failed("denied".into()));
        assert!(report.has_failures());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_lines() {
        let lines = sample().lines();
        assert_eq!(lines[0], "Strategy: fast path");
        assert_eq!(lines[1], "[already done] Visual Studio Code");
        assert_eq!(lines[3], "[skipped: code not found] extension");
        assert_eq!(lines.last().unwrap(), "1 already done, 1 done, 1 skipped, 0 failed");
    }

    #[test]
    fn test_dry_run_lines_say_would_do() {
        let report = sample().preview();
        let lines = report.lines();
        assert_eq!(lines[0], "Strategy: fast path (dry run)");
        assert_eq!(lines[1], "[already done] Visual Studio Code");
        assert_eq!(lines[2], "[would do] MSYS2");
        assert_eq!(lines.last().unwrap(), "1 already done, 1 would do, 1 skipped, 0 failed");
        assert!(!lines.iter().any(|l| l.starts_with("[done]")));
    }

    #[test]
    fn test_outcome_lookup() {
        let report = sample();
        assert_eq!(report.outcome("MSYS2"), Some(&StepOutcome::NowSatisfied));
        assert_eq!(report.outcome("missing"), None);
    }
}
