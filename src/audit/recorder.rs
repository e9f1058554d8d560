//! Test recorder: appends outcomes to the run and echoes them as they happen.

use std::io::Write;

use crate::models::{AuditRun, Category, TestOutcome};

/// Writes one line per check to an output sink while filling the `AuditRun`.
///
/// Output is a side effect only: a failing sink is logged and otherwise ignored.
pub struct Recorder<'a> {
    run: &'a mut AuditRun,
    out: &'a mut (dyn Write + Send),
}

impl<'a> Recorder<'a> {
    pub fn new(run: &'a mut AuditRun, out: &'a mut (dyn Write + Send)) -> Self {
        Recorder { run, out }
    }

    /// Record one named check. `details` is printed under failures only.
    pub fn record(
        &mut self,
        category: Category,
        name: impl Into<String>,
        passed: bool,
        details: impl Into<String>,
    ) {
        let outcome = TestOutcome::new(name, passed, details);
        if passed {
            self.line(&format!("  ✅ {}", outcome.name));
        } else {
            self.line(&format!("  ❌ {}", outcome.name));
            if !outcome.details.is_empty() {
                self.line(&format!("     → {}", outcome.details));
            }
            log::debug!("[Audit] {} failed: {} {}", category, outcome.name, outcome.details);
        }
        self.run.record(category, outcome);
    }

    pub fn pass(&mut self, category: Category, name: impl Into<String>) {
        self.record(category, name, true, "");
    }

    pub fn fail(&mut self, category: Category, name: impl Into<String>, details: impl Into<String>) {
        self.record(category, name, false, details);
    }

    /// Print the category banner.
    pub fn section(&mut self, category: Category) {
        self.line("");
        self.line(category.banner());
        self.line("");
    }

    pub fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            log::warn!("[Audit] Failed to write audit output: {}", e);
        }
    }

    pub fn run(&self) -> &AuditRun {
        &*self.run
    }
}
