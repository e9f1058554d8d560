//! Final report: totals, conformance table, verdict and JSON export.

use chrono::{SecondsFormat, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use super::Recorder;
use crate::error::Result;
use crate::models::{AuditRun, CategoryResult, OverallResult, Verdict};

const RULE: &str = "═══════════════════════════════════════════════════════";

/// Width of the category label column in the conformance table.
const LABEL_WIDTH: usize = 25;

fn score_text(score: Option<u8>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{}%", s))
}

/// One conformance table row.
pub fn table_row(label: &str, result: &CategoryResult) -> String {
    let status = if result.is_compliant() {
        "✔ COMPLIANT"
    } else {
        "❌ NON-COMPLIANT"
    };
    format!(
        "{:<width$} {}/{} tests   {}   {}",
        label,
        result.passed(),
        result.total(),
        score_text(result.score()),
        status,
        width = LABEL_WIDTH
    )
}

/// Start banner, printed through the recorder so it shares the run's sink.
pub fn render_header(rec: &mut Recorder<'_>) {
    let started = rec.run().started_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    rec.line(RULE);
    rec.line("   FULL CONFORMANCE AUDIT - WALLET + STATS + AI");
    rec.line(RULE);
    rec.line(&format!("Started: {}", started));
}

/// Sum every category into the run's overall result.
pub fn finalize(run: &mut AuditRun) -> OverallResult {
    run.overall = run.totals();
    run.overall
}

fn verdict_note(verdict: Verdict, overall: &OverallResult) -> String {
    match verdict {
        Verdict::FullyCompliant => "All checks passed.".to_string(),
        Verdict::PartiallyCompliant => {
            format!("{} failed check(s) need attention.", overall.failed)
        }
        Verdict::NonCompliant => "Significant corrections are required.".to_string(),
    }
}

/// Print the conformance table, overall score, verdict and deviations.
pub fn render_summary(run: &AuditRun, out: &mut (dyn Write + Send)) -> io::Result<()> {
    let overall = run.overall;

    writeln!(out)?;
    writeln!(out, "📊 7️⃣ FINAL REPORT")?;
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "               CONFORMANCE TABLE")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    for (category, result) in run.categories.iter() {
        writeln!(out, "{}", table_row(category.label(), result))?;
    }

    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "OVERALL SCORE: {}", score_text(overall.score))?;
    writeln!(out, "Checks passed: {}/{}", overall.passed, overall.total())?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;

    let verdict = overall.verdict();
    writeln!(out, "{}", verdict.headline())?;
    writeln!(out, "{}", verdict_note(verdict, &overall))?;

    if overall.failed > 0 {
        writeln!(out)?;
        writeln!(out, "📋 DEVIATIONS:")?;
        for (category, result) in run.categories.iter() {
            if result.is_compliant() {
                continue;
            }
            writeln!(out)?;
            writeln!(out, "{}:", category.as_str().to_uppercase())?;
            for test in result.failures() {
                writeln!(out, "  • {}", test.name)?;
                if !test.details.is_empty() {
                    writeln!(out, "    {}", test.details)?;
                }
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(
        out,
        "Finished: {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )?;
    writeln!(out, "{}", RULE)?;
    out.flush()
}

/// Write the run as pretty JSON, creating parent directories.
pub fn write_json(run: &AuditRun, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(run)?;
    fs::write(path, json)?;
    log::info!("[Audit] Report saved to {}", path.display());
    Ok(())
}
