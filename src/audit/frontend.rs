//! Frontend static analysis: counters and scores must be computed server-side.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::scan::{list_source_files, list_top_level_files};
use super::{AuditContext, Recorder};
use crate::error::Result;
use crate::models::Category;

const CATEGORY: Category = Category::Frontend;

const SOURCE_EXTENSIONS: [&str; 2] = ["ts", "tsx"];

/// RPCs the service layer must go through.
const REQUIRED_RPCS: [&str; 3] = ["increment_profile_view", "track_cv_download", "use_ai_credits"];

/// Files matching this are backend service wrappers and may name score helpers.
const SERVICE_FILE_MARKER: &str = "Service.ts";

static DIRECT_INCREMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\.update\(.*profile_views.*\+",
        r"\.update\(.*cv_downloads.*\+",
        r"(?i)SET\s+profile_views\s*=",
        r"(?i)SET\s+cv_downloads\s*=",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid direct increment regex"))
    .collect()
});

static SCORE_CALCULATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"calculateScore\s*\(",
        r"computeAIScore",
        r"ai_score\s*=\s*\d+",
        r"score\s*=.*experience.*education",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid score calculation regex"))
    .collect()
});

/// Source file name relative to the scanned root, for details.
fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// File content as text. Invalid UTF-8 is replaced rather than rejected so
/// one legacy-encoded file cannot hide the others from the checks.
fn read_source(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => {
            log::warn!("[Audit] {} is not valid UTF-8, reading lossily", path.display());
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

fn matches_any(patterns: &[Regex], content: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(content)).count()
}

pub async fn audit(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let root = ctx.source_root();
    let files = list_source_files(root, &SOURCE_EXTENSIONS)?;
    log::debug!("[Audit] Scanning {} frontend file(s) under {}", files.len(), root.display());

    let sources: Vec<(PathBuf, String)> = files
        .into_iter()
        .map(|path| read_source(&path).map(|content| (path, content)))
        .collect::<std::io::Result<_>>()?;

    check_direct_increments(root, &sources, rec);
    check_score_calculation(root, &sources, rec);
    check_services_use_rpcs(&root.join("services"), rec)
}

fn check_direct_increments(root: &Path, sources: &[(PathBuf, String)], rec: &mut Recorder<'_>) {
    let mut violations = Vec::new();
    for (path, content) in sources {
        let hits = matches_any(&DIRECT_INCREMENT_PATTERNS, content);
        for _ in 0..hits {
            violations.push(format!("{}: direct increment detected", relative(root, path)));
        }
    }
    rec.record(
        CATEGORY,
        "No direct counter increment in frontend",
        violations.is_empty(),
        violations.join(", "),
    );
}

fn check_score_calculation(root: &Path, sources: &[(PathBuf, String)], rec: &mut Recorder<'_>) {
    let offenders: Vec<String> = sources
        .iter()
        .filter(|(path, _)| !path.to_string_lossy().contains(SERVICE_FILE_MARKER))
        .filter(|(_, content)| matches_any(&SCORE_CALCULATION_PATTERNS, content) > 0)
        .map(|(path, _)| relative(root, path))
        .collect();

    let details = if offenders.is_empty() {
        String::new()
    } else {
        let shown: Vec<&str> = offenders.iter().take(3).map(String::as_str).collect();
        format!("found in: {}", shown.join(", "))
    };
    rec.record(
        CATEGORY,
        "No AI score calculation in frontend",
        offenders.is_empty(),
        details,
    );
}

fn check_services_use_rpcs(services: &Path, rec: &mut Recorder<'_>) -> Result<()> {
    let mut found = Vec::new();
    for path in list_top_level_files(services, &["ts"])? {
        let content = read_source(&path)?;
        for rpc in REQUIRED_RPCS {
            if content.contains(rpc) && !found.contains(&rpc) {
                found.push(rpc);
            }
        }
    }

    let missing: Vec<&str> = REQUIRED_RPCS
        .iter()
        .copied()
        .filter(|rpc| !found.contains(rpc))
        .collect();
    let details = if missing.is_empty() {
        String::new()
    } else {
        format!("missing RPC(s): {}", missing.join(", "))
    };
    rec.record(CATEGORY, "Services use backend RPCs", missing.is_empty(), details);
    Ok(())
}
