//! Core data types for the audit run.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::error::AuditError;

/// The six fixed check groupings, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Structure,
    Logs,
    BusinessRules,
    Frontend,
    Ia,
    Wallet,
}

impl Category {
    /// Every category in the order auditors run and reports print.
    pub const ALL: [Category; 6] = [
        Category::Structure,
        Category::Logs,
        Category::BusinessRules,
        Category::Frontend,
        Category::Ia,
        Category::Wallet,
    ];

    /// Stable identifier used in JSON reports and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Structure => "structure",
            Category::Logs => "logs",
            Category::BusinessRules => "businessRules",
            Category::Frontend => "frontend",
            Category::Ia => "ia",
            Category::Wallet => "wallet",
        }
    }

    /// Human-readable label for the conformance table
    pub fn label(&self) -> &'static str {
        match self {
            Category::Structure => "Data Structure",
            Category::Logs => "Logs & Traceability",
            Category::BusinessRules => "Business Rules",
            Category::Frontend => "Frontend",
            Category::Ia => "AI",
            Category::Wallet => "Wallet",
        }
    }

    /// Section banner printed before the category's checks
    pub fn banner(&self) -> &'static str {
        match self {
            Category::Structure => "📋 1️⃣ DATA STRUCTURE AUDIT",
            Category::Logs => "📝 2️⃣ LOGS & TRACEABILITY AUDIT",
            Category::BusinessRules => "⚖️  3️⃣ BUSINESS RULES AUDIT",
            Category::Frontend => "💻 4️⃣ FRONTEND AUDIT",
            Category::Ia => "🤖 5️⃣ AI AUDIT",
            Category::Wallet => "💰 6️⃣ WALLET AUDIT",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuditError::UnknownCategory(s.to_string()))
    }
}

/// Immutable record of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    /// Diagnostic text; empty when none was provided
    pub details: String,
    /// RFC 3339 creation time
    pub timestamp: String,
}

impl TestOutcome {
    pub fn new(name: impl Into<String>, passed: bool, details: impl Into<String>) -> Self {
        TestOutcome {
            name: name.into(),
            passed,
            details: details.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Rounded percentage, `None` when nothing ran.
pub fn percent(passed: usize, total: usize) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (passed as f64 / total as f64 * 100.0).round();
    Some(pct.clamp(0.0, 100.0) as u8)
}

/// Outcomes of one category.
///
/// Counters are private so that `passed + failed == tests.len()` holds after
/// every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryResult {
    tests: Vec<TestOutcome>,
    passed: usize,
    failed: usize,
}

impl CategoryResult {
    pub fn push(&mut self, outcome: TestOutcome) {
        if outcome.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.tests.push(outcome);
    }

    pub fn tests(&self) -> &[TestOutcome] {
        &self.tests
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn score(&self) -> Option<u8> {
        percent(self.passed, self.total())
    }

    pub fn is_compliant(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestOutcome> {
        self.tests.iter().filter(|t| !t.passed)
    }
}

/// One `CategoryResult` per category, addressable by `Category`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryResults([CategoryResult; 6]);

impl CategoryResults {
    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryResult)> {
        Category::ALL.iter().map(move |c| (*c, &self.0[c.index()]))
    }
}

impl Index<Category> for CategoryResults {
    type Output = CategoryResult;

    fn index(&self, category: Category) -> &CategoryResult {
        &self.0[category.index()]
    }
}

impl IndexMut<Category> for CategoryResults {
    fn index_mut(&mut self, category: Category) -> &mut CategoryResult {
        &mut self.0[category.index()]
    }
}

impl Serialize for CategoryResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, result) in self.iter() {
            map.serialize_entry(category.as_str(), result)?;
        }
        map.end()
    }
}

/// Totals across all categories, computed at finalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverallResult {
    pub passed: usize,
    pub failed: usize,
    pub score: Option<u8>,
}

impl OverallResult {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn verdict(&self) -> Verdict {
        if self.failed == 0 {
            Verdict::FullyCompliant
        } else if self.score.map_or(false, |s| s >= PARTIAL_COMPLIANCE_THRESHOLD) {
            Verdict::PartiallyCompliant
        } else {
            Verdict::NonCompliant
        }
    }

    /// Process exit status: 0 only when nothing failed.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }
}

/// Score at or above which a run with failures is still partially compliant.
pub const PARTIAL_COMPLIANCE_THRESHOLD: u8 = 80;

/// Final classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    FullyCompliant,
    PartiallyCompliant,
    NonCompliant,
}

impl Verdict {
    pub fn headline(&self) -> &'static str {
        match self {
            Verdict::FullyCompliant => "✅ VERDICT: SYSTEM FULLY COMPLIANT",
            Verdict::PartiallyCompliant => "⚠️  VERDICT: SYSTEM PARTIALLY COMPLIANT",
            Verdict::NonCompliant => "❌ VERDICT: SYSTEM NON-COMPLIANT",
        }
    }
}

/// One execution of the audit.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRun {
    #[serde(rename = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub categories: CategoryResults,
    pub overall: OverallResult,
}

impl AuditRun {
    pub fn new() -> Self {
        AuditRun {
            started_at: Utc::now(),
            categories: CategoryResults::default(),
            overall: OverallResult::default(),
        }
    }

    pub fn category(&self, category: Category) -> &CategoryResult {
        &self.categories[category]
    }

    pub fn record(&mut self, category: Category, outcome: TestOutcome) {
        self.categories[category].push(outcome);
    }

    /// Sum of every category's counters; does not touch `overall`.
    pub fn totals(&self) -> OverallResult {
        let (passed, failed) = self
            .categories
            .iter()
            .fold((0, 0), |(p, f), (_, r)| (p + r.passed(), f + r.failed()));
        OverallResult {
            passed,
            failed,
            score: percent(passed, passed + failed),
        }
    }
}

impl Default for AuditRun {
    fn default() -> Self {
        Self::new()
    }
}
