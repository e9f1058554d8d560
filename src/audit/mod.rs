//! Conformance audit: category auditors, recorder and report.
//!
//! # Flow
//!
//! ```text
//! Category auditors ──> Recorder ──> AuditRun ──> report::finalize
//! ```
//!
//! Categories run strictly one after another in `Category::ALL` order. Inside a
//! category a failed predicate is recorded and the auditor keeps going; an error
//! while fetching data stops that category only, and is recorded as a single
//! failing outcome named after the category.

pub mod business_rules;
pub mod frontend;
pub mod ia;
pub mod logs;
pub mod recorder;
pub mod report;
pub mod scan;
pub mod structure;
pub mod wallet;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::Result;
use crate::models::{AuditRun, Category};
use crate::store::{DataStore, Query};

pub use recorder::Recorder;

/// Wallet log action types that add credits; every other action spends them.
pub const CREDIT_ACTIONS: [&str; 2] = ["credit_purchase", "admin_credit_addition"];

/// Default number of rows sampled by per-row checks.
pub const DEFAULT_SAMPLE_LIMIT: usize = 100;

/// Tolerance used when comparing stored numeric balances.
const BALANCE_EPSILON: f64 = 1e-6;

/// Everything an auditor may read.
pub struct AuditContext<'a> {
    pub store: &'a dyn DataStore,
    /// Root of the frontend sources inspected by the `frontend` category
    pub source_root: PathBuf,
    /// Upper bound on rows fetched by per-row checks
    pub sample_limit: usize,
}

impl<'a> AuditContext<'a> {
    pub fn new(store: &'a dyn DataStore, source_root: impl Into<PathBuf>) -> Self {
        AuditContext {
            store,
            source_root: source_root.into(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    pub fn with_sample_limit(mut self, sample_limit: usize) -> Self {
        self.sample_limit = sample_limit.max(1);
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}

/// Signed effect of a wallet log on the balance.
pub fn signed_amount(action_type: &str, amount: f64) -> f64 {
    if CREDIT_ACTIONS.contains(&action_type) {
        amount
    } else {
        -amount.abs()
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < BALANCE_EPSILON
}

/// Format a credit amount without a trailing `.0` for whole numbers.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Check that a relation answers a select of `columns`.
///
/// A store rejection (missing relation or column) is this probe's failure; an
/// unreachable store is a fetch error for the category.
pub(crate) async fn probe_relation(
    ctx: &AuditContext<'_>,
    rec: &mut Recorder<'_>,
    category: Category,
    name: &str,
    table: &str,
    columns: &str,
) -> Result<()> {
    let query = Query::table(table).select(columns).limit(1);
    match ctx.store.select(&query).await {
        Ok(_) => rec.pass(category, name),
        Err(e) if e.is_api() => rec.fail(category, name, e.to_string()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Check that a procedure is exposed, without calling it.
///
/// A rejected schema request fails this probe only, like `probe_relation`.
pub(crate) async fn probe_procedure(
    ctx: &AuditContext<'_>,
    rec: &mut Recorder<'_>,
    category: Category,
    procedure: &str,
) -> Result<()> {
    let name = format!("Procedure {} exists", procedure);
    match ctx.store.procedure_exists(procedure).await {
        Ok(true) => rec.pass(category, name),
        Ok(false) => rec.fail(category, name, format!("{} is not exposed by the store", procedure)),
        Err(e) if e.is_api() => rec.fail(category, name, e.to_string()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Run one category, converting a fetch error into a single failing outcome.
pub async fn run_category(category: Category, ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) {
    rec.section(category);
    let started = Instant::now();

    let result = match category {
        Category::Structure => structure::audit(ctx, rec).await,
        Category::Logs => logs::audit(ctx, rec).await,
        Category::BusinessRules => business_rules::audit(ctx, rec).await,
        Category::Frontend => frontend::audit(ctx, rec).await,
        Category::Ia => ia::audit(ctx, rec).await,
        Category::Wallet => wallet::audit(ctx, rec).await,
    };

    if let Err(e) = result {
        log::error!("[Audit] Category {} aborted: {}", category, e);
        rec.fail(category, category.as_str(), e.to_string());
    }

    let summary = rec.run().category(category);
    log::info!(
        "[Audit] {} done in {:?}: {}/{} passed",
        category,
        started.elapsed(),
        summary.passed(),
        summary.total()
    );
}

/// Top-level orchestration of one audit run.
pub struct Auditor<'a> {
    ctx: AuditContext<'a>,
    selected: Vec<Category>,
}

impl<'a> Auditor<'a> {
    pub fn new(ctx: AuditContext<'a>) -> Self {
        Auditor {
            ctx,
            selected: Category::ALL.to_vec(),
        }
    }

    /// Restrict the run to `categories`; an empty slice keeps all of them.
    pub fn only(mut self, categories: &[Category]) -> Self {
        if !categories.is_empty() {
            self.selected = categories.to_vec();
        }
        self
    }

    pub fn is_selected(&self, category: Category) -> bool {
        self.selected.contains(&category)
    }

    /// Run every selected category, finalize and print the summary.
    pub async fn run(&self, out: &mut (dyn Write + Send)) -> AuditRun {
        let mut run = AuditRun::new();
        log::info!(
            "[Audit] Starting audit against {} backend",
            self.ctx.store.backend_tag()
        );

        {
            let mut rec = Recorder::new(&mut run, &mut *out);
            report::render_header(&mut rec);
            for category in Category::ALL {
                if self.is_selected(category) {
                    run_category(category, &self.ctx, &mut rec).await;
                } else {
                    log::debug!("[Audit] Skipping category {}", category);
                }
            }
        }

        let overall = report::finalize(&mut run);
        log::info!(
            "[Audit] Finished: {}/{} passed",
            overall.passed,
            overall.total()
        );
        if let Err(e) = report::render_summary(&run, out) {
            log::warn!("[Audit] Failed to write summary: {}", e);
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_signed_amount() {
        assert_eq!(signed_amount("credit_purchase", 50.0), 50.0);
        assert_eq!(signed_amount("admin_credit_addition", 5.0), 5.0);
        assert_eq!(signed_amount("ai_service", 10.0), -10.0);
        assert_eq!(signed_amount("purchase_profile", -10.0), -10.0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(120.0), "120");
        assert_eq!(format_amount(-3.5), "-3.5");
    }

    #[test]
    fn test_sample_limit_is_at_least_one() {
        let store = MemoryStore::new();
        let ctx = AuditContext::new(&store, "src").with_sample_limit(0);
        assert_eq!(ctx.sample_limit, 1);
    }

    #[tokio::test]
    async fn test_probe_relation_records_missing_relation() {
        let store = MemoryStore::new();
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        let mut rec = Recorder::new(&mut run, &mut out);
        probe_relation(&ctx, &mut rec, Category::Ia, "View exists", "v_stats", "id")
            .await
            .unwrap();
        let tests = rec.run().category(Category::Ia).tests();
        assert!(!tests[0].passed);
        assert!(tests[0].details.contains("v_stats"));
    }

    #[tokio::test]
    async fn test_probe_relation_propagates_transport_errors() {
        let mut store = MemoryStore::new();
        store.fail_table("v_stats", "timed out");
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        let mut rec = Recorder::new(&mut run, &mut out);
        let result = probe_relation(&ctx, &mut rec, Category::Ia, "View exists", "v_stats", "id").await;
        assert!(result.is_err());
        assert_eq!(rec.run().category(Category::Ia).total(), 0);
    }

    #[tokio::test]
    async fn test_probe_procedure_records_unexposed_procedure() {
        let mut store = MemoryStore::new();
        store.register_procedure("use_ai_credits", serde_json::Value::Null);
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        let mut rec = Recorder::new(&mut run, &mut out);
        probe_procedure(&ctx, &mut rec, Category::Ia, "use_ai_credits").await.unwrap();
        probe_procedure(&ctx, &mut rec, Category::Ia, "track_cv_download").await.unwrap();

        let tests = rec.run().category(Category::Ia).tests();
        assert!(tests[0].passed);
        assert_eq!(tests[1].name, "Procedure track_cv_download exists");
        assert!(!tests[1].passed);
        assert_eq!(tests[1].details, "track_cv_download is not exposed by the store");
    }

    #[tokio::test]
    async fn test_probe_procedure_records_rejected_schema() {
        let mut store = MemoryStore::new();
        store.reject_schema("JWT expired");
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        let mut rec = Recorder::new(&mut run, &mut out);
        let result = probe_procedure(&ctx, &mut rec, Category::BusinessRules, "use_ai_credits").await;

        assert!(result.is_ok());
        let tests = rec.run().category(Category::BusinessRules).tests();
        assert!(!tests[0].passed);
        assert!(tests[0].details.contains("JWT expired"));
    }

    #[tokio::test]
    async fn test_only_restricts_categories() {
        let store = MemoryStore::new();
        let auditor = Auditor::new(AuditContext::new(&store, "src")).only(&[Category::Wallet]);
        assert!(auditor.is_selected(Category::Wallet));
        assert!(!auditor.is_selected(Category::Logs));
        let auditor = Auditor::new(AuditContext::new(&store, "src")).only(&[]);
        assert!(auditor.is_selected(Category::Logs));
    }
}
