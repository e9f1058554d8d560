//! Logs and traceability audit.

use serde::Deserialize;
use serde_json::Value;

use super::{approx_eq, format_amount, signed_amount, AuditContext, Recorder, CREDIT_ACTIONS};
use crate::error::Result;
use crate::models::Category;
use crate::store::{decode_rows, display_value, Query};

const CATEGORY: Category = Category::Logs;

/// Paid actions that must leave a complete wallet log.
const PAID_ACTIONS: [&str; 3] = ["purchase_profile", "ai_service", "premium_service"];

const NO_DATA: &str = "no data to check";

#[derive(Debug, Deserialize)]
struct ViewedCandidate {
    candidate_id: Value,
}

#[derive(Debug, Deserialize)]
struct WalletLog {
    id: Value,
    action_type: Option<String>,
    amount: Option<f64>,
    balance_before: Option<f64>,
    balance_after: Option<f64>,
}

impl WalletLog {
    fn is_complete(&self) -> bool {
        self.amount.is_some() && self.balance_before.is_some() && self.balance_after.is_some()
    }

    /// `after == before ± amount` depending on the action direction.
    fn is_coherent(&self) -> bool {
        match (self.balance_before, self.balance_after, self.amount) {
            (Some(before), Some(after), Some(amount)) => {
                let action = self.action_type.as_deref().unwrap_or_default();
                approx_eq(after, before + signed_amount(action, amount))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsLog {
    created_at: Option<String>,
}

pub async fn audit(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    check_views_are_logged(ctx, rec).await?;
    check_paid_actions_logged(ctx, rec).await?;
    check_balance_coherence(ctx, rec).await?;
    check_log_timestamps(ctx, rec).await
}

async fn check_views_are_logged(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "Every profile view has a matching log";

    let query = Query::table("candidate_stats")
        .select("candidate_id, profile_views")
        .gt("profile_views", 0)
        .limit(5);
    let viewed: Vec<ViewedCandidate> = decode_rows(ctx.store.select(&query).await?)?;
    if viewed.is_empty() {
        rec.record(CATEGORY, NAME, true, NO_DATA);
        return Ok(());
    }

    let mut unlogged = Vec::new();
    for candidate in &viewed {
        let logs = ctx
            .store
            .select(
                &Query::table("candidate_stats_logs")
                    .select("id")
                    .eq("candidate_id", candidate.candidate_id.clone())
                    .eq("stat_type", "profile_views")
                    .limit(1),
            )
            .await?;
        if logs.is_empty() {
            unlogged.push(display_value(&candidate.candidate_id));
        }
    }

    let details = if unlogged.is_empty() {
        String::new()
    } else {
        format!("views without log for candidate(s): {}", unlogged.join(", "))
    };
    rec.record(CATEGORY, NAME, unlogged.is_empty(), details);
    Ok(())
}

async fn check_paid_actions_logged(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "Paid actions have a complete wallet log";

    let query = Query::table("wallet_logs")
        .select("id, action_type, amount, balance_before, balance_after")
        .in_("action_type", PAID_ACTIONS)
        .limit(10);
    let logs: Vec<WalletLog> = decode_rows(ctx.store.select(&query).await?)?;
    if logs.is_empty() {
        rec.record(CATEGORY, NAME, true, NO_DATA);
        return Ok(());
    }

    let incomplete: Vec<String> = logs
        .iter()
        .filter(|log| !log.is_complete())
        .map(|log| display_value(&log.id))
        .collect();
    let details = if incomplete.is_empty() {
        String::new()
    } else {
        format!("incomplete wallet log(s): {}", incomplete.join(", "))
    };
    rec.record(CATEGORY, NAME, incomplete.is_empty(), details);
    Ok(())
}

async fn check_balance_coherence(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "balance_before/balance_after coherence";

    let query = Query::table("wallet_logs")
        .select("id, balance_before, balance_after, amount, action_type")
        .not_null("balance_before")
        .not_null("balance_after")
        .limit(20);
    let logs: Vec<WalletLog> = decode_rows(ctx.store.select(&query).await?)?;
    if logs.is_empty() {
        rec.record(CATEGORY, NAME, true, NO_DATA);
        return Ok(());
    }

    match logs.iter().find(|log| !log.is_coherent()) {
        None => rec.pass(CATEGORY, NAME),
        Some(log) => {
            let action = log.action_type.as_deref().unwrap_or("unknown");
            let expected = match (log.balance_before, log.amount) {
                (Some(before), Some(amount)) => {
                    format_amount(before + signed_amount(action, amount))
                }
                _ => "n/a".to_string(),
            };
            let actual = log
                .balance_after
                .map(format_amount)
                .unwrap_or_else(|| "null".to_string());
            let direction = if CREDIT_ACTIONS.contains(&action) { "credit" } else { "debit" };
            rec.fail(
                CATEGORY,
                NAME,
                format!(
                    "log {} ({} {}): expected balance_after {}, actual {}",
                    display_value(&log.id),
                    direction,
                    action,
                    expected,
                    actual
                ),
            );
        }
    }
    Ok(())
}

async fn check_log_timestamps(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "Stats logs have timestamps";

    let query = Query::table("candidate_stats_logs")
        .select("created_at")
        .order("created_at", false)
        .limit(10);
    let logs: Vec<StatsLog> = decode_rows(ctx.store.select(&query).await?)?;
    if logs.is_empty() {
        rec.record(CATEGORY, NAME, true, NO_DATA);
        return Ok(());
    }

    let missing = logs.iter().filter(|l| l.created_at.is_none()).count();
    let details = if missing == 0 {
        String::new()
    } else {
        format!("{} log(s) without created_at", missing)
    };
    rec.record(CATEGORY, NAME, missing == 0, details);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditRun;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn log(action: &str, amount: f64, before: f64, after: f64) -> WalletLog {
        WalletLog {
            id: json!(1),
            action_type: Some(action.to_string()),
            amount: Some(amount),
            balance_before: Some(before),
            balance_after: Some(after),
        }
    }

    #[test]
    fn test_coherence_rules() {
        assert!(log("credit_purchase", 100.0, 0.0, 100.0).is_coherent());
        assert!(log("ai_service", 10.0, 100.0, 90.0).is_coherent());
        assert!(log("ai_service", -10.0, 100.0, 90.0).is_coherent());
        assert!(!log("ai_service", 10.0, 100.0, 110.0).is_coherent());
    }

    #[tokio::test]
    async fn test_incoherent_log_is_named() {
        let mut store = MemoryStore::new();
        store.insert_json(
            "wallet_logs",
            vec![
                json!({"id": "l1", "action_type": "credit_purchase", "amount": 50, "balance_before": 0, "balance_after": 50}),
                json!({"id": "l2", "action_type": "premium_service", "amount": 20, "balance_before": 50, "balance_after": 40}),
            ],
        );
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        check_balance_coherence(&ctx, &mut Recorder::new(&mut run, &mut out))
            .await
            .unwrap();
        let outcome = &run.category(CATEGORY).tests()[0];
        assert!(!outcome.passed);
        assert_eq!(
            outcome.details,
            "log l2 (debit premium_service): expected balance_after 30, actual 40"
        );
    }

    #[tokio::test]
    async fn test_incomplete_paid_action_log_is_named() {
        let mut store = MemoryStore::new();
        store.insert_json(
            "wallet_logs",
            vec![
                json!({"id": "l1", "action_type": "ai_service", "amount": 10, "balance_before": 50, "balance_after": 40}),
                json!({"id": "l2", "action_type": "purchase_profile", "amount": 20, "balance_before": 40, "balance_after": null}),
                json!({"id": "l3", "action_type": "credit_purchase", "amount": null, "balance_before": null, "balance_after": null}),
            ],
        );
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        check_paid_actions_logged(&ctx, &mut Recorder::new(&mut run, &mut out))
            .await
            .unwrap();
        let outcome = &run.category(CATEGORY).tests()[0];
        assert_eq!(outcome.name, "Paid actions have a complete wallet log");
        assert!(!outcome.passed);
        assert_eq!(outcome.details, "incomplete wallet log(s): l2");
    }

    #[tokio::test]
    async fn test_missing_view_log_is_reported() {
        let mut store = MemoryStore::new();
        store
            .insert_json(
                "candidate_stats",
                vec![
                    json!({"candidate_id": "c1", "profile_views": 3}),
                    json!({"candidate_id": "c2", "profile_views": 1}),
                    json!({"candidate_id": "c3", "profile_views": 0}),
                ],
            )
            .insert_json(
                "candidate_stats_logs",
                vec![json!({"id": 1, "candidate_id": "c1", "stat_type": "profile_views"})],
            );
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        check_views_are_logged(&ctx, &mut Recorder::new(&mut run, &mut out))
            .await
            .unwrap();
        let outcome = &run.category(CATEGORY).tests()[0];
        assert!(!outcome.passed);
        assert_eq!(outcome.details, "views without log for candidate(s): c2");
    }

    #[tokio::test]
    async fn test_empty_tables_pass_with_note() {
        let mut store = MemoryStore::new();
        store
            .declare_columns("candidate_stats", &["candidate_id", "profile_views"])
            .declare_columns(
                "wallet_logs",
                &["id", "action_type", "amount", "balance_before", "balance_after"],
            )
            .declare_columns("candidate_stats_logs", &["id", "created_at"]);
        let ctx = AuditContext::new(&store, "src");
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        audit(&ctx, &mut Recorder::new(&mut run, &mut out)).await.unwrap();
        let result = run.category(CATEGORY);
        assert_eq!(result.passed(), 4);
        assert!(result.tests().iter().all(|t| t.details == NO_DATA));
    }
}
