//! Business rules audit: server-side counters, balances, AI scores.

use serde_json::json;

use super::{probe_procedure, AuditContext, Recorder};
use crate::error::Result;
use crate::models::Category;
use crate::store::{Filter, Query};

const CATEGORY: Category = Category::BusinessRules;

/// Procedures that must own every counter and credit mutation.
const REQUIRED_PROCEDURES: [&str; 3] = ["increment_profile_view", "track_cv_download", "use_ai_credits"];

pub async fn audit(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    for procedure in REQUIRED_PROCEDURES {
        probe_procedure(ctx, rec, CATEGORY, procedure).await?;
    }

    let negative = ctx
        .store
        .select(
            &Query::table("wallet")
                .select("user_id, balance")
                .lt("balance", 0)
                .limit(ctx.sample_limit),
        )
        .await?;
    record_empty(rec, "No negative wallet balance", negative.len(), "negative balance(s) found");

    let out_of_range = ctx
        .store
        .select(
            &Query::table("candidate_stats")
                .select("candidate_id, ai_score")
                .not_null("ai_score")
                .or_any(vec![
                    Filter::Lt("ai_score".into(), json!(0)),
                    Filter::Gt("ai_score".into(), json!(100)),
                ])
                .limit(ctx.sample_limit),
        )
        .await?;
    record_empty(rec, "AI scores within 0-100", out_of_range.len(), "invalid score(s)");

    let unversioned = ctx
        .store
        .select(
            &Query::table("candidate_stats")
                .select("candidate_id, ai_score, ai_score_version")
                .not_null("ai_score")
                .is_null("ai_score_version")
                .limit(ctx.sample_limit),
        )
        .await?;
    record_empty(rec, "AI scores always carry a version", unversioned.len(), "score(s) without version");

    Ok(())
}

/// Pass when a violation query returned nothing.
fn record_empty(rec: &mut Recorder<'_>, name: &str, violations: usize, what: &str) {
    let details = if violations == 0 {
        String::new()
    } else {
        format!("{} {}", violations, what)
    };
    rec.record(CATEGORY, name, violations == 0, details);
}
