//! Data structure audit: relations, columns, wallet uniqueness, profile types.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;

use super::{probe_relation, AuditContext, Recorder};
use crate::error::Result;
use crate::models::Category;
use crate::store::{decode_rows, display_value, Query};

const CATEGORY: Category = Category::Structure;

/// Relations the wallet/stats system depends on, with the columns probed.
const RELATIONS: [(&str, &str); 4] = [
    ("wallet", "user_id, balance, created_at"),
    ("wallet_logs", "id, user_id, action_type, amount"),
    ("candidate_stats", "candidate_id, profile_views, cv_downloads, ai_score"),
    (
        "candidate_stats_logs",
        "id, candidate_id, stat_type, old_value, new_value",
    ),
];

const WALLET_COLUMNS: &str =
    "user_id, balance, reserved_balance, last_transaction_at, created_at, updated_at";

const CANDIDATE_STATS_COLUMNS: &str = "candidate_id, profile_views, cv_downloads, cv_views, \
     contact_requests, ai_score, ai_score_version, ai_score_breakdown, ai_score_last_updated";

/// Read-only procedure returning the number (or list) of duplicated wallets.
const DUPLICATES_PROCEDURE: &str = "check_wallet_duplicates";

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Value,
    user_type: Option<String>,
}

pub async fn audit(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    for (table, columns) in RELATIONS {
        let name = format!("Table {} exists", table);
        probe_relation(ctx, rec, CATEGORY, &name, table, columns).await?;
    }

    probe_relation(ctx, rec, CATEGORY, "Wallet columns complete", "wallet", WALLET_COLUMNS).await?;
    probe_relation(
        ctx,
        rec,
        CATEGORY,
        "Candidate stats columns complete",
        "candidate_stats",
        CANDIDATE_STATS_COLUMNS,
    )
    .await?;

    check_wallet_duplicates(ctx, rec).await?;
    check_profile_types(ctx, rec).await
}

/// Interpret the duplicates procedure result: a count, or a list of offenders.
fn duplicates_from_rpc(value: &Value) -> Option<usize> {
    match value {
        Value::Null => Some(0),
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => map.get("duplicates").and_then(duplicates_from_rpc),
        _ => None,
    }
}

async fn count_duplicates_manually(ctx: &AuditContext<'_>) -> Result<usize> {
    let query = Query::table("wallet").select("user_id").order("user_id", true);
    let rows = ctx.store.select_all(&query).await?;
    let mut seen = HashSet::new();
    let duplicates = rows
        .iter()
        .map(|row| row.get("user_id").map(display_value).unwrap_or_default())
        .filter(|id| !seen.insert(id.clone()))
        .count();
    Ok(duplicates)
}

async fn check_wallet_duplicates(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let from_rpc = match ctx.store.rpc(DUPLICATES_PROCEDURE, &json!({})).await {
        Ok(value) => duplicates_from_rpc(&value),
        Err(e) => {
            log::debug!("[Audit] {} unavailable ({}), counting manually", DUPLICATES_PROCEDURE, e);
            None
        }
    };
    let duplicates = match from_rpc {
        Some(n) => n,
        None => count_duplicates_manually(ctx).await?,
    };

    let details = if duplicates == 0 {
        String::new()
    } else {
        format!("{} duplicate wallet(s) detected", duplicates)
    };
    rec.record(CATEGORY, "One wallet per user", duplicates == 0, details);
    Ok(())
}

async fn check_profile_types(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let query = Query::table("profiles")
        .select("id, user_type")
        .order("id", true)
        .limit(ctx.sample_limit);
    let profiles: Vec<ProfileRow> = decode_rows(ctx.store.select(&query).await?)?;

    if profiles.is_empty() {
        rec.record(CATEGORY, "Profiles have user_type", true, "no profiles to check");
        return Ok(());
    }

    for profile in profiles {
        let id = display_value(&profile.id);
        let present = profile
            .user_type
            .as_deref()
            .map_or(false, |t| !t.trim().is_empty());
        let details = if present {
            String::new()
        } else {
            format!("profile {} has no user_type", id)
        };
        rec.record(CATEGORY, format!("Profile {} has user_type", id), present, details);
    }
    Ok(())
}
