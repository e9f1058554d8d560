//! Wallet audit: deduction procedure, log statuses, balances vs. ledger.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::{approx_eq, format_amount, probe_procedure, signed_amount, AuditContext, Recorder};
use crate::error::Result;
use crate::models::Category;
use crate::store::{decode_rows, display_value, Query};

const CATEGORY: Category = Category::Wallet;

const VALID_STATUSES: [&str; 3] = ["success", "blocked", "insufficient_credits"];

/// Logs with these statuses were refused and never moved credits.
const REFUSED_STATUSES: [&str; 2] = ["blocked", "insufficient_credits"];

#[derive(Debug, Deserialize)]
struct WalletBalance {
    user_id: Value,
    balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Reservation {
    user_id: Value,
    balance: Option<f64>,
    reserved_balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LedgerEntry {
    user_id: Value,
    action_type: Option<String>,
    amount: Option<f64>,
    #[serde(default)]
    status: Option<String>,
}

impl LedgerEntry {
    fn effect(&self) -> f64 {
        let refused = self
            .status
            .as_deref()
            .map_or(false, |s| REFUSED_STATUSES.contains(&s));
        match (refused, self.amount) {
            (false, Some(amount)) => {
                signed_amount(self.action_type.as_deref().unwrap_or_default(), amount)
            }
            _ => 0.0,
        }
    }
}

pub async fn audit(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    probe_procedure(ctx, rec, CATEGORY, "check_and_deduct_credits").await?;
    check_log_statuses(ctx, rec).await?;
    check_balance_matches_last_log(ctx, rec).await?;
    check_reservations(ctx, rec).await?;
    reconcile_ledger(ctx, rec).await
}

async fn check_log_statuses(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "Wallet logs have a valid status";

    let query = Query::table("wallet_logs")
        .select("id, status")
        .limit(ctx.sample_limit);
    let rows = match ctx.store.select(&query).await {
        Ok(rows) => rows,
        Err(e) if e.is_api() => {
            rec.record(CATEGORY, NAME, true, "status column optional");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if rows.is_empty() {
        rec.record(CATEGORY, NAME, true, "no logs");
        return Ok(());
    }

    let invalid: Vec<String> = rows
        .iter()
        .filter(|row| {
            !row.get("status")
                .and_then(Value::as_str)
                .map_or(false, |s| VALID_STATUSES.contains(&s))
        })
        .map(|row| row.get("id").map(display_value).unwrap_or_default())
        .collect();
    let details = if invalid.is_empty() {
        String::new()
    } else {
        format!("invalid status on log(s): {}", invalid.join(", "))
    };
    rec.record(CATEGORY, NAME, invalid.is_empty(), details);
    Ok(())
}

async fn check_balance_matches_last_log(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "Wallet balance equals latest log";

    let query = Query::table("wallet")
        .select("user_id, balance")
        .not_null("last_transaction_at")
        .limit(5);
    let wallets: Vec<WalletBalance> = decode_rows(ctx.store.select(&query).await?)?;
    if wallets.is_empty() {
        rec.record(CATEGORY, NAME, true, "no wallets with transactions");
        return Ok(());
    }

    let mut mismatches = Vec::new();
    for wallet in &wallets {
        let last = ctx
            .store
            .select(
                &Query::table("wallet_logs")
                    .select("balance_after, created_at")
                    .eq("user_id", wallet.user_id.clone())
                    .order("created_at", false)
                    .limit(1),
            )
            .await?;
        let last_after = last
            .first()
            .and_then(|row| row.get("balance_after"))
            .and_then(Value::as_f64);
        if let (Some(after), Some(balance)) = (last_after, wallet.balance) {
            if !approx_eq(after, balance) {
                mismatches.push(format!(
                    "{} (balance {}, last log {})",
                    display_value(&wallet.user_id),
                    format_amount(balance),
                    format_amount(after)
                ));
            }
        }
    }

    let details = if mismatches.is_empty() {
        String::new()
    } else {
        mismatches.join("; ")
    };
    rec.record(CATEGORY, NAME, mismatches.is_empty(), details);
    Ok(())
}

async fn check_reservations(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    const NAME: &str = "Reservations never exceed balance";

    let query = Query::table("wallet")
        .select("user_id, balance, reserved_balance")
        .gt("reserved_balance", 0)
        .limit(5);
    let rows = match ctx.store.select(&query).await {
        Ok(rows) => rows,
        Err(e) if e.is_api() => {
            rec.record(CATEGORY, NAME, true, "reserved_balance column optional");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let reservations: Vec<Reservation> = decode_rows(rows)?;
    if reservations.is_empty() {
        rec.record(CATEGORY, NAME, true, "no active reservations");
        return Ok(());
    }

    let over: Vec<String> = reservations
        .iter()
        .filter(|r| match (r.reserved_balance, r.balance) {
            (Some(reserved), Some(balance)) => reserved > balance,
            (Some(_), None) => true,
            _ => false,
        })
        .map(|r| display_value(&r.user_id))
        .collect();
    let details = if over.is_empty() {
        String::new()
    } else {
        format!("reservation above balance for: {}", over.join(", "))
    };
    rec.record(CATEGORY, NAME, over.is_empty(), details);
    Ok(())
}

/// Every sampled wallet's balance must equal the signed sum of its ledger.
async fn reconcile_ledger(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let query = Query::table("wallet")
        .select("user_id, balance")
        .order("user_id", true)
        .limit(ctx.sample_limit);
    let wallets: Vec<WalletBalance> = decode_rows(ctx.store.select(&query).await?)?;
    if wallets.is_empty() {
        rec.record(CATEGORY, "Wallet ledger reconciliation", true, "no wallets to check");
        return Ok(());
    }

    let ids: Vec<Value> = wallets.iter().map(|w| w.user_id.clone()).collect();
    let entries: Vec<LedgerEntry> = decode_rows(
        ctx.store
            .select_all(&Query::table("wallet_logs").in_("user_id", ids).order("id", true))
            .await?,
    )?;

    let mut sums: HashMap<String, f64> = HashMap::new();
    for entry in &entries {
        *sums.entry(display_value(&entry.user_id)).or_insert(0.0) += entry.effect();
    }

    for wallet in &wallets {
        let id = display_value(&wallet.user_id);
        let expected = sums.get(&id).copied().unwrap_or(0.0);
        let name = format!("Wallet {} reconciles with ledger", id);
        match wallet.balance {
            Some(actual) if approx_eq(actual, expected) => rec.pass(CATEGORY, name),
            Some(actual) => rec.fail(
                CATEGORY,
                name,
                format!(
                    "wallet {}: expected balance {}, actual {}",
                    id,
                    format_amount(expected),
                    format_amount(actual)
                ),
            ),
            None => rec.fail(
                CATEGORY,
                name,
                format!(
                    "wallet {}: expected balance {}, actual null",
                    id,
                    format_amount(expected)
                ),
            ),
        }
    }
    Ok(())
}
