//! AI services configuration audit.

use serde::Deserialize;
use std::collections::BTreeSet;

use super::{probe_relation, AuditContext, Recorder};
use crate::error::Result;
use crate::models::Category;
use crate::store::{decode_rows, Query};

const CATEGORY: Category = Category::Ia;

/// AI services sold in the CV library.
const CV_LIBRARY_SERVICES: [&str; 2] = ["cv_profile_scoring", "cv_semantic_search"];

#[derive(Debug, Deserialize)]
struct ServiceCost {
    service_code: String,
    credits_cost: Option<f64>,
}

pub async fn audit(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    probe_relation(
        ctx,
        rec,
        CATEGORY,
        "Table ia_service_config exists",
        "ia_service_config",
        "service_code, service_name, is_active",
    )
    .await?;

    check_services_configured(ctx, rec).await?;

    probe_relation(
        ctx,
        rec,
        CATEGORY,
        "Table ai_service_usage_history exists",
        "ai_service_usage_history",
        "id, user_id, service_key, credits_consumed",
    )
    .await?;

    check_service_costs(ctx, rec).await?;
    check_quotas(ctx, rec).await?;

    probe_relation(
        ctx,
        rec,
        CATEGORY,
        "AI analytics views exist",
        "v_ia_service_stats",
        "service_code, total_uses",
    )
    .await
}

async fn check_services_configured(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let rows = ctx
        .store
        .select(
            &Query::table("ia_service_config")
                .select("service_code")
                .in_("service_code", CV_LIBRARY_SERVICES),
        )
        .await?;
    let configured: BTreeSet<String> = rows
        .iter()
        .filter_map(|r| r.get("service_code").and_then(|v| v.as_str()).map(str::to_string))
        .collect();

    let complete = configured.len() == CV_LIBRARY_SERVICES.len();
    let details = if complete {
        String::new()
    } else {
        format!(
            "only {}/{} services found",
            configured.len(),
            CV_LIBRARY_SERVICES.len()
        )
    };
    rec.record(CATEGORY, "CV library AI services configured", complete, details);
    Ok(())
}

async fn check_service_costs(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let costs: Vec<ServiceCost> = decode_rows(
        ctx.store
            .select(
                &Query::table("service_credit_costs")
                    .select("service_code, credits_cost")
                    .in_("service_code", CV_LIBRARY_SERVICES),
            )
            .await?,
    )?;

    let unpriced: Vec<&str> = CV_LIBRARY_SERVICES
        .iter()
        .copied()
        .filter(|code| {
            !costs
                .iter()
                .any(|c| c.service_code == *code && c.credits_cost.map_or(false, |v| v > 0.0))
        })
        .collect();
    let details = if unpriced.is_empty() {
        String::new()
    } else {
        format!("no positive credit cost for: {}", unpriced.join(", "))
    };
    rec.record(CATEGORY, "AI service prices defined", unpriced.is_empty(), details);
    Ok(())
}

async fn check_quotas(ctx: &AuditContext<'_>, rec: &mut Recorder<'_>) -> Result<()> {
    let quotas = ctx
        .store
        .select(
            &Query::table("ia_service_quotas")
                .select("service_code, user_type")
                .in_("service_code", CV_LIBRARY_SERVICES),
        )
        .await?;

    if quotas.is_empty() {
        rec.fail(CATEGORY, "AI quotas configured", "no quota rows for CV library services");
    } else {
        rec.record(
            CATEGORY,
            "AI quotas configured",
            true,
            format!("{} quota(s) found", quotas.len()),
        );
    }
    Ok(())
}
