//! Shared fixtures: a fully compliant snapshot and frontend source tree.

#![allow(dead_code)]

use jobboard_audit::store::memory::Snapshot;
use jobboard_audit::{AuditContext, AuditRun, Auditor, MemoryStore};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const WALLET_IDS: [&str; 5] = ["u1", "u2", "u3", "u4", "u5"];

fn wallet_logs() -> Vec<Value> {
    WALLET_IDS
        .iter()
        .flat_map(|user| {
            vec![
                json!({
                    "id": format!("{}-credit", user),
                    "user_id": user,
                    "action_type": "credit_purchase",
                    "amount": 100,
                    "balance_before": 0,
                    "balance_after": 100,
                    "status": "success",
                    "created_at": "2026-01-01T09:00:00Z"
                }),
                json!({
                    "id": format!("{}-ai", user),
                    "user_id": user,
                    "action_type": "ai_service",
                    "amount": 10,
                    "balance_before": 100,
                    "balance_after": 90,
                    "status": "success",
                    "created_at": "2026-01-02T09:00:00Z"
                }),
            ]
        })
        .collect()
}

/// Snapshot document in which every check passes.
pub fn healthy_snapshot() -> Value {
    let profiles: Vec<Value> = (1..=10)
        .map(|i| {
            json!({
                "id": format!("p{:02}", i),
                "user_type": if i % 3 == 0 { "recruiter" } else { "candidate" }
            })
        })
        .collect();

    let wallets: Vec<Value> = WALLET_IDS
        .iter()
        .map(|user| {
            json!({
                "user_id": user,
                "balance": 90,
                "reserved_balance": 0,
                "last_transaction_at": "2026-01-02T09:00:00Z",
                "created_at": "2025-12-31T09:00:00Z",
                "updated_at": "2026-01-02T09:00:00Z"
            })
        })
        .collect();

    json!({
        "tables": {
            "profiles": profiles,
            "wallet": wallets,
            "wallet_logs": wallet_logs(),
            "candidate_stats": [
                {
                    "candidate_id": "c1", "profile_views": 2, "cv_downloads": 1, "cv_views": 4,
                    "contact_requests": 0, "ai_score": 82, "ai_score_version": "v2",
                    "ai_score_breakdown": {"experience": 40, "education": 42},
                    "ai_score_last_updated": "2026-01-03T09:00:00Z"
                },
                {
                    "candidate_id": "c2", "profile_views": 0, "cv_downloads": 0, "cv_views": 0,
                    "contact_requests": 0, "ai_score": null, "ai_score_version": null,
                    "ai_score_breakdown": null, "ai_score_last_updated": null
                }
            ],
            "candidate_stats_logs": [
                {"id": 1, "candidate_id": "c1", "stat_type": "profile_views", "old_value": 0, "new_value": 1, "created_at": "2026-01-01T10:00:00Z"},
                {"id": 2, "candidate_id": "c1", "stat_type": "profile_views", "old_value": 1, "new_value": 2, "created_at": "2026-01-02T10:00:00Z"},
                {"id": 3, "candidate_id": "c1", "stat_type": "cv_downloads", "old_value": 0, "new_value": 1, "created_at": "2026-01-02T11:00:00Z"}
            ],
            "ia_service_config": [
                {"service_code": "cv_profile_scoring", "service_name": "CV profile scoring", "is_active": true},
                {"service_code": "cv_semantic_search", "service_name": "CV semantic search", "is_active": true}
            ],
            "service_credit_costs": [
                {"service_code": "cv_profile_scoring", "credits_cost": 10},
                {"service_code": "cv_semantic_search", "credits_cost": 5}
            ],
            "ia_service_quotas": [
                {"service_code": "cv_profile_scoring", "user_type": "recruiter"},
                {"service_code": "cv_semantic_search", "user_type": "recruiter"}
            ]
        },
        "columns": {
            "ai_service_usage_history": ["id", "user_id", "service_key", "credits_consumed"],
            "v_ia_service_stats": ["service_code", "total_uses"]
        },
        "procedures": {
            "check_wallet_duplicates": 0,
            "increment_profile_view": null,
            "track_cv_download": null,
            "use_ai_credits": null,
            "check_and_deduct_credits": null
        }
    })
}

pub fn healthy_store() -> MemoryStore {
    let snapshot: Snapshot =
        serde_json::from_value(healthy_snapshot()).expect("fixture snapshot is valid");
    MemoryStore::from_snapshot(snapshot)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(path, content).expect("write fixture file");
}

/// Frontend tree with a service layer going through every backend RPC.
pub fn healthy_source_tree() -> TempDir {
    let tmp = TempDir::new().expect("create temp dir");
    let root = tmp.path().join("src");
    write(
        &root,
        "services/statsService.ts",
        "export const recordView = (id: string) => supabase.rpc('increment_profile_view', { id });\n\
         export const recordDownload = (id: string) => supabase.rpc('track_cv_download', { id });\n",
    );
    write(
        &root,
        "services/aiService.ts",
        "export const scoreProfile = (id: string) => supabase.rpc('use_ai_credits', { id });\n",
    );
    write(
        &root,
        "pages/CandidateProfile.tsx",
        "export default function CandidateProfile() { return null; }\n",
    );
    tmp
}

/// Source root inside a tree created by `healthy_source_tree`.
pub fn source_root(tree: &TempDir) -> std::path::PathBuf {
    tree.path().join("src")
}

/// Run every category and capture stdout.
pub async fn run_audit(store: &MemoryStore, root: &Path) -> (AuditRun, String) {
    let auditor = Auditor::new(AuditContext::new(store, root));
    let mut out = Vec::new();
    let run = auditor.run(&mut out).await;
    (run, String::from_utf8(out).expect("audit output is UTF-8"))
}
