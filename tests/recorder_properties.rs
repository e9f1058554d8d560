//! Property tests for the recorder and report totals.

use jobboard_audit::audit::report;
use jobboard_audit::{AuditRun, Category, Recorder};
use proptest::prelude::*;

fn category() -> impl Strategy<Value = Category> {
    (0..Category::ALL.len()).prop_map(|i| Category::ALL[i])
}

proptest! {
    #[test]
    fn counters_match_outcomes_after_every_record(
        records in prop::collection::vec((category(), any::<bool>(), "[a-z ]{0,12}"), 0..64)
    ) {
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        let mut rec = Recorder::new(&mut run, &mut out);

        for (i, (category, passed, details)) in records.iter().enumerate() {
            rec.record(*category, format!("check {}", i), *passed, details.clone());
            for (_, result) in rec.run().categories.iter() {
                prop_assert_eq!(result.tests().len(), result.passed() + result.failed());
            }
        }
    }

    #[test]
    fn overall_is_sum_over_categories(
        records in prop::collection::vec((category(), any::<bool>()), 0..64)
    ) {
        let mut run = AuditRun::new();
        let mut out = Vec::new();
        {
            let mut rec = Recorder::new(&mut run, &mut out);
            for (category, passed) in &records {
                rec.record(*category, "check", *passed, "");
            }
        }
        let overall = report::finalize(&mut run);

        let expected_passed = records.iter().filter(|(_, p)| *p).count();
        prop_assert_eq!(overall.passed, expected_passed);
        prop_assert_eq!(overall.total(), records.len());
        prop_assert_eq!(overall.score.is_none(), records.is_empty());
        if let Some(score) = overall.score {
            prop_assert!(score <= 100);
        }
        prop_assert_eq!(overall.exit_code() == 0, overall.failed == 0);
    }
}

#[test]
fn empty_run_has_no_score() {
    let mut run = AuditRun::new();
    let overall = report::finalize(&mut run);
    assert_eq!(overall.total(), 0);
    assert_eq!(overall.score, None);
    assert_eq!(overall.exit_code(), 0);
}
