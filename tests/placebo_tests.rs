// SPDX-License-Identifier: PMPL-1.0-or-later

//! Placebo orchestration against deterministic fake engines

mod common;

use common::{inputs, BrokenModelEngine, FailOnceEngine, FakeEngine};
use syg_rtc_placebo::error::{InferenceError, InputError, PlaceboError};
use syg_rtc_placebo::inference::infer;
use syg_rtc_placebo::placebo::{
    observe, read_checkpoint, run_placebo, CancelFlag, FailurePolicy, PlaceboConfig,
    OBSERVED_ITERATION,
};
use syg_rtc_placebo::report::observed_digest;
use syg_rtc_placebo::types::TableId;
use tempfile::TempDir;

fn config(iterations: u32, seed: u64) -> PlaceboConfig {
    PlaceboConfig {
        iterations,
        seed,
        policy: FailurePolicy::Strict,
        threads: 2,
        checkpoint: None,
    }
}

#[test]
fn test_observe_is_idempotent() {
    let inputs = inputs();
    let first = observe(&inputs, &FakeEngine).expect("observed pass should fit");
    let second = observe(&inputs, &FakeEngine).expect("observed pass should fit");

    assert_eq!(first, second);
    assert_eq!(
        observed_digest(&first).expect("digest"),
        observed_digest(&second).expect("digest")
    );
    // 5 models x (syg, rtc) + 5 models x (syg, rtc, syg:rtc)
    assert_eq!(first.len(), 25);
    assert!(first.iter().all(|r| r.iteration == OBSERVED_ITERATION));
    assert!(first.iter().all(|r| r.coefficient != "poverty"));
}

#[test]
fn test_simulation_never_contains_observed_pass() {
    let inputs = inputs();
    let table = run_placebo(&inputs, &FakeEngine, &config(6, 7), &CancelFlag::new())
        .expect("placebo run should succeed");

    assert_eq!(table.requested, 6);
    assert_eq!(table.completed, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(table.effective_n(), 6);
    assert_eq!(table.records.len(), 6 * 25);
    assert!(table.records.iter().all(|r| r.iteration != OBSERVED_ITERATION));
    assert!(table.failures.is_empty());
    assert!(!table.cancelled);
}

#[test]
fn test_same_seed_reproducible_across_thread_counts() {
    let inputs = inputs();
    let mut single = config(8, 2024);
    single.threads = 1;
    let mut wide = config(8, 2024);
    wide.threads = 4;

    let a = run_placebo(&inputs, &FakeEngine, &single, &CancelFlag::new()).expect("run");
    let b = run_placebo(&inputs, &FakeEngine, &wide, &CancelFlag::new()).expect("run");
    assert_eq!(a.records, b.records);
    assert_eq!(a.completed, b.completed);
}

#[test]
fn test_different_seeds_give_different_draws() {
    let inputs = inputs();
    let a = run_placebo(&inputs, &FakeEngine, &config(5, 1), &CancelFlag::new()).expect("run");
    let b = run_placebo(&inputs, &FakeEngine, &config(5, 2), &CancelFlag::new()).expect("run");
    assert_ne!(a.records, b.records);
}

#[test]
fn test_strict_failure_aborts_with_iteration_and_spec() {
    let inputs = inputs();
    let engine = BrokenModelEngine {
        table: TableId::MainEffects,
        model: 3,
    };
    let err = run_placebo(&inputs, &engine, &config(4, 9), &CancelFlag::new())
        .expect_err("strict run should abort");

    match err {
        PlaceboError::Iteration { iteration, failure } => {
            assert!((1..=4).contains(&iteration));
            assert_eq!(failure.table, TableId::MainEffects);
            assert_eq!(failure.model, 3);
            assert_eq!(failure.outcome, "jh_police");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_lenient_drops_only_the_failed_iteration() {
    let inputs = inputs();
    let engine = FailOnceEngine::new(13);
    let mut cfg = config(5, 31);
    cfg.policy = FailurePolicy::Lenient;

    let table = run_placebo(&inputs, &engine, &cfg, &CancelFlag::new())
        .expect("lenient run should finish");

    assert_eq!(table.failures.len(), 1);
    assert_eq!(table.effective_n(), 4);
    assert_eq!(table.records.len(), 4 * 25);
    let failed = &table.failures[0];
    assert!(!table.completed.contains(&failed.iteration));
    assert!(failed.message.contains("iteration limit"));
    assert!(failed.table.is_some() && failed.model.is_some());
}

#[test]
fn test_lenient_all_failing_leaves_no_draws() {
    let inputs = inputs();
    let observed = observe(&inputs, &FakeEngine).expect("observed pass should fit");
    let engine = BrokenModelEngine {
        table: TableId::Interaction,
        model: 5,
    };
    let mut cfg = config(3, 5);
    cfg.policy = FailurePolicy::Lenient;

    let table = run_placebo(&inputs, &engine, &cfg, &CancelFlag::new()).expect("run");
    assert_eq!(table.effective_n(), 0);
    assert_eq!(table.failures.len(), 3);
    assert!(matches!(
        infer(&observed, &table),
        Err(InferenceError::NoDraws(_))
    ));
}

#[test]
fn test_zero_iterations_rejected() {
    let inputs = inputs();
    let err = run_placebo(&inputs, &FakeEngine, &config(0, 1), &CancelFlag::new())
        .expect_err("zero iterations should be rejected");
    assert!(matches!(err, PlaceboError::Input(InputError::ZeroIterations)));
}

#[test]
fn test_cancelled_run_returns_partial_table() {
    let inputs = inputs();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let table = run_placebo(&inputs, &FakeEngine, &config(4, 3), &cancel).expect("run");
    assert!(table.cancelled);
    assert_eq!(table.effective_n(), 0);
    assert!(table.records.is_empty());
}

#[test]
fn test_checkpoint_reload_matches_run() {
    let dir = TempDir::new().expect("tempdir should create");
    let path = dir.path().join("ckpt/run.jsonl");
    let inputs = inputs();
    let mut cfg = config(5, 77);
    cfg.checkpoint = Some(path.clone());

    let table = run_placebo(&inputs, &FakeEngine, &cfg, &CancelFlag::new()).expect("run");
    let reloaded = read_checkpoint(&path).expect("checkpoint should load");
    assert_eq!(reloaded.completed, table.completed);
    assert_eq!(reloaded.records, table.records);
}

#[test]
fn test_inference_over_full_run() {
    let inputs = inputs();
    let observed = observe(&inputs, &FakeEngine).expect("observed pass should fit");
    let table = run_placebo(&inputs, &FakeEngine, &config(20, 11), &CancelFlag::new())
        .expect("run");

    let rows = infer(&observed, &table).expect("inference should succeed");
    assert_eq!(rows.len(), observed.len());
    for (row, obs) in rows.iter().zip(&observed) {
        assert_eq!(row.coefficient, obs.coefficient);
        assert_eq!(row.draws, 20);
        assert!(row.below + row.above <= 20);
        assert!((0.0..=0.5).contains(&row.empirical_p_value));
        assert!(row.observed_significant);
    }
}
