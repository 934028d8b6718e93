//! End-to-end loop scenarios.

use crate::prelude::*;
use ralph_core::{CircuitState, LoopEvent};
use ralph_storage::StateStore;
use tokio_util::sync::CancellationToken;

// A fully checked plan skips before the runner is ever consulted.
#[tokio::test]
async fn all_done_short_circuit() {
    let mut project = fix_project(
        "- [x] A\n- [x] B",
        Scenario {
            max_loops: 5,
            ..Scenario::default()
        },
    );

    project.controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        project.last_skip_reason().as_deref(),
        Some("All tasks complete")
    );
    assert_eq!(project.runner.call_count(), 0);
    assert_eq!(project.controller.loop_num(), 0);
}

// One productive iteration updates counters and leaves one task.
#[tokio::test]
async fn single_productive_iteration() {
    let mut project = fix_project(
        "- [ ] A\n- [ ] B",
        Scenario {
            max_loops: 1,
            ..Scenario::default()
        },
    );

    let plan = project.plan_path();
    let response = format!(
        "working on A\n{}",
        status_block(
            "STATUS: WORKING\nCURRENT_TASK: A\nTASKS_COMPLETED_THIS_LOOP: 1\n\
             FILES_MODIFIED: 2\nTESTS_STATUS: PASSING\nEXIT_SIGNAL: false"
        )
    );
    project.runner.queue(
        ralph_adapters::FakeRun::success(response)
            .with_side_effect(move || rewrite_plan(&plan, "- [x] A\n- [ ] B")),
    );

    project.controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(project.controller.loop_num(), 1);
    assert_eq!(project.controller.breaker().no_progress_count(), 0);
    assert_eq!(project.store().load_call_count().unwrap(), 1);

    let summary = project.controller.preflight().unwrap();
    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.remaining_count, 1);
}

// An exit signal stops the loop and leaves an audit tag.
#[tokio::test]
async fn exit_signal_honored() {
    let mut project = fix_project("- [ ] A", Scenario::default());
    project.runner.queue_success(format!(
        "all wrapped up\n{}",
        status_block("STATUS: COMPLETE\nEXIT_SIGNAL: true")
    ));

    project.controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        project.store().load_exit_signals().unwrap(),
        vec!["loop_1".to_string()]
    );
    assert_eq!(project.runner.call_count(), 1);
    let complete = project.events.lock().unwrap().iter().any(|e| {
        matches!(e, LoopEvent::Outcome { success: true, message, .. } if message == "complete")
    });
    assert!(complete);
}

// Ten identical errors walk the breaker from closed through half-open
// to open, and the next preflight refuses to run.
#[tokio::test(start_paused = true)]
async fn breaker_opens_on_repeated_errors() {
    let mut project = fix_project(
        "- [ ] A",
        Scenario {
            max_loops: 50,
            no_progress_threshold: 3,
            same_error_threshold: 5,
            ..Scenario::default()
        },
    );
    for _ in 0..10 {
        project.runner.queue_failure("connection refused");
    }

    let result = project.controller.run(&CancellationToken::new()).await;
    assert!(matches!(result, Err(ralph_engine::LoopError::BreakerOpen)));

    assert_eq!(project.runner.call_count(), 10);
    assert_eq!(project.controller.breaker().state(), CircuitState::Open);
    assert_eq!(
        project.last_skip_reason().as_deref(),
        Some("Circuit breaker is OPEN")
    );
}

// The third iteration is gated by the rate limit, not the runner.
#[tokio::test]
async fn rate_limit_exhausted() {
    let mut project = fix_project(
        "- [ ] A\n- [ ] B\n- [ ] C",
        Scenario {
            max_loops: 10,
            max_calls: 2,
            window_hours: 1,
            ..Scenario::default()
        },
    );
    for _ in 0..3 {
        project.runner.queue_success(format!(
            "progressing\n{}",
            status_block("STATUS: WORKING\nFILES_MODIFIED: 1")
        ));
    }

    project.controller.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(project.runner.call_count(), 2);
    assert_eq!(project.store().load_call_count().unwrap(), 2);
    assert_eq!(
        project.last_skip_reason().as_deref(),
        Some("Rate limit reached")
    );
}

// Preflight order: a missing plan wins over every other skip reason.
#[tokio::test]
async fn missing_plan_is_the_first_skip_reason() {
    let mut project = fix_project("- [ ] A", Scenario::default());
    std::fs::remove_file(project.plan_path()).unwrap();
    std::fs::remove_file(project.dir.path().join("PROMPT.md")).unwrap();

    project.controller.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(
        project.last_skip_reason().as_deref(),
        Some("No plan file found")
    );
    assert_eq!(project.runner.call_count(), 0);
}

// Restart resume: counters persist, so a relaunched supervisor continues
// from where the last one stopped.
#[tokio::test]
async fn relaunch_resumes_from_persisted_counters() {
    let scenario = || Scenario {
        max_loops: 10,
        max_calls: 2,
        ..Scenario::default()
    };

    let mut first = fix_project("- [ ] A\n- [ ] B", scenario());
    first.runner.queue_success(format!(
        "step one\n{}",
        status_block("STATUS: WORKING\nFILES_MODIFIED: 1")
    ));
    first.runner.queue_success(format!(
        "step two\n{}",
        status_block("STATUS: WORKING\nFILES_MODIFIED: 1")
    ));
    first.controller.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(first.store().load_call_count().unwrap(), 2);

    // Rebuild the engine over the same directory: the call budget is
    // already exhausted, so the relaunch skips immediately.
    let dir = first.dir;
    let store = StateStore::new(dir.path());
    let clock = ralph_core::FakeClock::new();
    let limiter =
        ralph_engine::RateLimiter::load(store.clone(), clock.clone(), 2, 1).unwrap();
    let breaker = ralph_engine::CircuitBreaker::load(store.clone(), clock, 3, 5).unwrap();
    let runner = ralph_adapters::FakeRunner::new();
    let observer: ralph_core::Observer = std::sync::Arc::new(|_| {});
    let mut controller = ralph_engine::LoopController::new(
        ralph_engine::ControllerConfig {
            project_dir: dir.path().to_path_buf(),
            max_loops: 10,
            auto_sync: false,
        },
        runner.clone(),
        limiter,
        breaker,
        store,
        observer,
    );

    controller.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(runner.call_count(), 0);
}
