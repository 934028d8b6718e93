//! Shared harness for the spec tests.

use ralph_adapters::FakeRunner;
use ralph_core::{FakeClock, LoopEvent, Observer};
use ralph_engine::{CircuitBreaker, ControllerConfig, LoopController, RateLimiter};
use ralph_storage::StateStore;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Limits and thresholds for a scenario.
pub struct Scenario {
    pub max_loops: u64,
    pub max_calls: u32,
    pub window_hours: i64,
    pub no_progress_threshold: u32,
    pub same_error_threshold: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            max_loops: 5,
            max_calls: 100,
            window_hours: 1,
            no_progress_threshold: 3,
            same_error_threshold: 5,
        }
    }
}

pub struct Project {
    pub dir: TempDir,
    pub runner: FakeRunner,
    pub events: Arc<Mutex<Vec<LoopEvent>>>,
    pub controller: LoopController<FakeRunner, FakeClock>,
}

/// A fix-mode project: `PROMPT.md` plus `@fix_plan.md` with the given body.
pub fn fix_project(plan: &str, scenario: Scenario) -> Project {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("PROMPT.md"), "resolve the open issues").unwrap();
    fs::write(dir.path().join("@fix_plan.md"), plan).unwrap();
    project_in(dir, scenario)
}

fn project_in(dir: TempDir, scenario: Scenario) -> Project {
    let store = StateStore::new(dir.path());
    let clock = FakeClock::new();
    let limiter = RateLimiter::load(
        store.clone(),
        clock.clone(),
        scenario.max_calls,
        scenario.window_hours,
    )
    .unwrap();
    let breaker = CircuitBreaker::load(
        store.clone(),
        clock,
        scenario.no_progress_threshold,
        scenario.same_error_threshold,
    )
    .unwrap();

    let runner = FakeRunner::new();
    let events: Arc<Mutex<Vec<LoopEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let observer: Observer = Arc::new(move |event| sink.lock().unwrap().push(event));

    let controller = LoopController::new(
        ControllerConfig {
            project_dir: dir.path().to_path_buf(),
            max_loops: scenario.max_loops,
            auto_sync: false,
        },
        runner.clone(),
        limiter,
        breaker,
        store,
        observer,
    );

    Project {
        dir,
        runner,
        events,
        controller,
    }
}

impl Project {
    pub fn plan_path(&self) -> std::path::PathBuf {
        self.dir.path().join("@fix_plan.md")
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.dir.path())
    }

    /// The last skip reason a preflight reported, if any.
    pub fn last_skip_reason(&self) -> Option<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|e| match e {
                LoopEvent::Preflight { summary } if summary.should_skip => {
                    summary.skip_reason.clone()
                }
                _ => None,
            })
    }
}

/// Write a plan file in place (what the agent does when it ticks a box).
pub fn rewrite_plan(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}

/// A status block the fake agent embeds in its response.
pub fn status_block(fields: &str) -> String {
    format!("---RALPH_STATUS---\n{fields}\n---END_RALPH_STATUS---")
}
