//! Simulated loaders behind `loadsync demo` and `loadsync stress`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use eyre::{Result, eyre};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::affinity::AffinitySender;
use crate::config::DemoConfig;
use crate::domain::TaskId;
use crate::error::LoadError;
use crate::library::Library;
use crate::loader::{FinishReport, ItemsLoader, LoadContext, LoadOutcome, Loader};
use crate::sync::HookAttach;

/// What a simulated loader will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlan {
    pub items: usize,
    pub item_delay: Duration,
    /// Commit after this many items; 0 never commits early
    pub commit_every: usize,
    /// Fail in `do_before`
    pub fail_before: bool,
    /// Fail in `do_loading` once this many items were produced
    pub fail_at: Option<usize>,
}

/// What the affinity thread saw for one loader
#[derive(Debug, Clone, Default)]
struct Observed {
    committed: usize,
    finished: Option<(LoadOutcome, usize)>,
    on_affinity_thread: bool,
}

/// Loader that produces numbered items with a fixed delay
pub struct SimulatedLoader {
    plan: LoadPlan,
    affinity: AffinitySender,
    observed: Mutex<Observed>,
}

impl SimulatedLoader {
    pub fn new(plan: LoadPlan, affinity: AffinitySender) -> Self {
        Self {
            plan,
            affinity,
            observed: Mutex::new(Observed::default()),
        }
    }

    fn observed(&self) -> std::sync::MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Loader for SimulatedLoader {
    type Item = String;

    fn do_before(&self, ctx: &LoadContext<Self>) -> Result<(), LoadError> {
        if self.plan.fail_before {
            return Err(LoadError::msg(format!("{}: catalog unavailable", ctx.task_id())));
        }
        Ok(())
    }

    fn do_loading(&self, ctx: &LoadContext<Self>) -> Result<(), LoadError> {
        for n in 0..self.plan.items {
            if ctx.is_interrupted() {
                debug!(task_id = %ctx.task_id(), produced = n, "SimulatedLoader: interrupted");
                return Ok(());
            }
            if self.plan.fail_at == Some(n) {
                return Err(LoadError::Parse(format!("malformed entry #{}", n)));
            }
            thread::sleep(self.plan.item_delay);
            ctx.add_item(format!("item-{}", n));
            if self.plan.commit_every > 0 && ctx.uncommitted_len() >= self.plan.commit_every {
                ctx.commit_items();
            }
        }
        Ok(())
    }

    fn on_commit(&self, items: Vec<String>) {
        self.observed().committed += items.len();
    }

    fn on_finish(&self, report: FinishReport<String>) {
        let on_affinity_thread = self.affinity.is_affinity_thread();
        let mut observed = self.observed();
        observed.finished = Some((report.outcome(), report.items.len()));
        observed.on_affinity_thread = on_affinity_thread;
    }
}

/// Result line for one demo loader
#[derive(Debug, Clone, Serialize)]
pub struct DemoRecord {
    pub task_id: TaskId,
    pub outcome: LoadOutcome,
    pub committed_items: usize,
    pub final_items: usize,
    pub on_affinity_thread: bool,
    pub hook_ran: bool,
}

/// Upper bound for a random interrupt delay: the time a loader needs for all its items
fn interrupt_window_ms(config: &DemoConfig) -> u64 {
    config.item_delay_ms.saturating_mul(config.items_per_loader as u64)
}

/// Run `config.loaders` simulated loaders concurrently and collect what happened
pub fn run_demo(config: &DemoConfig, library: &Library, affinity: &AffinitySender) -> Result<Vec<DemoRecord>> {
    info!(loaders = config.loaders, "run_demo: starting");
    let mut rng = rand::rng();
    let mut running = Vec::with_capacity(config.loaders);

    for i in 0..config.loaders {
        // A failing loader fails either up front or part way through its items
        let (fail_before, fail_at) = if rng.random_bool(config.failure_rate) {
            if config.items_per_loader == 0 || rng.random_bool(0.5) {
                (true, None)
            } else {
                (false, Some(rng.random_range(0..config.items_per_loader)))
            }
        } else {
            (false, None)
        };
        let plan = LoadPlan {
            items: config.items_per_loader,
            item_delay: Duration::from_millis(config.item_delay_ms),
            commit_every: config.commit_every,
            fail_before,
            fail_at,
        };

        let task_id = TaskId::generate("demo", &format!("loader {}", i));
        let loader = Arc::new(SimulatedLoader::new(plan, affinity.clone()));
        let items_loader = ItemsLoader::from_arc(library, task_id.clone(), loader.clone());

        let hook_ran = Arc::new(AtomicBool::new(false));
        let flag = hook_ran.clone();
        items_loader.set_post_runnable(move || flag.store(true, Ordering::SeqCst));

        if rng.random_bool(config.interrupt_rate) {
            let delay = Duration::from_millis(rng.random_range(0..=interrupt_window_ms(config)));
            let handle = items_loader.handle();
            thread::spawn(move || {
                thread::sleep(delay);
                handle.interrupt();
            });
        }

        let join = thread::Builder::new()
            .name(format!("loadsync-worker-{}", task_id))
            .spawn(move || items_loader.run())?;
        running.push((task_id, loader, hook_ran, join));
    }

    let mut records = Vec::with_capacity(running.len());
    for (task_id, loader, hook_ran, join) in running {
        let outcome = join.join().map_err(|_| eyre!("worker for {} panicked", task_id))?;
        let observed = loader.observed().clone();
        let final_items = observed.finished.as_ref().map(|(_, n)| *n).unwrap_or(0);
        records.push(DemoRecord {
            task_id,
            outcome,
            committed_items: observed.committed,
            final_items,
            on_affinity_thread: observed.on_affinity_thread,
            hook_ran: hook_ran.load(Ordering::SeqCst),
        });
    }
    Ok(records)
}

/// Loader that does nothing but take a little time
struct QuickLoader {
    work: Duration,
}

impl Loader for QuickLoader {
    type Item = ();

    fn do_loading(&self, _ctx: &LoadContext<Self>) -> Result<(), LoadError> {
        thread::sleep(self.work);
        Ok(())
    }

    fn on_finish(&self, _report: FinishReport<()>) {}
}

/// Totals from [`run_stress`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StressReport {
    pub tasks: usize,
    /// First hooks that were stored and later run by the worker
    pub stored: usize,
    /// First hooks that arrived after finish and ran on the attaching thread
    pub ran_immediately: usize,
    /// First hooks that never ran
    pub lost: usize,
    /// First hooks that ran more than once
    pub duplicated: usize,
    /// Second hooks that ran although the first was stored, or did not run
    /// although the first ran immediately
    pub second_hook_errors: usize,
}

impl StressReport {
    /// True when every first hook ran exactly once and every second hook
    /// followed its first
    pub fn is_clean(&self) -> bool {
        self.lost == 0 && self.duplicated == 0 && self.second_hook_errors == 0
    }
}

/// Race hook attachment against loader completion `tasks * rounds` times
///
/// Each round starts `tasks` loaders at once; for each, a separate thread
/// attaches a counting hook after a random delay, then a second hook. The
/// second must be ignored when the first was stored, and must run when the
/// first found the loader already finished.
pub fn run_stress(library: &Library, tasks: usize, rounds: usize) -> Result<StressReport> {
    info!(tasks, rounds, "run_stress: starting");
    let mut report = StressReport::default();
    let mut rng = rand::rng();

    for round in 0..rounds {
        let mut pending = Vec::with_capacity(tasks);
        for i in 0..tasks {
            let work = Duration::from_micros(rng.random_range(0..200));
            let attach_delay = Duration::from_micros(rng.random_range(0..300));
            let task_id = TaskId::from(format!("stress-{}-{}", round, i));
            let (handle, worker) = library.spawn(task_id, QuickLoader { work })?;

            let first = Arc::new(AtomicUsize::new(0));
            let second = Arc::new(AtomicUsize::new(0));
            let (first_hook, second_hook) = (first.clone(), second.clone());
            let attacher = thread::spawn(move || {
                thread::sleep(attach_delay);
                let attach = handle.set_post_runnable(move || {
                    first_hook.fetch_add(1, Ordering::SeqCst);
                });
                handle.set_post_runnable(move || {
                    second_hook.fetch_add(1, Ordering::SeqCst);
                });
                attach
            });
            pending.push((worker, attacher, first, second));
        }

        for (worker, attacher, first, second) in pending {
            worker.join().map_err(|_| eyre!("stress worker panicked"))?;
            let attach = attacher.join().map_err(|_| eyre!("stress attacher panicked"))?;
            report.tasks += 1;
            let expected_second = match attach {
                HookAttach::Stored => {
                    report.stored += 1;
                    0
                }
                HookAttach::RanImmediately => {
                    report.ran_immediately += 1;
                    1
                }
                HookAttach::Ignored => 0,
            };
            match first.load(Ordering::SeqCst) {
                0 => report.lost += 1,
                1 => {}
                _ => report.duplicated += 1,
            }
            if second.load(Ordering::SeqCst) != expected_second {
                report.second_hook_errors += 1;
            }
        }
    }

    info!(?report, "run_stress: done");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::AffinityLoop;
    use crate::events::EventBus;

    fn setup() -> (AffinityLoop, Library) {
        let affinity = AffinityLoop::spawn("demo-test-affinity").unwrap();
        let library = Library::in_memory(Arc::new(EventBus::new(64)), Arc::new(affinity.dispatcher()));
        (affinity, library)
    }

    #[test]
    fn test_demo_clean_run() {
        let (affinity, library) = setup();
        let config = DemoConfig {
            loaders: 4,
            items_per_loader: 6,
            item_delay_ms: 0,
            commit_every: 4,
            failure_rate: 0.0,
            interrupt_rate: 0.0,
        };

        let records = run_demo(&config, &library, &affinity.dispatcher()).unwrap();
        affinity.shutdown().unwrap();

        assert_eq!(records.len(), 4);
        for record in records {
            assert_eq!(record.outcome, LoadOutcome::Success);
            assert_eq!(record.committed_items, 4);
            assert_eq!(record.final_items, 2);
            assert!(record.on_affinity_thread);
            assert!(record.hook_ran);
        }
        assert!(library.registry().is_empty());
    }

    #[test]
    fn test_interrupt_window_saturates() {
        let mut config = DemoConfig {
            item_delay_ms: 5,
            items_per_loader: 20,
            ..DemoConfig::default()
        };
        assert_eq!(interrupt_window_ms(&config), 100);

        config.item_delay_ms = u64::MAX;
        assert_eq!(interrupt_window_ms(&config), u64::MAX);
    }

    #[test]
    fn test_demo_all_fail() {
        let (affinity, library) = setup();
        let config = DemoConfig {
            loaders: 3,
            items_per_loader: 0,
            item_delay_ms: 0,
            commit_every: 0,
            failure_rate: 1.0,
            interrupt_rate: 0.0,
        };

        let records = run_demo(&config, &library, &affinity.dispatcher()).unwrap();
        affinity.shutdown().unwrap();

        for record in records {
            let message = record.outcome.error_message().unwrap();
            assert!(message.ends_with("catalog unavailable"));
            assert!(record.hook_ran);
        }
    }

    #[test]
    fn test_stress_small_is_clean() {
        let (affinity, library) = setup();
        let report = run_stress(&library, 8, 3).unwrap();
        affinity.shutdown().unwrap();

        assert_eq!(report.tasks, 24);
        assert_eq!(report.stored + report.ran_immediately, 24);
        assert!(report.is_clean(), "{:?}", report);
    }
}
