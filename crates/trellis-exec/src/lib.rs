//! Task executor: orchestration primitives over collections of
//! concurrently running operations. Four patterns are offered: race to
//! the first accepted result, wait for all, run sequentially, and
//! fire-and-forget. Partial failure is surfaced per task; one task's
//! failure never aborts unrelated work.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinSet;

use trellis_unit::{Module, Registry, value_is_truthy};

/// One in-flight operation: an optional name for diagnostics and the
/// future producing its result. Each task is consumed by exactly one
/// primitive call.
pub struct Task {
    name: Option<String>,
    fut: BoxFuture<'static, anyhow::Result<Value>>,
}

impl Task {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Task {
            name: None,
            fut: Box::pin(fut),
        }
    }

    pub fn named<F>(name: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Task {
            name: Some(name.into()),
            fut: Box::pin(fut),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Post-processing hook for the winning result of [`Executor::first_completed`];
/// receives the accepted value and the winning task's name.
pub type AcceptFn =
    Arc<dyn Fn(Value, Option<String>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Uniform `{state, result, error}` outcome shape.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl RunOutcome {
    fn accepted(result: Value) -> Self {
        RunOutcome {
            state: true,
            result: Some(result),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        RunOutcome {
            state: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Per-slot result of [`Executor::all_completed`], in task order.
#[derive(Debug, Clone, Serialize)]
pub enum TaskSlot {
    Done(Value),
    Failed(String),
}

impl TaskSlot {
    pub fn value(&self) -> Option<&Value> {
        match self {
            TaskSlot::Done(value) => Some(value),
            TaskSlot::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskSlot::Failed(_))
    }
}

/// Outcome of [`Executor::all_completed`]: `state` is false only when the
/// orchestration machinery itself fails, never for individual task
/// failures.
#[derive(Debug, Clone, Serialize)]
pub struct AllOutcome {
    pub state: bool,
    pub result: Vec<TaskSlot>,
}

/// Manager-level coordinator holding the registered providers and the
/// collaborator registry handle.
pub struct Executor {
    registry: Arc<Registry>,
    providers: Mutex<Vec<Arc<Module>>>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Executor {
            registry,
            providers: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn register_provider(&self, module: Arc<Module>) {
        self.providers.lock().unwrap().push(module);
    }

    pub fn providers(&self) -> Vec<Arc<Module>> {
        self.providers.lock().unwrap().clone()
    }

    /// Race: wait for completions and return the first *accepted* result,
    /// that is the first `Ok` value that is truthy, optionally transformed
    /// by `accept`. Failed or falsy completions are discarded and the wait
    /// continues; once a winner is accepted every still-pending operation
    /// is cancelled. An exhausted set is a structured failure, not a hang.
    pub async fn first_completed(&self, operations: Vec<Task>, accept: Option<AcceptFn>) -> RunOutcome {
        let mut set: JoinSet<(Option<String>, anyhow::Result<Value>)> = JoinSet::new();
        for op in operations {
            let name = op.name.clone();
            let fut = op.fut;
            set.spawn(async move { (name, fut.await) });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(value))) if value_is_truthy(&value) => {
                    let value = match &accept {
                        Some(transform) => match transform(value, name.clone()).await {
                            Ok(transformed) => transformed,
                            Err(err) => {
                                log::debug!("accept transform rejected a candidate: {err}");
                                continue;
                            }
                        },
                        None => value,
                    };
                    set.abort_all();
                    return RunOutcome::accepted(value);
                }
                Ok((name, Ok(_))) => {
                    log::debug!("operation {name:?} produced a falsy result; waiting on the rest");
                }
                Ok((name, Err(err))) => {
                    log::debug!("operation {name:?} failed: {err}; waiting on the rest");
                }
                Err(join_err) => {
                    log::debug!("operation panicked: {join_err}; waiting on the rest");
                }
            }
        }
        RunOutcome::failed("no operation produced an accepted result")
    }

    /// Gather: run every task concurrently to completion and collect
    /// results and captured failures in task order. One task failing (or
    /// panicking) never cancels its siblings.
    pub async fn all_completed(&self, tasks: Vec<Task>) -> AllOutcome {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let name = task.name;
                let fut = task.fut;
                tokio::spawn(async move { (name, fut.await) })
            })
            .collect();

        let mut result = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((_, Ok(value))) => result.push(TaskSlot::Done(value)),
                Ok((name, Err(err))) => {
                    log::warn!("task {name:?} failed: {err}");
                    result.push(TaskSlot::Failed(err.to_string()));
                }
                Err(join_err) => {
                    log::warn!("task panicked: {join_err}");
                    result.push(TaskSlot::Failed(join_err.to_string()));
                }
            }
        }
        AllOutcome { state: true, result }
    }

    /// Sequence: run tasks strictly one after another. A failing step is
    /// logged and contributes no entry; later steps still run.
    pub async fn chain_completed(&self, tasks: Vec<Task>) -> Vec<Value> {
        let mut results = Vec::new();
        for task in tasks {
            let name = task.name;
            match task.fut.await {
                Ok(value) => results.push(value),
                Err(err) => log::warn!("chained task {name:?} failed: {err}"),
            }
        }
        results
    }

    /// Fire-and-forget: schedule every task in the background and return
    /// immediately. No results are collected; completions and failures are
    /// only logged.
    pub fn together_completed(&self, tasks: Vec<Task>) -> RunOutcome {
        let count = tasks.len();
        for task in tasks {
            let name = task.name;
            tokio::spawn(async move {
                match task.fut.await {
                    Ok(_) => log::debug!("background task {name:?} completed"),
                    Err(err) => log::warn!("background task {name:?} failed: {err}"),
                }
            });
        }
        RunOutcome::accepted(json!(format!("{count} tasks launched")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;
    use trellis_unit::Namespace;

    fn executor() -> Executor {
        Executor::new(Arc::new(Registry::new()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn first_completed_takes_the_first_truthy_result() {
        let exec = executor();
        let slow_finished = Arc::new(AtomicBool::new(false));
        let ops = vec![
            Task::named("slow", {
                let flag = slow_finished.clone();
                async move {
                    sleep(Duration::from_millis(200)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(json!("late"))
                }
            }),
            Task::named("winner", async {
                sleep(Duration::from_millis(10)).await;
                Ok(json!({ "state": true, "token": "abc" }))
            }),
            Task::named("slower", {
                let flag = slow_finished.clone();
                async move {
                    sleep(Duration::from_millis(200)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(json!("later"))
                }
            }),
        ];

        let outcome = exec.first_completed(ops, None).await;
        assert!(outcome.state);
        assert_eq!(outcome.result.unwrap()["token"], json!("abc"));

        // Losers were cancelled, not left running to completion.
        sleep(Duration::from_millis(300)).await;
        assert!(!slow_finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn first_completed_skips_failures_and_falsy_results() {
        let exec = executor();
        let ops = vec![
            Task::named("fails", async { anyhow::bail!("no luck") }),
            Task::named("falsy", async { Ok(Value::Null) }),
            Task::named("accepted", async {
                sleep(Duration::from_millis(20)).await;
                Ok(json!("ok"))
            }),
        ];
        let outcome = exec.first_completed(ops, None).await;
        assert!(outcome.state);
        assert_eq!(outcome.result.unwrap(), json!("ok"));
    }

    #[tokio::test]
    async fn first_completed_exhaustion_is_a_structured_failure() {
        let exec = executor();
        let ops = vec![
            Task::new(async { anyhow::bail!("a") }),
            Task::new(async { Ok(json!(false)) }),
        ];
        let outcome = exec.first_completed(ops, None).await;
        assert!(!outcome.state);
        assert!(outcome.result.is_none());
        assert!(outcome.error.unwrap().contains("no operation"));
    }

    #[tokio::test]
    async fn first_completed_applies_the_accept_transform() {
        let exec = executor();
        let ops = vec![Task::named("profile-a", async { Ok(json!({ "token": "t" })) })];
        let accept: AcceptFn = Arc::new(|value, name| {
            Box::pin(async move {
                Ok(json!({ "value": value, "profile": name }))
            })
        });
        let outcome = exec.first_completed(ops, Some(accept)).await;
        let result = outcome.result.unwrap();
        assert_eq!(result["profile"], json!("profile-a"));
        assert_eq!(result["value"]["token"], json!("t"));
    }

    #[tokio::test]
    async fn all_completed_captures_failures_in_their_slot() {
        let exec = executor();
        let tasks = vec![
            Task::new(async { Ok(json!("r0")) }),
            Task::new(async { anyhow::bail!("task exploded") }),
            Task::new(async {
                sleep(Duration::from_millis(20)).await;
                Ok(json!("r2"))
            }),
        ];
        let outcome = exec.all_completed(tasks).await;
        assert!(outcome.state);
        assert_eq!(outcome.result.len(), 3);
        assert_eq!(outcome.result[0].value().unwrap(), &json!("r0"));
        assert!(outcome.result[1].is_failed());
        assert_eq!(outcome.result[2].value().unwrap(), &json!("r2"));
    }

    #[tokio::test]
    async fn chain_completed_runs_every_step_in_order() {
        let exec = executor();
        let order = Arc::new(Mutex::new(Vec::new()));
        let step = |label: &'static str, fail: bool, order: Arc<Mutex<Vec<&'static str>>>| {
            Task::named(label, async move {
                order.lock().unwrap().push(label);
                if fail {
                    anyhow::bail!("{label} failed");
                }
                Ok(json!(label))
            })
        };
        let tasks = vec![
            step("a", false, order.clone()),
            step("b", true, order.clone()),
            step("c", false, order.clone()),
        ];

        let results = exec.chain_completed(tasks).await;
        // B ran but contributed no entry.
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(results, vec![json!("a"), json!("c")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn together_completed_returns_before_tasks_finish() {
        let exec = executor();
        let done = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let done = done.clone();
                Task::new(async move {
                    sleep(Duration::from_millis(30)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(true))
                })
            })
            .collect();

        let outcome = exec.together_completed(tasks);
        assert!(outcome.state);
        assert_eq!(done.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn providers_accumulate() {
        let exec = executor();
        exec.register_provider(Arc::new(Module::new(
            "redis",
            "infrastructure/persistence/redis.unit",
            Namespace::new(),
        )));
        assert_eq!(exec.providers().len(), 1);
    }
}
