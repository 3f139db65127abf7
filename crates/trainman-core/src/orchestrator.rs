//! Dependency-ordered concurrent execution of per-module operations.
//!
//! [`Orchestrator::run`] applies a caller-supplied async operation to every
//! module of a train iteration. In [`OrderingMode::DependencyOrdered`] the
//! modules are partitioned into waves: a module's wave is one past the latest
//! wave of any submitted module it depends on, directly or transitively.
//! Modules within a wave run concurrently on spawned tasks bounded by a
//! semaphore; wave *k+1* starts only after every task of wave *k* has
//! returned. [`OrderingMode::AnyOrder`] runs everything as a single wave.
//!
//! Every submitted module yields exactly one [`ModuleOutcome`]. Operation
//! errors and panics are captured per module and never abort siblings. With
//! [`FailurePolicy::SkipDependents`] a module whose upstream failed in an
//! earlier wave is not started and is reported as skipped.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, instrument, Instrument};
use uuid::Uuid;

use crate::error::{TrainError, TrainResult};
use crate::obs;
use crate::project::{ProjectKey, Projects};
use crate::train::{ModuleIteration, TrainIteration};

pub const MAX_PARALLEL_ENV: &str = "TRAINMAN_MAX_PARALLEL";
pub const FAILURE_POLICY_ENV: &str = "TRAINMAN_FAILURE_POLICY";

/// How modules are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Waves in build order with a barrier between waves.
    DependencyOrdered,
    /// Everything at once, no barriers.
    AnyOrder,
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderingMode::DependencyOrdered => "dependency-ordered",
            OrderingMode::AnyOrder => "any-order",
        })
    }
}

/// What happens to later-wave modules whose upstream failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Do not start them; report them as skipped with the failed upstream modules.
    #[default]
    SkipDependents,
    /// Start them anyway and let their own operation fail if it must.
    RunAnyway,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailurePolicy::SkipDependents => "skip",
            FailurePolicy::RunAnyway => "run",
        })
    }
}

impl FromStr for FailurePolicy {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "skip-dependents" => Ok(FailurePolicy::SkipDependents),
            "run" | "run-anyway" => Ok(FailurePolicy::RunAnyway),
            _ => Err(TrainError::InvalidConfig {
                key: FAILURE_POLICY_ENV.to_string(),
                value: s.to_string(),
                reason: "expected 'skip' or 'run'".to_string(),
            }),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum number of module operations in flight at once.
    pub max_concurrent: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            failure_policy: FailurePolicy::SkipDependents,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `TRAINMAN_MAX_PARALLEL` and `TRAINMAN_FAILURE_POLICY`.
    pub fn from_env() -> TrainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`OrchestratorConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TrainResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(MAX_PARALLEL_ENV) {
            config.max_concurrent = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(TrainError::InvalidConfig {
                        key: MAX_PARALLEL_ENV.to_string(),
                        value: raw,
                        reason: "expected a positive integer".to_string(),
                    })
                }
            };
        }
        if let Some(raw) = lookup(FAILURE_POLICY_ENV) {
            config.failure_policy = raw.parse()?;
        }
        Ok(config)
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

/// Result of one module's operation.
#[derive(Debug)]
pub enum ModuleOutcome<T> {
    Succeeded { value: T, duration: Duration },
    /// The operation returned an error or panicked.
    Failed {
        error: anyhow::Error,
        duration: Duration,
    },
    /// Never started because these upstream modules failed.
    Skipped { failed_upstream: Vec<ProjectKey> },
}

impl<T> ModuleOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ModuleOutcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ModuleOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ModuleOutcome::Skipped { .. })
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            ModuleOutcome::Succeeded { duration, .. } | ModuleOutcome::Failed { duration, .. } => {
                Some(*duration)
            }
            ModuleOutcome::Skipped { .. } => None,
        }
    }

    fn status(&self) -> &'static str {
        match self {
            ModuleOutcome::Succeeded { .. } => "succeeded",
            ModuleOutcome::Failed { .. } => "failed",
            ModuleOutcome::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug)]
pub struct ModuleResult<T> {
    pub module: ModuleIteration,
    pub outcome: ModuleOutcome<T>,
}

/// Per-module outcomes of one orchestration run, in build order.
#[derive(Debug)]
pub struct Summary<T> {
    run_id: Uuid,
    train_iteration: String,
    mode: OrderingMode,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    results: Vec<ModuleResult<T>>,
}

impl<T> Summary<T> {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn train_iteration(&self) -> &str {
        &self.train_iteration
    }

    pub fn mode(&self) -> OrderingMode {
        self.mode
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn results(&self) -> &[ModuleResult<T>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ModuleResult<T>> {
        self.results
    }

    pub fn get(&self, project: &str) -> Option<&ModuleResult<T>> {
        self.results
            .iter()
            .find(|r| r.module.project_key().as_str() == project)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// `true` when every module succeeded.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    pub fn successes(&self) -> impl Iterator<Item = (&ModuleIteration, &T)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            ModuleOutcome::Succeeded { value, .. } => Some((&r.module, value)),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ModuleIteration, &anyhow::Error)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            ModuleOutcome::Failed { error, .. } => Some((&r.module, error)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&ModuleIteration, &[ProjectKey])> {
        self.results.iter().filter_map(|r| match &r.outcome {
            ModuleOutcome::Skipped { failed_upstream } => {
                Some((&r.module, failed_upstream.as_slice()))
            }
            _ => None,
        })
    }

    /// Fail with every failure and skip listed verbatim, one per line.
    pub fn ensure_success(&self) -> TrainResult<()> {
        if self.is_success() {
            return Ok(());
        }
        let failed = self
            .failures()
            .map(|(module, error)| format!("{}: {error:#}", module.project_key()));
        let skipped = self.skipped().map(|(module, upstream)| {
            let upstream: Vec<&str> = upstream.iter().map(ProjectKey::as_str).collect();
            format!(
                "{}: skipped, upstream failed: {}",
                module.project_key(),
                upstream.join(", ")
            )
        });
        Err(TrainError::ExecutionFailed {
            train_iteration: self.train_iteration.clone(),
            failures: failed.chain(skipped).collect(),
        })
    }

    /// Serializable view without the operation values.
    pub fn report(&self) -> SummaryReport {
        SummaryReport {
            run_id: self.run_id,
            train_iteration: self.train_iteration.clone(),
            mode: self.mode,
            started_at: self.started_at,
            finished_at: self.finished_at,
            success: self.is_success(),
            modules: self
                .results
                .iter()
                .map(|r| ModuleReport {
                    project: r.module.project_key().clone(),
                    version: r.module.version().to_string(),
                    status: r.outcome.status().to_string(),
                    duration_ms: r.outcome.duration().map(duration_ms),
                    error: match &r.outcome {
                        ModuleOutcome::Failed { error, .. } => Some(format!("{error:#}")),
                        _ => None,
                    },
                    failed_upstream: match &r.outcome {
                        ModuleOutcome::Skipped { failed_upstream } => failed_upstream.clone(),
                        _ => Vec::new(),
                    },
                })
                .collect(),
        }
    }
}

impl<T> fmt::Display for Summary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) run {}",
            self.train_iteration, self.mode, self.run_id
        )?;
        writeln!(f, "{:<16} {:<22} {:<10} {:>9}  DETAIL", "MODULE", "VERSION", "STATUS", "TIME")?;
        for result in &self.results {
            let time = result
                .outcome
                .duration()
                .map(|d| format!("{}ms", duration_ms(d)))
                .unwrap_or_else(|| "-".to_string());
            let detail = match &result.outcome {
                ModuleOutcome::Succeeded { .. } => String::new(),
                ModuleOutcome::Failed { error, .. } => format!("{error:#}"),
                ModuleOutcome::Skipped { failed_upstream } => {
                    let upstream: Vec<&str> =
                        failed_upstream.iter().map(ProjectKey::as_str).collect();
                    format!("upstream failed: {}", upstream.join(", "))
                }
            };
            writeln!(
                f,
                "{:<16} {:<22} {:<10} {:>9}  {detail}",
                result.module.project_key().as_str(),
                result.module.version().to_string(),
                result.outcome.status(),
                time,
            )?;
        }
        let failed = self.failures().count();
        let skipped = self.skipped().count();
        write!(
            f,
            "{} module(s): {} succeeded, {failed} failed, {skipped} skipped",
            self.len(),
            self.len() - failed - skipped,
        )
    }
}

/// Serializable form of a [`Summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub run_id: Uuid,
    pub train_iteration: String,
    pub mode: OrderingMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub modules: Vec<ModuleReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub project: ProjectKey,
    pub version: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_upstream: Vec<ProjectKey>,
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs per-module operations over a train iteration.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    projects: Arc<Projects>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(projects: Arc<Projects>, config: OrchestratorConfig) -> Self {
        Self { projects, config }
    }

    pub fn projects(&self) -> &Arc<Projects> {
        &self.projects
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Partition `modules` into dependency waves, each in build order.
    pub fn waves(&self, modules: &[ModuleIteration]) -> Vec<Vec<ModuleIteration>> {
        let mut sorted = modules.to_vec();
        self.sort(&mut sorted);
        let plan = self.plan(&sorted);
        plan.waves
            .iter()
            .map(|wave| wave.iter().map(|&idx| sorted[idx].clone()).collect())
            .collect()
    }

    fn sort(&self, modules: &mut [ModuleIteration]) {
        self.projects
            .sort_by_build_order(modules, |m| m.project_key().as_str());
    }

    /// Wave assignment and submitted upstream modules for build-ordered `modules`.
    fn plan(&self, modules: &[ModuleIteration]) -> WavePlan {
        let mut upstream: Vec<Vec<usize>> = Vec::with_capacity(modules.len());
        let mut wave_of: Vec<usize> = Vec::with_capacity(modules.len());

        for (idx, module) in modules.iter().enumerate() {
            let dependent = module.project_key().as_str();
            let deps: Vec<usize> = (0..idx)
                .filter(|&earlier| {
                    self.projects
                        .depends_on(dependent, modules[earlier].project_key().as_str())
                })
                .collect();
            let wave = deps.iter().map(|&dep| wave_of[dep] + 1).max().unwrap_or(0);
            wave_of.push(wave);
            upstream.push(deps);
        }

        let wave_count = wave_of.iter().max().map_or(0, |max| max + 1);
        let mut waves = vec![Vec::new(); wave_count];
        for (idx, wave) in wave_of.into_iter().enumerate() {
            waves[wave].push(idx);
        }
        WavePlan { waves, upstream }
    }

    /// Run `op` over every module of `train_iteration`.
    ///
    /// Fails only when the train ships a project the registry does not know;
    /// operation failures are reported in the [`Summary`].
    #[instrument(skip(self, op), fields(train_iteration = %train_iteration))]
    pub async fn run<T, F, Fut>(
        &self,
        train_iteration: &TrainIteration,
        mode: OrderingMode,
        op: F,
    ) -> TrainResult<Summary<T>>
    where
        T: Send + 'static,
        F: Fn(ModuleIteration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let modules = train_iteration.module_iterations(&self.projects)?;
        Ok(self.run_modules(train_iteration, modules, mode, op).await)
    }

    /// Run `op` over an explicit selection of modules.
    ///
    /// Wave and module events are emitted inside the `trainman.run` span, and
    /// each operation runs inside a `trainman.module` span below it.
    #[instrument(
        name = "trainman.run",
        skip(self, modules, op),
        fields(
            train_iteration = %train_iteration,
            modules = modules.len(),
            run_id = tracing::field::Empty,
        )
    )]
    pub async fn run_modules<T, F, Fut>(
        &self,
        train_iteration: &TrainIteration,
        mut modules: Vec<ModuleIteration>,
        mode: OrderingMode,
        op: F,
    ) -> Summary<T>
    where
        T: Send + 'static,
        F: Fn(ModuleIteration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let run_id = Uuid::new_v4();
        let run_label = run_id.to_string();
        tracing::Span::current().record("run_id", run_label.as_str());
        let ti_label = train_iteration.to_string();
        let started_at = Utc::now();
        let clock = Instant::now();

        self.sort(&mut modules);
        let plan = match mode {
            OrderingMode::DependencyOrdered => self.plan(&modules),
            OrderingMode::AnyOrder => WavePlan {
                waves: vec![(0..modules.len()).collect()],
                upstream: vec![Vec::new(); modules.len()],
            },
        };
        obs::emit_orchestration_started(&run_label, &ti_label, &mode.to_string(), modules.len());

        let op = Arc::new(op);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut slots: Vec<Option<ModuleOutcome<T>>> = modules.iter().map(|_| None).collect();

        for (wave_idx, wave) in plan.waves.iter().enumerate() {
            let names: Vec<String> = wave
                .iter()
                .map(|&idx| modules[idx].project_key().to_string())
                .collect();
            obs::emit_wave_started(&run_label, wave_idx, &names);

            let mut handles = Vec::with_capacity(wave.len());
            for &idx in wave {
                if self.config.failure_policy == FailurePolicy::SkipDependents {
                    let failed_upstream: Vec<ProjectKey> = plan.upstream[idx]
                        .iter()
                        .filter(|&&dep| matches!(slots[dep], Some(ModuleOutcome::Failed { .. })))
                        .map(|&dep| modules[dep].project_key().clone())
                        .collect();
                    if !failed_upstream.is_empty() {
                        let upstream: Vec<String> =
                            failed_upstream.iter().map(ToString::to_string).collect();
                        obs::emit_module_skipped(
                            &run_label,
                            modules[idx].project_key().as_str(),
                            &upstream,
                        );
                        slots[idx] = Some(ModuleOutcome::Skipped { failed_upstream });
                        continue;
                    }
                }

                let op = Arc::clone(&op);
                let semaphore = Arc::clone(&semaphore);
                let module = modules[idx].clone();
                let span = obs::module_span(&run_label, module.project_key().as_str());
                let task = async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    debug!(module = %module.project_key(), "module operation starting");
                    let started = Instant::now();
                    let result = op(module).await;
                    (result, started.elapsed())
                };
                let handle = tokio::spawn(task.instrument(span));
                handles.push(async move { (idx, handle.await) });
            }

            let joined = futures::future::join_all(handles).await;
            let mut failed = 0;
            for (idx, joined) in joined {
                let outcome = match joined {
                    Ok((Ok(value), duration)) => ModuleOutcome::Succeeded { value, duration },
                    Ok((Err(error), duration)) => ModuleOutcome::Failed { error, duration },
                    Err(join_error) => ModuleOutcome::Failed {
                        error: panic_error(join_error),
                        duration: Duration::ZERO,
                    },
                };
                let key = modules[idx].project_key().as_str();
                match &outcome {
                    ModuleOutcome::Succeeded { duration, .. } => {
                        obs::emit_module_finished(&run_label, key, *duration, None)
                    }
                    ModuleOutcome::Failed { error, duration } => {
                        failed += 1;
                        obs::emit_module_finished(&run_label, key, *duration, Some(error as &dyn fmt::Display))
                    }
                    ModuleOutcome::Skipped { .. } => {}
                }
                slots[idx] = Some(outcome);
            }
            obs::emit_wave_finished(&run_label, wave_idx, failed);
        }

        let results: Vec<ModuleResult<T>> = modules
            .into_iter()
            .zip(slots)
            .map(|(module, outcome)| ModuleResult {
                outcome: outcome.unwrap_or_else(|| ModuleOutcome::Failed {
                    error: anyhow::anyhow!("module {} was never scheduled", module.project_key()),
                    duration: Duration::ZERO,
                }),
                module,
            })
            .collect();

        let summary = Summary {
            run_id,
            train_iteration: ti_label,
            mode,
            started_at,
            finished_at: Utc::now(),
            results,
        };
        obs::emit_orchestration_finished(
            &run_label,
            duration_ms(clock.elapsed()),
            summary.successes().count(),
            summary.failures().count(),
            summary.skipped().count(),
        );
        summary
    }
}

struct WavePlan {
    /// Indices into the build-ordered module list, one list per wave.
    waves: Vec<Vec<usize>>,
    /// For each module, the earlier submitted modules it depends on.
    upstream: Vec<Vec<usize>>,
}

fn panic_error(join_error: JoinError) -> anyhow::Error {
    if join_error.is_cancelled() {
        return anyhow::anyhow!("module operation was cancelled");
    }
    let payload = join_error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    anyhow::anyhow!("module operation panicked: {message}")
}
