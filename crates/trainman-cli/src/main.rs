//! Trainman - release train automation CLI
//!
//! The `trainman` command inspects the release train model and exercises the
//! orchestrator.
//!
//! ## Commands
//!
//! - `trains`: List the known release trains
//! - `build-order`: Print the dependency-first project build order
//! - `versions`: Versions to set for a train iteration and phase
//! - `branches`: Branch each module of a train iteration builds from
//! - `previous`: The iteration released before a train iteration
//! - `waves`: Dependency waves the orchestrator would schedule
//! - `dry-run`: Run a simulated release over every module

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use trainman_core::{
    FailurePolicy, ModuleIteration, Orchestrator, OrchestratorConfig, OrderingMode, Phase,
    PluginRegistry, Projects, ReleaseTrains, Tracker, TrainIteration, UpdateInformation,
};

#[derive(Parser)]
#[command(name = "trainman")]
#[command(version = trainman_core::VERSION)]
#[command(about = "Release train versioning and dependency-ordered orchestration", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "TRAINMAN_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known release trains, oldest first
    Trains {
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Print the dependency-first project build order
    BuildOrder,

    /// Versions to write for every module of a train iteration in a phase
    Versions {
        /// Train iteration, e.g. "Ockham SR1" or "2021.0.2"
        train_iteration: String,

        /// prepare, cleanup or maintenance
        #[arg(short, long, default_value = "prepare")]
        phase: Phase,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Branch each module of a train iteration is built from
    Branches {
        /// Train iteration, e.g. "Ockham SR1"
        train_iteration: String,
    },

    /// The iteration released before a train iteration
    Previous {
        /// Train iteration, e.g. "Neumann M1"
        train_iteration: String,
    },

    /// Dependency waves the orchestrator schedules for a train iteration
    Waves {
        /// Train iteration, e.g. "Ockham GA"
        train_iteration: String,
    },

    /// Run a simulated release of every module through the orchestrator
    DryRun {
        /// Train iteration, e.g. "Ockham GA"
        train_iteration: String,

        /// Run every module at once instead of in dependency waves
        #[arg(long)]
        any_order: bool,

        /// Maximum modules in flight (overrides TRAINMAN_MAX_PARALLEL)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        parallel: Option<u32>,

        /// skip or run (overrides TRAINMAN_FAILURE_POLICY)
        #[arg(long)]
        failure_policy: Option<FailurePolicy>,

        /// Simulate a failure for this project (repeatable)
        #[arg(long = "fail", value_name = "PROJECT")]
        fail: Vec<String>,

        /// Simulated work per module in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,

        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    trainman_core::init_tracing(cli.json, level);

    let projects = Projects::standard().context("Failed to build project registry")?;
    let trains = ReleaseTrains::standard().context("Failed to build release train registry")?;

    match cli.command {
        Commands::Trains { output } => cmd_trains(&trains, output),
        Commands::BuildOrder => cmd_build_order(&projects),
        Commands::Versions {
            train_iteration,
            phase,
            output,
        } => {
            let ti = resolve(&trains, &train_iteration)?;
            cmd_versions(&projects, ti, phase, output)
        }
        Commands::Branches { train_iteration } => {
            let ti = resolve(&trains, &train_iteration)?;
            cmd_branches(&projects, &ti)
        }
        Commands::Previous { train_iteration } => {
            let ti = resolve(&trains, &train_iteration)?;
            let previous = trains
                .previous_iteration(&ti)
                .with_context(|| format!("No iteration precedes {ti}"))?;
            println!("{previous}");
            Ok(())
        }
        Commands::Waves { train_iteration } => {
            let ti = resolve(&trains, &train_iteration)?;
            cmd_waves(projects, &ti)
        }
        Commands::DryRun {
            train_iteration,
            any_order,
            parallel,
            failure_policy,
            fail,
            delay_ms,
            output,
        } => {
            let ti = resolve(&trains, &train_iteration)?;
            let mut config =
                OrchestratorConfig::from_env().context("Invalid orchestrator configuration")?;
            if let Some(parallel) = parallel {
                config = config.with_max_concurrent(parallel as usize);
            }
            if let Some(policy) = failure_policy {
                config = config.with_failure_policy(policy);
            }
            let mode = if any_order {
                OrderingMode::AnyOrder
            } else {
                OrderingMode::DependencyOrdered
            };
            let failing: BTreeSet<String> = fail.into_iter().collect();
            cmd_dry_run(projects, &ti, mode, config, failing, delay_ms, output).await
        }
    }
}

fn resolve(trains: &ReleaseTrains, descriptor: &str) -> Result<TrainIteration> {
    trains
        .parse_train_iteration(descriptor)
        .with_context(|| format!("Unknown train iteration '{descriptor}'"))
}

#[derive(Serialize)]
struct TrainRow {
    name: String,
    calver: Option<String>,
    format: String,
    support: String,
    modules: usize,
}

fn cmd_trains(trains: &ReleaseTrains, output: OutputFormat) -> Result<()> {
    let rows: Vec<TrainRow> = trains
        .iter()
        .map(|train| TrainRow {
            name: train.name().to_string(),
            calver: train.calver().map(|v| v.to_string()),
            format: format!("{:?}", train.version_format()).to_lowercase(),
            support: format!("{:?}", train.support_status()).to_lowercase(),
            modules: train.modules().len(),
        })
        .collect();

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            println!("{:<10} {:<8} {:<9} {:<11} MODULES", "TRAIN", "CALVER", "FORMAT", "SUPPORT");
            for row in rows {
                println!(
                    "{:<10} {:<8} {:<9} {:<11} {}",
                    row.name,
                    row.calver.as_deref().unwrap_or("-"),
                    row.format,
                    row.support,
                    row.modules
                );
            }
        }
    }
    Ok(())
}

fn cmd_build_order(projects: &Projects) -> Result<()> {
    for (idx, project) in projects.iter().enumerate() {
        let deps: Vec<&str> = project.dependencies().iter().map(|d| d.as_str()).collect();
        if deps.is_empty() {
            println!("{:>2}. {}", idx + 1, project.key());
        } else {
            println!("{:>2}. {} <- {}", idx + 1, project.key(), deps.join(", "));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct VersionPlan {
    train_iteration: String,
    phase: Phase,
    release_train: String,
    parent: String,
    modules: Vec<ModuleVersion>,
}

#[derive(Debug, Serialize)]
struct ModuleVersion {
    project: String,
    version: String,
}

fn version_plan(projects: &Projects, ti: TrainIteration, phase: Phase) -> Result<VersionPlan> {
    let modules = ti
        .module_iterations_without_build(projects)
        .context("Train ships an unregistered project")?;
    let info = UpdateInformation::of(ti, phase);

    let modules = modules
        .iter()
        .map(|module| -> Result<ModuleVersion> {
            let version = info.project_version_to_set(module.project())?;
            Ok(ModuleVersion {
                project: module.project_key().to_string(),
                version: version.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VersionPlan {
        train_iteration: info.train_iteration().to_string(),
        phase,
        release_train: info.release_train_version(),
        parent: info
            .parent_version_to_set()
            .context("Train has no parent build module")?
            .to_string(),
        modules,
    })
}

fn cmd_versions(
    projects: &Projects,
    ti: TrainIteration,
    phase: Phase,
    output: OutputFormat,
) -> Result<()> {
    let plan = version_plan(projects, ti, phase)?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => {
            println!("{} ({})", plan.train_iteration, plan.phase);
            println!("{:<16} {}", "release train", plan.release_train);
            println!("{:<16} {}", "parent", plan.parent);
            for module in &plan.modules {
                println!("{:<16} {}", module.project, module.version);
            }
        }
    }
    Ok(())
}

fn cmd_branches(projects: &Projects, ti: &TrainIteration) -> Result<()> {
    let modules = ti
        .module_iterations(projects)
        .context("Train ships an unregistered project")?;
    for module in modules {
        println!("{:<16} {}", module.project_key().as_str(), module.branch());
    }
    Ok(())
}

fn cmd_waves(projects: Projects, ti: &TrainIteration) -> Result<()> {
    let modules = ti
        .module_iterations(&projects)
        .context("Train ships an unregistered project")?;
    let orchestrator = Orchestrator::new(projects.into(), OrchestratorConfig::default());
    for (idx, wave) in orchestrator.waves(&modules).iter().enumerate() {
        let keys: Vec<&str> = wave.iter().map(|m| m.project_key().as_str()).collect();
        println!("wave {idx}: {}", keys.join(", "));
    }
    Ok(())
}

/// Release client a simulated module is dispatched to.
#[derive(Debug, Clone, Copy)]
enum SimulatedClient {
    Jira,
    GitHub,
}

fn simulated_clients() -> PluginRegistry<SimulatedClient> {
    PluginRegistry::new()
        .with_tracker_plugin("jira", Tracker::Jira, SimulatedClient::Jira)
        .with_tracker_plugin("github", Tracker::GitHub, SimulatedClient::GitHub)
}

async fn simulate_release(
    clients: &PluginRegistry<SimulatedClient>,
    module: &ModuleIteration,
    failing: &BTreeSet<String>,
    delay: Duration,
) -> Result<String> {
    let client = clients.resolve(module.project())?;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if failing.contains(module.project_key().as_str()) {
        anyhow::bail!("simulated failure releasing {}", module.version());
    }
    Ok(format!("{client:?} released {} on {}", module.version(), module.branch()))
}

async fn cmd_dry_run(
    projects: Projects,
    ti: &TrainIteration,
    mode: OrderingMode,
    config: OrchestratorConfig,
    failing: BTreeSet<String>,
    delay_ms: u64,
    output: OutputFormat,
) -> Result<()> {
    info!(
        train_iteration = %ti,
        mode = %mode,
        max_concurrent = config.max_concurrent,
        failure_policy = %config.failure_policy,
        "starting dry run"
    );

    let orchestrator = Orchestrator::new(projects.into(), config);
    let clients = std::sync::Arc::new(simulated_clients());
    let failing = std::sync::Arc::new(failing);
    let delay = Duration::from_millis(delay_ms);

    let summary = orchestrator
        .run(ti, mode, move |module| {
            let clients = std::sync::Arc::clone(&clients);
            let failing = std::sync::Arc::clone(&failing);
            async move { simulate_release(&clients, &module, &failing, delay).await }
        })
        .await
        .context("Failed to schedule modules")?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary.report())?),
        OutputFormat::Text => println!("{summary}"),
    }
    summary.ensure_success()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_dry_run_flags() {
        let cli = Cli::try_parse_from([
            "trainman",
            "dry-run",
            "Ockham GA",
            "--any-order",
            "--parallel",
            "2",
            "--failure-policy",
            "run",
            "--fail",
            "jpa",
            "--fail",
            "mongodb",
        ])
        .unwrap();
        match cli.command {
            Commands::DryRun {
                train_iteration,
                any_order,
                parallel,
                failure_policy,
                fail,
                ..
            } => {
                assert_eq!(train_iteration, "Ockham GA");
                assert!(any_order);
                assert_eq!(parallel, Some(2));
                assert_eq!(failure_policy, Some(FailurePolicy::RunAnyway));
                assert_eq!(fail, vec!["jpa", "mongodb"]);
            }
            _ => panic!("expected dry-run"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_phase_and_zero_parallelism() {
        assert!(Cli::try_parse_from(["trainman", "versions", "Ockham GA", "--phase", "ship"]).is_err());
        assert!(Cli::try_parse_from(["trainman", "dry-run", "Ockham GA", "--parallel", "0"]).is_err());
    }

    #[test]
    fn test_version_plan_for_cleanup() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let ti = resolve(&trains, "Ockham GA").unwrap();
        let plan = version_plan(&projects, ti, Phase::Cleanup).unwrap();

        assert_eq!(plan.release_train, "Ockham-BUILD-SNAPSHOT");
        assert_eq!(plan.parent, "2.5.0.BUILD-SNAPSHOT");
        let commons = plan.modules.iter().find(|m| m.project == "commons").unwrap();
        assert_eq!(commons.version, "2.5.0.BUILD-SNAPSHOT");
        assert!(plan.modules.iter().all(|m| m.project != "build"));
    }

    #[tokio::test]
    async fn test_simulated_release_dispatches_by_tracker() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let ti = resolve(&trains, "Ockham SR1").unwrap();
        let clients = simulated_clients();
        let failing = BTreeSet::from(["jpa".to_string()]);

        let build = ti.module(projects.require("build").unwrap()).unwrap();
        let released = simulate_release(&clients, &build, &failing, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(released, "Jira released 2.4.1.RELEASE on 2.4.x");

        let jpa = ti.module(projects.require("jpa").unwrap()).unwrap();
        let err = simulate_release(&clients, &jpa, &failing, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2.4.1.RELEASE"));
    }

    #[tokio::test]
    async fn test_dry_run_reports_failures() {
        let projects = Projects::standard().unwrap();
        let trains = ReleaseTrains::standard().unwrap();
        let ti = resolve(&trains, "Ockham GA").unwrap();
        let result = cmd_dry_run(
            projects,
            &ti,
            OrderingMode::DependencyOrdered,
            OrchestratorConfig::default(),
            BTreeSet::from(["commons".to_string()]),
            0,
            OutputFormat::Json,
        )
        .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("commons: simulated failure"), "{err}");
        assert!(err.contains("jpa: skipped, upstream failed: commons"), "{err}");
    }
}
