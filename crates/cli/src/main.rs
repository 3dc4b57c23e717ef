//! `workflow-generator` CLI entry-point.
//!
//! Available sub-commands:
//! - `create`: build a workflow from task descriptions and deploy it.
//! - `example`: generate and deploy the built-in sample workflows.
//! - `infer`: show which step type each task would become.
//! - `validate`: validate a schema JSON file.
//! - `render`: print one artifact of a schema JSON file without writing it.
//! - `list`: list workflows found in the output directories.
//! - `snippet`: print the host-server integration snippet of a workflow.
//! - `teardown`: remove a workflow's artifacts.
//!
//! Deployment registers into a registrar that lives as long as this process,
//! so deploying here checks that the routes and component can be mounted.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::render::descriptors::parse_schema_descriptor;
use engine::{
    infer, validate_schema, GeneratorConfig, Inference, TemplateRenderer, WorkflowManager,
    SAMPLE_WORKFLOWS,
};
use registry::{DeploymentRecord, DeploymentRegistrar};
use store::ArtifactKind;

#[derive(Parser)]
#[command(
    name = "workflow-generator",
    about = "Generate backend plugins and frontend components from workflow descriptions",
    version
)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, global = true, default_value = "workflow-generator.toml")]
    config: PathBuf,

    /// Overrides `backend_dir` from the configuration.
    #[arg(long, global = true, env = "BACKEND_DIR")]
    backend_dir: Option<PathBuf>,

    /// Overrides `frontend_dir` from the configuration.
    #[arg(long, global = true, env = "FRONTEND_DIR")]
    frontend_dir: Option<PathBuf>,

    /// Overrides `apps_dir` from the configuration.
    #[arg(long, global = true, env = "APPS_DIR")]
    apps_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create, validate, generate and deploy a workflow from task descriptions.
    Create {
        /// Task descriptions, in step order.
        #[arg(required = true)]
        tasks: Vec<String>,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        /// Stop after writing the artifacts.
        #[arg(long)]
        no_deploy: bool,
    },
    /// Generate and deploy the built-in sample workflows.
    Example {
        #[arg(long)]
        no_deploy: bool,
    },
    /// Show the inferred step type of each task.
    Infer {
        #[arg(required = true)]
        tasks: Vec<String>,
    },
    /// Validate a workflow schema JSON file.
    Validate {
        path: PathBuf,
    },
    /// Render one artifact of a schema JSON file to stdout.
    Render {
        path: PathBuf,
        /// backend-plugin, frontend-component, config-descriptor or schema-descriptor.
        #[arg(long, default_value = "backend-plugin")]
        kind: ArtifactKind,
    },
    /// List generated workflows.
    List,
    /// Print the integration snippet of a generated workflow.
    Snippet {
        workflow_id: String,
    },
    /// Remove a workflow's artifacts.
    Teardown {
        workflow_id: String,
    },
}

impl Cli {
    /// Configuration file values with command-line overrides applied.
    fn generator_config(&self) -> GeneratorConfig {
        let mut config = GeneratorConfig::load(&self.config);
        if let Some(dir) = &self.backend_dir {
            config.backend_dir = dir.clone();
        }
        if let Some(dir) = &self.frontend_dir {
            config.frontend_dir = dir.clone();
        }
        if let Some(dir) = &self.apps_dir {
            config.apps_dir = dir.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.generator_config();
    let manager = Arc::new(WorkflowManager::new(
        config,
        Arc::new(DeploymentRegistrar::new()),
    ));

    match cli.command {
        Command::Create {
            name,
            description,
            category,
            tasks,
            no_deploy,
        } => {
            manager.restore()?;
            let (record, inferences) = build(
                &manager,
                &name,
                &description,
                category.as_deref(),
                &tasks,
                !no_deploy,
            )?;
            print_record(&record);
            for (index, inference) in inferences.iter().enumerate() {
                println!(
                    "   step_{} {:<22} {}",
                    index + 1,
                    inference.step_type.to_string(),
                    inference.confidence
                );
            }
            for path in manager.artifact_paths(&record.workflow_id) {
                println!("   {}", path.display());
            }
        }
        Command::Example { no_deploy } => {
            let deploy = !no_deploy;
            manager.restore()?;
            let mut handles = Vec::with_capacity(SAMPLE_WORKFLOWS.len());
            for sample in SAMPLE_WORKFLOWS {
                let manager = Arc::clone(&manager);
                handles.push(tokio::task::spawn_blocking(move || {
                    build(
                        &manager,
                        sample.name,
                        sample.description,
                        Some(sample.category),
                        sample.tasks,
                        deploy,
                    )
                }));
            }

            let mut failed = 0;
            for handle in handles {
                match handle.await? {
                    Ok((record, _)) => print_record(&record),
                    Err(e) => {
                        eprintln!("❌ {e:#}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} sample workflows failed");
            }
        }
        Command::Infer { tasks } => {
            for task in &tasks {
                let inference = infer(task);
                println!(
                    "{:<22} {task}  ({})",
                    inference.step_type.to_string(),
                    inference.confidence
                );
            }
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let schema = parse_schema_descriptor(&content).context("invalid JSON")?;

            manager.restore()?;
            let existing: HashSet<String> = manager
                .list()
                .into_iter()
                .map(|r| r.workflow_id)
                .filter(|id| *id != schema.id)
                .collect();

            match validate_schema(&schema, &existing) {
                Ok(()) => println!(
                    "✅ Workflow '{}' is valid ({} steps).",
                    schema.id,
                    schema.steps.len()
                ),
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Render { path, kind } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let schema = parse_schema_descriptor(&content).context("invalid JSON")?;
            let renderer = TemplateRenderer::new(&manager.config().route_prefix);
            print!("{}", renderer.render(&schema, kind)?);
        }
        Command::List => {
            manager.restore()?;
            let records = manager.list();
            if records.is_empty() {
                println!("No workflows found in {}", manager.config().apps_dir.display());
            }
            for record in &records {
                print_record(record);
            }
        }
        Command::Snippet { workflow_id } => {
            manager.restore()?;
            print!("{}", manager.integration_snippet(&workflow_id)?);
        }
        Command::Teardown { workflow_id } => {
            manager.restore()?;
            let record = manager.teardown(&workflow_id)?;
            print_record(&record);
        }
    }

    Ok(())
}

/// Run one workflow through create → validate → generate (→ deploy).
///
/// Returns the final record and how each task was inferred.
fn build<S: AsRef<str>>(
    manager: &WorkflowManager,
    name: &str,
    description: &str,
    category: Option<&str>,
    tasks: &[S],
    deploy: bool,
) -> anyhow::Result<(DeploymentRecord, Vec<Inference>)> {
    let creation = manager.create_from_tasks(name, description, category, tasks)?;
    let id = creation.record.workflow_id;
    manager.validate(&id)?;
    let generation = manager.generate(&id)?;
    if !generation.changed {
        warn!("workflow '{id}': artifacts already up to date");
    }
    if deploy {
        let record = manager.deploy(&id)?;
        info!(
            "workflow '{id}': {} routes registered",
            manager.registrar().routes_for(&id).len()
        );
        return Ok((record, creation.inferences));
    }
    Ok((generation.record, creation.inferences))
}

fn print_record(record: &DeploymentRecord) {
    println!(
        "✅ {:<28} {:<10} {}",
        record.workflow_id,
        record.status.to_string(),
        record.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}
