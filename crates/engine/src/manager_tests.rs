//! Lifecycle tests for `WorkflowManager`.
//!
//! Every test gets its own `TempDir` for the three output directories and a
//! fresh `DeploymentRegistrar`, so tests never share disk or route state.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use plugins::mock::MockPlugin;
use plugins::{HttpMethod, UiEntry};
use registry::{DeploymentRegistrar, DeploymentStatus, RegistrationConflictError};
use store::{ArtifactKind, ChecksumSet};

use crate::config::GeneratorConfig;
use crate::error::EngineError;
use crate::infer::Confidence;
use crate::manager::WorkflowManager;
use crate::models::{Parameter, ParameterType, Step, StepType, WorkflowSchema};
use crate::render::descriptors::parse_schema_descriptor;

const HELLO_TASKS: [&str; 4] = [
    "user name input",
    "greeting message generation",
    "personalized response creation",
    "message display",
];

fn setup() -> (TempDir, WorkflowManager) {
    let tmp = TempDir::new().unwrap();
    let manager = WorkflowManager::new(
        GeneratorConfig::rooted_at(tmp.path()),
        Arc::new(DeploymentRegistrar::new()),
    );
    (tmp, manager)
}

fn create_hello(manager: &WorkflowManager) {
    manager
        .create_from_tasks("Hello Workflow", "Greets the user", Some("demo"), &HELLO_TASKS)
        .unwrap();
}

/// Create, validate and generate the hello workflow.
fn generate_hello(manager: &WorkflowManager) {
    create_hello(manager);
    manager.validate("hello_workflow").unwrap();
    manager.generate("hello_workflow").unwrap();
}

fn single_step_schema(name: &str, param: &str) -> WorkflowSchema {
    WorkflowSchema::new(
        name,
        "",
        "demo",
        vec![Step::new(
            1,
            "Collect",
            StepType::FormInput,
            "",
            vec![Parameter::new(param, ParameterType::String).required()],
        )],
    )
}

// ============================================================
// Create / validate
// ============================================================

#[test]
fn hello_workflow_is_inferred_and_generated() {
    let (_tmp, manager) = setup();
    create_hello(&manager);

    let schema = manager.schema("hello_workflow").unwrap();
    assert_eq!(schema.id, "hello_workflow");
    assert_eq!(schema.category, "demo");
    let types: Vec<StepType> = schema.steps.iter().map(|s| s.step_type).collect();
    assert_eq!(
        types,
        vec![
            StepType::FormInput,
            StepType::LlmProcessing,
            StepType::FormInput,
            StepType::DataTransformation,
        ]
    );

    assert_eq!(
        manager.validate("hello_workflow").unwrap().status,
        DeploymentStatus::Validated
    );
    let generation = manager.generate("hello_workflow").unwrap();
    assert!(generation.changed);
    assert_eq!(generation.record.status, DeploymentStatus::Generated);
    assert!(generation.record.checksums.is_complete());
    assert!(generation.paths.iter().all(|p| p.is_file()));

    let config_path = manager.config().apps_dir.join("hello_workflow/config.json");
    let config: Value =
        serde_json::from_str(&std::fs::read_to_string(config_path).unwrap()).unwrap();
    assert_eq!(config["id"], "hello_workflow");
    assert_eq!(config["step_count"], 4);
    assert_eq!(config["category"], "demo");
}

#[test]
fn creation_reports_how_each_task_was_inferred() {
    let (_tmp, manager) = setup();
    let creation = manager
        .create_from_tasks("Hello Workflow", "Greets the user", Some("demo"), &HELLO_TASKS)
        .unwrap();

    assert_eq!(creation.record.workflow_id, "hello_workflow");
    assert_eq!(creation.record.status, DeploymentStatus::Draft);
    let confidences: Vec<Confidence> = creation.inferences.iter().map(|i| i.confidence).collect();
    assert_eq!(
        confidences,
        vec![
            Confidence::Matched { rule: "input", keyword: "input" },
            Confidence::Matched { rule: "llm", keyword: "generation" },
            Confidence::Fallback,
            Confidence::Matched { rule: "transform", keyword: "display" },
        ]
    );

    let schema = manager.schema("hello_workflow").unwrap();
    for (step, inference) in schema.steps.iter().zip(&creation.inferences) {
        assert_eq!(step.step_type, inference.step_type);
    }
    let prompt = schema.steps[1].llm_config.as_ref().unwrap();
    assert_eq!(prompt.template_variables, vec!["input_data"]);
}

#[test]
fn missing_category_uses_configured_default() {
    let (_tmp, manager) = setup();
    manager
        .create_from_tasks("Quick Form", "", None, &["name input"])
        .unwrap();
    assert_eq!(manager.schema("quick_form").unwrap().category, "auto_generated");
}

#[test]
fn second_workflow_with_same_slug_is_rejected_before_generation() {
    let (tmp, manager) = setup();
    manager
        .create_from_tasks("Report", "", None, &["report generation"])
        .unwrap();

    let err = manager
        .create_from_tasks("report!", "", None, &["report formatting"])
        .unwrap_err();
    match &err {
        EngineError::SchemaValidation(e) => {
            assert_eq!(e.workflow_id, "report");
            assert_eq!(e.field_path, "id");
        }
        other => panic!("expected SchemaValidation, got {other:?}"),
    }

    assert_eq!(manager.list().len(), 1);
    assert!(!tmp.path().join("apps/report").exists());
}

#[test]
fn name_without_usable_characters_is_rejected() {
    let (_tmp, manager) = setup();
    let err = manager
        .create_from_tasks("!!!", "", None, &["name input"])
        .unwrap_err();
    assert_eq!(err.field_path(), Some("id"));
    assert!(manager.list().is_empty());
}

#[test]
fn generate_requires_validation_first() {
    let (_tmp, manager) = setup();
    create_hello(&manager);

    let err = manager.generate("hello_workflow").unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            status: DeploymentStatus::Draft,
            operation: "generate",
            ..
        }
    ));
    assert_eq!(err.to_string(), "workflow 'hello_workflow': cannot generate while DRAFT");
}

#[test]
fn invalid_schema_stays_draft() {
    let (_tmp, manager) = setup();
    let schema = WorkflowSchema::new("Empty", "", "demo", vec![]);
    manager.create_from_schema(schema).unwrap();

    let err = manager.validate("empty").unwrap_err();
    assert_eq!(err.field_path(), Some("steps"));
    assert_eq!(manager.status("empty").unwrap().status, DeploymentStatus::Draft);
}

#[test]
fn update_schema_rejects_a_different_id() {
    let (_tmp, manager) = setup();
    create_hello(&manager);

    let err = manager
        .update_schema("hello_workflow", single_step_schema("Other", "x"))
        .unwrap_err();
    assert_eq!(err.field_path(), Some("id"));
}

#[test]
fn unknown_workflow_is_not_found() {
    let (_tmp, manager) = setup();
    assert!(matches!(
        manager.status("nope"),
        Err(EngineError::NotFound { workflow_id }) if workflow_id == "nope"
    ));
}

// ============================================================
// Generate
// ============================================================

#[test]
fn regenerating_unchanged_schema_writes_nothing() {
    let (_tmp, manager) = setup();
    generate_hello(&manager);
    let first = manager.status("hello_workflow").unwrap().checksums;

    let again = manager.generate("hello_workflow").unwrap();
    assert!(!again.changed);
    assert_eq!(again.record.checksums, first);
    assert_eq!(again.record.status, DeploymentStatus::Generated);
}

#[test]
fn regenerate_repairs_a_tampered_artifact() {
    let (_tmp, manager) = setup();
    generate_hello(&manager);
    let backend = manager.artifact_paths("hello_workflow")[0].clone();
    let original = std::fs::read_to_string(&backend).unwrap();
    std::fs::write(&backend, "# edited by hand\n").unwrap();

    let again = manager.generate("hello_workflow").unwrap();
    assert!(again.changed);
    assert_eq!(std::fs::read_to_string(&backend).unwrap(), original);
}

#[test]
fn schema_descriptor_round_trips() {
    let (_tmp, manager) = setup();
    generate_hello(&manager);

    let path = manager.config().apps_dir.join("hello_workflow/schema.json");
    let parsed = parse_schema_descriptor(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(parsed, manager.schema("hello_workflow").unwrap());
}

#[test]
fn failed_staging_leaves_no_artifacts() {
    let (tmp, manager) = setup();
    // A plain file where the apps directory should be makes descriptor
    // staging fail.
    std::fs::write(tmp.path().join("apps"), "not a directory").unwrap();
    create_hello(&manager);
    manager.validate("hello_workflow").unwrap();

    let err = manager.generate("hello_workflow").unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(err.workflow_id(), "hello_workflow");

    for path in manager.artifact_paths("hello_workflow") {
        assert!(!path.exists(), "{} should not exist", path.display());
    }
    let record = manager.status("hello_workflow").unwrap();
    assert_eq!(record.status, DeploymentStatus::Validated);
    assert!(record.checksums.is_empty());
}

// ============================================================
// Deploy
// ============================================================

#[test]
fn deploy_registers_routes_and_component() {
    let (_tmp, manager) = setup();
    generate_hello(&manager);

    let record = manager.deploy("hello_workflow").unwrap();
    assert_eq!(record.status, DeploymentStatus::Deployed);

    let registrar = manager.registrar();
    assert!(registrar.is_registered("hello_workflow"));
    assert_eq!(registrar.route_count(), 4);
    assert_eq!(
        registrar.route_owner(HttpMethod::Post, "/api/workflows/hello_workflow/step_2"),
        Some(("hello_workflow".to_owned(), "step_2".to_owned()))
    );
    assert_eq!(
        registrar.component_owner("HelloWorkflowWorkflow"),
        Some("hello_workflow".to_owned())
    );
}

#[test]
fn deploying_twice_is_a_no_op() {
    let (_tmp, manager) = setup();
    generate_hello(&manager);

    let first = manager.deploy("hello_workflow").unwrap();
    let second = manager.deploy("hello_workflow").unwrap();
    assert_eq!(second.status, DeploymentStatus::Deployed);
    assert_eq!(second.checksums, first.checksums);
    assert_eq!(manager.registrar().route_count(), 4);
}

#[test]
fn deploy_before_generate_is_rejected() {
    let (_tmp, manager) = setup();
    create_hello(&manager);
    manager.validate("hello_workflow").unwrap();

    assert!(matches!(
        manager.deploy("hello_workflow"),
        Err(EngineError::InvalidTransition { operation: "deploy", .. })
    ));
    assert!(!manager.registrar().is_registered("hello_workflow"));
}

#[test]
fn route_conflict_keeps_workflow_generated() {
    let (_tmp, manager) = setup();
    let squatter = MockPlugin::new("squatter").with_step("/api/workflows/hello_workflow/step_1");
    let ui = UiEntry {
        component: "Squatter".into(),
        module: "./squatter".into(),
        title: "Squatter".into(),
    };
    manager
        .registrar()
        .register("squatter", &squatter, &ui, &ChecksumSet::default())
        .unwrap();
    generate_hello(&manager);

    let err = manager.deploy("hello_workflow").unwrap_err();
    assert!(matches!(
        err,
        EngineError::RegistrationConflict(RegistrationConflictError::Route { .. })
    ));

    assert_eq!(
        manager.status("hello_workflow").unwrap().status,
        DeploymentStatus::Generated
    );
    assert!(!manager.registrar().is_registered("hello_workflow"));
    assert!(manager
        .artifact_paths("hello_workflow")
        .iter()
        .all(|p| p.is_file()));
}

#[test]
fn changed_schema_after_deploy_drops_registration_until_redeploy() {
    let (_tmp, manager) = setup();
    manager
        .create_from_schema(single_step_schema("Signup", "email"))
        .unwrap();
    manager.validate("signup").unwrap();
    manager.generate("signup").unwrap();
    let deployed = manager.deploy("signup").unwrap();

    let mut changed = single_step_schema("Signup", "email");
    changed.steps[0]
        .parameters
        .push(Parameter::new("nickname", ParameterType::String));
    manager.update_schema("signup", changed).unwrap();
    assert_eq!(manager.status("signup").unwrap().status, DeploymentStatus::Deployed);

    let generation = manager.generate("signup").unwrap();
    assert!(generation.changed);
    assert_eq!(generation.record.status, DeploymentStatus::Generated);
    assert_ne!(generation.record.checksums, deployed.checksums);
    assert!(!manager.registrar().is_registered("signup"));

    assert_eq!(manager.deploy("signup").unwrap().status, DeploymentStatus::Deployed);
    assert!(manager.registrar().is_registered("signup"));
}

// ============================================================
// Teardown
// ============================================================

#[test]
fn teardown_removes_files_and_registration() {
    let (tmp, manager) = setup();
    generate_hello(&manager);
    manager.deploy("hello_workflow").unwrap();

    let record = manager.teardown("hello_workflow").unwrap();
    assert_eq!(record.status, DeploymentStatus::TornDown);
    assert!(!manager.registrar().is_registered("hello_workflow"));
    assert_eq!(manager.registrar().route_count(), 0);
    for path in manager.artifact_paths("hello_workflow") {
        assert!(!path.exists());
    }
    assert!(!tmp.path().join("apps/hello_workflow").exists());

    assert!(matches!(
        manager.generate("hello_workflow"),
        Err(EngineError::NotFound { .. })
    ));
    assert!(manager.list().is_empty());
}

#[test]
fn failed_teardown_keeps_the_deployment_consistent() {
    let (_tmp, manager) = setup();
    generate_hello(&manager);
    manager.deploy("hello_workflow").unwrap();

    // A directory where config.json should be makes its removal fail after
    // the backend and frontend files are already gone.
    let config = manager.artifact_paths("hello_workflow")[2].clone();
    std::fs::remove_file(&config).unwrap();
    std::fs::create_dir(&config).unwrap();

    let err = manager.teardown("hello_workflow").unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(
        manager.status("hello_workflow").unwrap().status,
        DeploymentStatus::Deployed
    );
    assert!(manager.registrar().is_registered("hello_workflow"));

    std::fs::remove_dir(&config).unwrap();
    let repaired = manager.generate("hello_workflow").unwrap();
    assert!(repaired.changed);
    assert_eq!(repaired.record.status, DeploymentStatus::Deployed);
    assert!(manager.registrar().is_registered("hello_workflow"));

    assert_eq!(
        manager.teardown("hello_workflow").unwrap().status,
        DeploymentStatus::TornDown
    );
    assert!(!manager.registrar().is_registered("hello_workflow"));
}

#[test]
fn teardown_frees_the_id() {
    let (_tmp, manager) = setup();
    create_hello(&manager);
    manager.teardown("hello_workflow").unwrap();

    create_hello(&manager);
    assert_eq!(
        manager.status("hello_workflow").unwrap().status,
        DeploymentStatus::Draft
    );
}

// ============================================================
// Restore / queries
// ============================================================

#[test]
fn restore_picks_up_generated_workflows() {
    let tmp = TempDir::new().unwrap();
    let registrar = Arc::new(DeploymentRegistrar::new());
    {
        let first = WorkflowManager::new(GeneratorConfig::rooted_at(tmp.path()), registrar.clone());
        generate_hello(&first);
        first.deploy("hello_workflow").unwrap();
        first
            .create_from_schema(single_step_schema("Signup", "email"))
            .unwrap();
        first.validate("signup").unwrap();
        first.generate("signup").unwrap();
    }
    std::fs::create_dir_all(tmp.path().join("apps/broken")).unwrap();
    std::fs::write(tmp.path().join("apps/broken/schema.json"), "{ not json").unwrap();

    let second = WorkflowManager::new(GeneratorConfig::rooted_at(tmp.path()), registrar);
    let restored = second.restore().unwrap();
    assert_eq!(restored, vec!["hello_workflow".to_owned(), "signup".to_owned()]);

    assert_eq!(
        second.status("hello_workflow").unwrap().status,
        DeploymentStatus::Deployed
    );
    let signup = second.status("signup").unwrap();
    assert_eq!(signup.status, DeploymentStatus::Generated);
    assert!(signup.checksums.is_complete());
    assert!(!second.generate("signup").unwrap().changed);
}

#[test]
fn list_is_ordered_by_id() {
    let (_tmp, manager) = setup();
    manager.create_from_tasks("Zeta", "", None, &["name input"]).unwrap();
    manager.create_from_tasks("Alpha", "", None, &["name input"]).unwrap();

    let ids: Vec<String> = manager.list().into_iter().map(|r| r.workflow_id).collect();
    assert_eq!(ids, vec!["alpha", "zeta"]);
}

#[test]
fn artifact_paths_follow_layout() {
    let (tmp, manager) = setup();
    let paths = manager.artifact_paths("hello_workflow");
    assert_eq!(paths.len(), ArtifactKind::ALL.len());
    assert_eq!(paths[0], tmp.path().join("backend/hello_workflow_plugin.py"));
}

#[test]
fn integration_snippet_names_the_plugin_module() {
    let (_tmp, manager) = setup();
    create_hello(&manager);
    let snippet = manager.integration_snippet("hello_workflow").unwrap();
    assert!(snippet.contains("import_module(\"hello_workflow_plugin\")"));
}

// ============================================================
// Concurrency
// ============================================================

#[test]
fn concurrent_lifecycles_of_different_ids_do_not_interfere() {
    let (_tmp, manager) = setup();
    let names = ["Alpha Flow", "Beta Flow", "Gamma Flow", "Delta Flow"];

    std::thread::scope(|scope| {
        for name in names {
            let manager = &manager;
            scope.spawn(move || {
                let id = manager
                    .create_from_tasks(name, "", None, &["name input", "ai analysis"])
                    .unwrap()
                    .record
                    .workflow_id;
                manager.validate(&id).unwrap();
                manager.generate(&id).unwrap();
                manager.deploy(&id).unwrap();
            });
        }
    });

    let records = manager.list();
    assert_eq!(records.len(), names.len());
    assert!(records.iter().all(|r| r.status == DeploymentStatus::Deployed));
    assert_eq!(manager.registrar().route_count(), names.len() * 2);

    let ids: HashSet<String> = records.into_iter().map(|r| r.workflow_id).collect();
    assert!(ids.contains("gamma_flow"));
}

#[test]
fn concurrent_creates_of_one_id_admit_exactly_one() {
    let (_tmp, manager) = setup();

    let successes: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = &manager;
                scope.spawn(move || {
                    manager
                        .create_from_tasks("Shared", "", None, &["name input"])
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum()
    });

    assert_eq!(successes, 1);
    assert_eq!(manager.list().len(), 1);
}
