use std::io::Write;

use waypoint::config::{ForkJoinConfig, SafetyProfile};
use waypoint::types::OnAgentFailure;
use waypoint::{AppConfig, Waypoint, WaypointError};

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[scout]
k_beam = 5
max_depth = 3
commit_margin = 0.25
min_score = 0.3
shortlist_size = 2
llm_evaluation_enabled = true
fallback_to_heuristics = false

[scout.evaluation_model]
model_id = "llama3.2"

[scout.validation_model]
provider = "openai"
model_id = "gpt-4o-mini"
temperature = 0.1

[scout.budget]
cost_budget_tokens = 2000
latency_budget_ms = 0

[scout.safety]
profile = "strict"
forbidden_capabilities = ["payments"]

[[scout.safety.risky_patterns]]
pattern = "(?i)delete"
label = "deletion"

[scout.weights]
llm = 0.6
heuristics = 0.1
prior = 0.1
cost = 0.1
latency = 0.1

[scout.priors]
search = 0.9

[executor]
path_source = "scout.target"
on_agent_failure = "abort"

[fork_join]
backend = "sqlite"
path = "/tmp/waypoint-forks.db"

[log]
filter = "waypoint=debug"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.scout.k_beam, 5);
    assert_eq!(config.scout.max_depth, 3);
    assert_eq!(config.scout.shortlist_size, 2);
    assert!(config.scout.llm_evaluation_enabled);
    assert!(!config.scout.fallback_to_heuristics);

    let eval_model = config.scout.evaluation_model.as_ref().expect("evaluation model");
    assert_eq!(eval_model.provider, "ollama");
    assert_eq!(eval_model.model_id, "llama3.2");
    assert_eq!(config.scout.validation_model.as_ref().unwrap().provider, "openai");

    assert_eq!(config.scout.budget.cost_budget_tokens, 2000);
    assert_eq!(config.scout.budget.latency_budget_ms, 0);
    assert_eq!(config.scout.safety.profile, SafetyProfile::Strict);
    assert_eq!(config.scout.safety.threshold(), 0.8);
    assert_eq!(config.scout.safety.risky_patterns.len(), 1);
    assert_eq!(config.scout.weights.llm, 0.6);
    assert_eq!(config.scout.priors["search"], 0.9);

    let executor = config.executor.as_ref().expect("executor present");
    assert_eq!(executor.path_source, "scout.target");
    assert_eq!(executor.on_agent_failure, OnAgentFailure::Abort);
    assert_eq!(
        config.fork_join,
        ForkJoinConfig::Sqlite {
            path: "/tmp/waypoint-forks.db".to_string()
        }
    );
    assert_eq!(config.log.filter, "waypoint=debug");
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("WAYPOINT_TEST_PATH_SOURCE", "router.response");

    let toml_content = r#"
[executor]
path_source = "${WAYPOINT_TEST_PATH_SOURCE}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.executor.unwrap().path_source, "router.response");

    std::env::remove_var("WAYPOINT_TEST_PATH_SOURCE");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[scout]
k_beam = 4
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.scout.k_beam, 4);
    assert_eq!(config.scout.max_depth, 2);
    assert_eq!(config.scout.commit_margin, 0.15);
    assert_eq!(config.scout.min_score, 0.2);
    assert_eq!(config.scout.budget.latency_budget_ms, 1200);
    assert_eq!(config.scout.weights.llm, 0.45);
    assert!(config.scout.priors.is_empty());
    assert!(config.scout.evaluation_model.is_none());
    assert!(config.executor.is_none());
    assert_eq!(config.fork_join, ForkJoinConfig::Memory);
}

#[test]
fn test_invalid_failure_policy_rejected() {
    let toml_content = r#"
[executor]
path_source = "scout"
on_agent_failure = "ignore"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, WaypointError::Config(_)));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, WaypointError::ConfigNotFound(_)));
}

#[test]
fn test_waypoint_builds_components_from_config() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = dir.path().join("forks.db");
    let toml_content = format!(
        r#"
[executor]
path_source = "scout"
on_agent_failure = "abort"

[fork_join]
backend = "sqlite"
path = "{}"
"#,
        db.display()
    );

    let path = dir.path().join("waypoint.toml");
    std::fs::write(&path, toml_content).expect("write toml");

    let waypoint = Waypoint::load(&path).expect("build waypoint");
    let executor = waypoint.path_executor("exec").expect("executor configured");
    assert_eq!(executor.path_source(), "scout");
    assert_eq!(executor.on_agent_failure(), OnAgentFailure::Abort);
    assert_eq!(waypoint.scout("router").config().k_beam, 3);
    assert!(db.exists());

    let bare = Waypoint::new(AppConfig::default()).expect("default waypoint");
    assert!(matches!(bare.path_executor("exec"), Err(WaypointError::Config(_))));
}
