//! End-to-end tests for the ironloop agent loop.
//!
//! These exercise the full pipeline through the public API: template
//! rendering, querying, action execution, context-budget annotation, and
//! both persistence channels (live JSONL log and snapshot checkpoints).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ironloop_agent::{builtin_agents, AgentConfig, DefaultAgent, JsonFileWindowStore};
use ironloop_core::env::{Environment, Observation};
use ironloop_core::error::{EnvError, ModelError};
use ironloop_core::message::{Message, Role};
use ironloop_core::model::Model;
use serde_json::{json, Value};
use tempfile::TempDir;

// ── Mock collaborators ───────────────────────────────────────────────────

/// A model that returns scripted responses in sequence.
struct ScriptedModel {
    responses: Mutex<Vec<Result<Message, ModelError>>>,
    call_count: Mutex<usize>,
    model_name: Option<String>,
}

impl ScriptedModel {
    fn new(responses: Vec<Result<Message, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            model_name: None,
        }
    }

    fn named(mut self, name: &str) -> Self {
        self.model_name = Some(name.into());
        self
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    fn model_name(&self) -> Option<String> {
        self.model_name.clone()
    }

    async fn query(&self, _messages: &[Message]) -> Result<Message, ModelError> {
        let mut count = self.call_count.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedModel exhausted at call #{}", *count + 1);
        }
        *count += 1;
        responses.remove(0)
    }

    fn serialize(&self) -> Value {
        json!({"model": {"name": "e2e_scripted"}})
    }
}

/// An environment that echoes commands back as observations.
struct EchoEnv;

#[async_trait]
impl Environment for EchoEnv {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, action: &Value) -> Result<Observation, EnvError> {
        let command = action
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| EnvError::InvalidAction("missing command".into()))?;
        Ok(Observation::new(format!("$ {command}")).with_returncode(0))
    }

    fn serialize(&self) -> Value {
        json!({"env": {"name": "echo"}})
    }
}

fn config() -> AgentConfig {
    AgentConfig::from_toml_str(
        r#"
        system_template = "You are working on: {{task}}"
        instance_template = "Begin. Budget left: {{context_left_percent}}"
        "#,
    )
    .unwrap()
}

fn acting(commands: &[&str], cost: f64) -> Message {
    let actions: Vec<Value> = commands.iter().map(|c| json!({"command": c})).collect();
    Message::assistant("running commands")
        .with_extra("actions", Value::Array(actions))
        .with_extra("cost", json!(cost))
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_persists_live_log_and_snapshot() {
    let dir = TempDir::new().unwrap();
    let live = dir.path().join("live.jsonl");
    let snapshot_path = dir.path().join("trajectory.json");
    let windows = dir.path().join("windows.json");

    let mut cfg = config();
    cfg.output_path = Some(snapshot_path.clone());

    let model = Arc::new(ScriptedModel::new(vec![
        Ok(acting(&["cargo test"], 0.2)),
        Ok(Message::exit("all done", "Submitted", "the diff")),
    ]));
    let mut agent = DefaultAgent::new(model, Arc::new(EchoEnv), cfg)
        .with_window_store(Arc::new(JsonFileWindowStore::new(windows)));
    agent.set_live_trajectory_path(Some(live.clone()));

    let exit_info = agent.run("fix the flaky test").await.unwrap();
    assert_eq!(exit_info.get("exit_status").unwrap(), "Submitted");
    assert_eq!(exit_info.get("submission").unwrap(), "the diff");

    // The live log replays to the in-memory sequence
    let replayed: Vec<Message> = std::fs::read_to_string(&live)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replayed, agent.messages());
    assert_eq!(replayed[0].role, Role::System);
    assert!(replayed[0].content.contains("fix the flaky test"));
    assert!(replayed.iter().any(|m| m.content == "$ cargo test"));

    // The snapshot on disk matches the in-memory serialization
    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert_eq!(on_disk, agent.serialize(&[]));
    assert_eq!(on_disk["info"]["exit_status"], json!("Submitted"));
    assert_eq!(on_disk["info"]["model_stats"]["api_calls"], json!(2));
    assert_eq!(on_disk["model"]["name"], json!("e2e_scripted"));
    assert_eq!(on_disk["env"]["name"], json!("echo"));
    assert_eq!(on_disk["trajectory_format"], json!("ironloop-trajectory-1"));
}

#[tokio::test]
async fn context_window_file_feeds_budget_annotation() {
    let dir = TempDir::new().unwrap();
    let windows = dir.path().join("windows.json");
    std::fs::write(&windows, r#"{"gpt-test": 1000}"#).unwrap();

    let response = acting(&[], 0.1)
        .with_extra("response", json!({"usage": {"prompt_tokens": 250}}));
    let model = Arc::new(
        ScriptedModel::new(vec![
            Ok(response),
            Ok(Message::exit("done", "Submitted", "")),
        ])
        .named("openai/gpt-test"),
    );
    let mut agent = DefaultAgent::new(model, Arc::new(EchoEnv), config())
        .with_window_store(Arc::new(JsonFileWindowStore::new(windows)));

    agent.run("task").await.unwrap();
    let annotated = agent
        .messages()
        .iter()
        .find(|m| m.role == Role::Assistant)
        .unwrap();
    assert_eq!(annotated.context_left_percent, Some(75));
}

#[tokio::test]
async fn limits_bound_the_run_even_with_a_chatty_model() {
    let mut cfg = config();
    cfg.step_limit = 3;
    let model = Arc::new(ScriptedModel::new(
        (0..10).map(|_| Ok(acting(&["echo hi"], 0.0))).collect(),
    ));
    let mut agent = DefaultAgent::new(model.clone(), Arc::new(EchoEnv), cfg);

    let exit_info = agent.run("task").await.unwrap();
    assert_eq!(exit_info.get("exit_status").unwrap(), "LimitsExceeded");
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn model_failure_leaves_a_checkpointed_failed_run() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = dir.path().join("failed.json");
    let mut cfg = config();
    cfg.output_path = Some(snapshot_path.clone());

    let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::RateLimited {
        retry_after_secs: 30,
    })]));
    let mut agent = DefaultAgent::new(model, Arc::new(EchoEnv), cfg);

    let err = agent.run("task").await.unwrap_err();
    assert_eq!(err.category(), "ModelError");

    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    let messages = on_disk["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["role"], json!("exit"));
    assert_eq!(messages[2]["extra"]["exit_status"], json!("ModelError"));
    assert_eq!(on_disk["info"]["exit_status"], json!("ModelError"));
}

#[tokio::test]
async fn registry_builds_both_agent_kinds_end_to_end() {
    for kind in ["default", "toolcall"] {
        let factory = builtin_agents().resolve(kind).unwrap();
        let model = Arc::new(ScriptedModel::new(vec![Ok(Message::exit(
            "done",
            "Submitted",
            "",
        ))]));
        let mut agent = factory(model, Arc::new(EchoEnv), config());
        let exit_info = agent.run("task").await.unwrap();
        assert_eq!(exit_info.get("exit_status").unwrap(), "Submitted");
    }
}
