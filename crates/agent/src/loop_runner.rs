//! The agent control loop.
//!
//! One step = query the model → execute the actions it requested → append
//! the observations → checkpoint. The loop repeats until a terminal
//! (`exit`-role) message is produced or an unrecoverable error occurs.
//!
//! Control flow is explicit: limit hits and flow interrupts are variants,
//! not propagated failures. Any genuine failure is converted into a
//! terminal message, checkpointed, and then returned to the caller — the
//! run is recorded as failed but the caller still observes the original
//! error.

use std::backtrace::Backtrace;
use std::sync::Arc;

use ironloop_core::env::Environment;
use ironloop_core::error::{Error, Result};
use ironloop_core::merge::merge_all;
use ironloop_core::message::{Message, Role};
use ironloop_core::model::Model;
use ironloop_core::template::render;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, ContextWindowMode};
use crate::context_window::{
    ContextWindowTracker, JsonFileWindowStore, WindowResolver, WindowStore,
};
use crate::limits::{LimitCheck, LimitTracker};
use crate::trajectory::TrajectoryRecorder;

/// Outcome of one model query.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The model responded; the message has been appended
    Response(Message),
    /// A resource limit stopped the run; the exit message has been appended
    LimitReached(Message),
}

/// The default agent: drives the query → act → record loop.
pub struct DefaultAgent {
    config: AgentConfig,
    model: Arc<dyn Model>,
    env: Arc<dyn Environment>,
    recorder: TrajectoryRecorder,
    limits: LimitTracker,
    context: ContextWindowTracker,
    extra_template_vars: Map<String, Value>,
    agent_type: &'static str,
    cost: f64,
    n_calls: u32,
}

impl DefaultAgent {
    /// Create an agent over the given collaborators.
    ///
    /// The context-window map defaults to the shared file under the user's
    /// home directory; substitute it with [`with_window_store`](Self::with_window_store).
    pub fn new(model: Arc<dyn Model>, env: Arc<dyn Environment>, config: AgentConfig) -> Self {
        let limits = LimitTracker::from_config(&config);
        let store = Arc::new(JsonFileWindowStore::new(JsonFileWindowStore::default_path()));
        Self {
            limits,
            context: ContextWindowTracker::new(store),
            config,
            model,
            env,
            recorder: TrajectoryRecorder::new(),
            extra_template_vars: Map::new(),
            agent_type: "default",
            cost: 0.0,
            n_calls: 0,
        }
    }

    /// Substitute the context-window map store.
    pub fn with_window_store(mut self, store: Arc<dyn WindowStore>) -> Self {
        self.context = ContextWindowTracker::new(store);
        self
    }

    /// Attach an interactive context-window resolver.
    ///
    /// Only consulted when the config's `context_window_mode` is
    /// `interactive`; in `auto` mode a cache miss leaves the budget unset.
    pub fn with_window_resolver(mut self, resolver: Arc<dyn WindowResolver>) -> Self {
        if self.config.context_window_mode == ContextWindowMode::Interactive {
            self.context = self.context.with_resolver(resolver);
        }
        self
    }

    /// Add a caller-supplied template variable.
    pub fn with_template_var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_template_vars.insert(key.into(), value);
        self
    }

    pub(crate) fn with_agent_type(mut self, agent_type: &'static str) -> Self {
        self.agent_type = agent_type;
        self
    }

    /// The run config.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The model collaborator.
    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Accumulated cost of all completed queries.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of completed model queries.
    pub fn n_calls(&self) -> u32 {
        self.n_calls
    }

    /// The conversation so far.
    pub fn messages(&self) -> &[Message] {
        self.recorder.messages()
    }

    /// Stream every appended message to a JSONL file, clearing any existing
    /// file at that path. `None` disables live logging.
    pub fn set_live_trajectory_path(&mut self, path: Option<std::path::PathBuf>) {
        self.recorder.reset_live_log(path);
    }

    /// The merged template-variable context: config fields, collaborator
    /// vars, live run stats, then caller extras (later sources win).
    pub fn template_vars(&self) -> Result<Map<String, Value>> {
        let config = serde_json::to_value(&self.config)?;
        let stats = json!({
            "n_model_calls": self.n_calls,
            "model_cost": self.cost,
            "context_window_max": self.context.max(),
            "context_window_prompt_tokens": self.context.prompt_tokens(),
            "context_left_percent": self.context.left_percent(),
        });
        let merged = merge_all([
            config,
            Value::Object(self.model.get_template_vars()),
            Value::Object(self.env.get_template_vars()),
            stats,
            Value::Object(self.extra_template_vars.clone()),
        ]);
        match merged {
            Value::Object(map) => Ok(map),
            other => Err(Error::Internal(format!(
                "template context collapsed to a non-object: {other}"
            ))),
        }
    }

    /// Run the loop until the agent is finished.
    ///
    /// Returns the terminal message's `extra` map (at minimum `exit_status`
    /// and `submission`), or the original error after a best-effort
    /// checkpoint when a step fails unrecoverably.
    pub async fn run(&mut self, task: &str) -> Result<Map<String, Value>> {
        self.extra_template_vars
            .insert("task".into(), Value::String(task.into()));
        self.recorder.clear();
        self.resolve_context_window();

        let rendered = self.template_vars().and_then(|vars| {
            let system = render(&self.config.system_template, &vars)?;
            let instance = render(&self.config.instance_template, &vars)?;
            Ok((system, instance))
        });
        let (system, instance) = match rendered {
            Ok(pair) => pair,
            Err(e) => {
                self.record_failure(&e);
                self.checkpoint();
                return Err(e);
            }
        };
        self.recorder.append(vec![
            self.model.format_message(Role::System, &system, Map::new()),
            self.model.format_message(Role::User, &instance, Map::new()),
        ]);

        info!(model = self.model.name(), env = self.env.name(), "Starting run");
        loop {
            if let Err(e) = self.step().await {
                match e.into_interrupt() {
                    Ok(injected) => {
                        debug!(count = injected.len(), "Flow interrupt, injecting messages");
                        self.recorder.append(injected);
                    }
                    Err(e) => {
                        self.record_failure(&e);
                        self.checkpoint();
                        return Err(e);
                    }
                }
            }
            self.checkpoint();
            if self.recorder.last().is_some_and(Message::is_exit) {
                break;
            }
        }

        let exit_info = self
            .recorder
            .last()
            .map(|message| message.extra.clone())
            .unwrap_or_default();
        info!(
            n_calls = self.n_calls,
            cost = self.cost,
            exit_status = exit_info.get("exit_status").and_then(serde_json::Value::as_str),
            "Run finished"
        );
        Ok(exit_info)
    }

    /// One step: query the model, then execute whatever it asked for.
    pub async fn step(&mut self) -> Result<()> {
        match self.query().await? {
            QueryOutcome::LimitReached(_) => Ok(()),
            QueryOutcome::Response(message) => self.execute_actions(&message).await,
        }
    }

    /// Query the model with the full history and append its response.
    pub async fn query(&mut self) -> Result<QueryOutcome> {
        if let LimitCheck::Exceeded(exit) = self.limits.check(self.n_calls, self.cost) {
            info!(n_calls = self.n_calls, cost = self.cost, "Resource limit reached");
            self.recorder.append(vec![exit.clone()]);
            return Ok(QueryOutcome::LimitReached(exit));
        }
        if self.context.max().is_none() {
            self.resolve_context_window();
        }
        self.n_calls += 1;
        let mut message = self.model.query(self.recorder.messages()).await?;
        self.context.note_usage(&mut message);
        match message.cost() {
            Some(cost) => self.cost += cost,
            // Missing cost counts as zero toward the limit; surface it in
            // the logs so under-counting is visible.
            None => debug!("Model response declared no cost"),
        }
        self.recorder.append(vec![message.clone()]);
        Ok(QueryOutcome::Response(message))
    }

    /// Execute each declared action in order and append the observations.
    ///
    /// Actions run independently; execution stops early only if the
    /// environment itself returns an error.
    pub async fn execute_actions(&mut self, message: &Message) -> Result<()> {
        let mut observations = Vec::with_capacity(message.actions().len());
        for action in message.actions() {
            observations.push(self.env.execute(action).await?);
        }
        let vars = self.template_vars()?;
        let formatted = self
            .model
            .format_observation_messages(message, &observations, &vars);
        self.recorder.append(formatted);
        Ok(())
    }

    /// Serialize the full run state, merged with collaborator data and any
    /// caller-supplied extras.
    pub fn serialize(&self, extras: &[Value]) -> Value {
        let mut all = vec![self.model.serialize(), self.env.serialize()];
        all.extend_from_slice(extras);
        self.recorder.snapshot(self.run_info(), &all)
    }

    /// Serialize and write a snapshot to `path` when given. Always returns
    /// the snapshot.
    pub fn save(&self, path: Option<&std::path::Path>, extras: &[Value]) -> Value {
        let mut all = vec![self.model.serialize(), self.env.serialize()];
        all.extend_from_slice(extras);
        self.recorder.save(path, self.run_info(), &all)
    }

    fn run_info(&self) -> Value {
        let config = match serde_json::to_value(&self.config) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to serialize agent config for snapshot");
                Value::Null
            }
        };
        let last_extra = self
            .recorder
            .last()
            .map(|message| message.extra.clone())
            .unwrap_or_default();
        json!({
            "model_stats": {
                "instance_cost": self.cost,
                "api_calls": self.n_calls,
            },
            "config": {
                "agent": config,
                "agent_type": self.agent_type,
            },
            "version": env!("CARGO_PKG_VERSION"),
            "exit_status": last_extra.get("exit_status").cloned().unwrap_or(json!("")),
            "submission": last_extra.get("submission").cloned().unwrap_or(json!("")),
        })
    }

    fn resolve_context_window(&mut self) {
        let Some(model_name) = self.model.model_name() else {
            return;
        };
        self.context.resolve(&model_name);
    }

    fn record_failure(&mut self, error: &Error) {
        warn!(error = %error, "Unhandled error, recording failed run");
        let mut extra = Map::new();
        extra.insert("exit_status".into(), Value::String(error.category().into()));
        extra.insert("submission".into(), Value::String(String::new()));
        extra.insert("exception".into(), Value::String(error.to_string()));
        extra.insert(
            "backtrace".into(),
            Value::String(Backtrace::force_capture().to_string()),
        );
        let exit = self
            .model
            .format_message(Role::Exit, &error.to_string(), extra);
        self.recorder.append(vec![exit]);
    }

    fn checkpoint(&self) {
        self.save(self.config.output_path.as_deref(), &[]);
    }
}
