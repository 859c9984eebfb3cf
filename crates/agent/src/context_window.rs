//! Context-window budget tracking.
//!
//! Knows how much of the model's context budget remains without the caller
//! hardcoding per-model limits. Window sizes live in a persisted name→size
//! map; unknown models can be resolved interactively once and the answer is
//! written back, so the cache heals itself over time.
//!
//! The map is a best-effort cache, not a source of truth: concurrent runs
//! may race on update (last writer wins) and reads tolerate missing or
//! partial content.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ironloop_core::message::{Message, Usage};
use serde_json::Value;
use tracing::{debug, warn};

/// Provider prefixes collapsed by [`normalize_model_name`].
const PROVIDER_PREFIXES: &[&str] = &[
    "openai/",
    "anthropic/",
    "google/",
    "mistral/",
    "deepseek/",
    "meta-llama/",
    "azure/",
    "openrouter/",
];

/// Normalize a model name for map lookup: lowercase, trim, and strip one
/// known provider prefix ("anthropic/claude-x" and "claude-x" hit the same
/// entry).
pub fn normalize_model_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    for prefix in PROVIDER_PREFIXES {
        if let Some(stripped) = lowered.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    lowered
}

/// The persisted model-name→context-size map.
///
/// Injected so tests (and embedders) can substitute an in-memory fake.
/// Updates are at-least-once with last-writer-wins semantics.
pub trait WindowStore: Send + Sync {
    /// Read the whole map. Missing or corrupt storage yields an empty map.
    fn load(&self) -> HashMap<String, u64>;

    /// Record one entry, rewriting the full map. Best-effort: failures are
    /// logged, never raised.
    fn insert(&self, model_name: &str, window: u64);
}

/// File-backed store: a JSON object of raw model name → context size.
pub struct JsonFileWindowStore {
    path: PathBuf,
}

impl JsonFileWindowStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: `~/.ironloop/context_windows.json`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".ironloop")
            .join("context_windows.json")
    }
}

impl WindowStore for JsonFileWindowStore {
    fn load(&self) -> HashMap<String, u64> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return HashMap::new(), // File doesn't exist yet
        };
        let parsed: Value = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt context window map");
                return HashMap::new();
            }
        };
        let Value::Object(entries) = parsed else {
            warn!(path = %self.path.display(), "Context window map is not an object, ignoring");
            return HashMap::new();
        };
        entries
            .into_iter()
            .filter_map(|(name, size)| match size.as_u64() {
                Some(size) => Some((name, size)),
                None => {
                    warn!(model = %name, "Skipping non-integer context window entry");
                    None
                }
            })
            .collect()
    }

    fn insert(&self, model_name: &str, window: u64) {
        let mut map = self.load();
        map.insert(model_name.to_string(), window);
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), error = %e, "Failed to create context window map directory");
                return;
            }
        }
        let sorted: std::collections::BTreeMap<_, _> = map.into_iter().collect();
        match serde_json::to_string_pretty(&sorted) {
            Ok(text) => {
                if let Err(e) = std::fs::write(&self.path, text) {
                    warn!(path = %self.path.display(), error = %e, "Failed to write context window map");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize context window map"),
        }
    }
}

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryWindowStore {
    entries: Mutex<HashMap<String, u64>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an entry.
    pub fn with_entry(self, model_name: &str, window: u64) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(model_name.to_string(), window);
        self
    }
}

impl WindowStore for MemoryWindowStore {
    fn load(&self) -> HashMap<String, u64> {
        self.entries.lock().unwrap().clone()
    }

    fn insert(&self, model_name: &str, window: u64) {
        self.entries
            .lock()
            .unwrap()
            .insert(model_name.to_string(), window);
    }
}

/// Fallback consulted on a cache miss, typically an interactive prompt.
pub trait WindowResolver: Send + Sync {
    /// Return the context size for `model_name`, or `None` if unknown.
    fn resolve_window(&self, model_name: &str) -> Option<u64>;
}

/// Where usage data was found in a response, in precedence order.
#[derive(Debug)]
enum UsageSource<'a> {
    /// `extra.response.usage` as a JSON mapping
    ResponseMap(&'a serde_json::Map<String, Value>),
    /// `extra.usage` as a JSON mapping
    MessageMap(&'a serde_json::Map<String, Value>),
    /// The typed `Message::usage` record
    Typed(&'a Usage),
}

impl UsageSource<'_> {
    fn prompt_tokens(&self) -> Option<u64> {
        match self {
            UsageSource::ResponseMap(map) | UsageSource::MessageMap(map) => {
                map.get("prompt_tokens").and_then(Value::as_u64)
            }
            UsageSource::Typed(usage) => Some(usage.prompt_tokens),
        }
    }
}

fn usage_source(message: &Message) -> Option<UsageSource<'_>> {
    if let Some(map) = message
        .extra
        .get("response")
        .and_then(Value::as_object)
        .and_then(|response| response.get("usage"))
        .and_then(Value::as_object)
    {
        return Some(UsageSource::ResponseMap(map));
    }
    if let Some(map) = message.extra.get("usage").and_then(Value::as_object) {
        return Some(UsageSource::MessageMap(map));
    }
    message.usage.as_ref().map(UsageSource::Typed)
}

/// Per-run context budget state.
///
/// Resolution happens at most once per run; the cached value never changes
/// within a run unless explicitly [`cleared`](Self::clear).
pub struct ContextWindowTracker {
    store: Arc<dyn WindowStore>,
    resolver: Option<Arc<dyn WindowResolver>>,
    max: Option<u64>,
    prompt_tokens: Option<u64>,
    left_percent: Option<u8>,
}

impl ContextWindowTracker {
    pub fn new(store: Arc<dyn WindowStore>) -> Self {
        Self {
            store,
            resolver: None,
            max: None,
            prompt_tokens: None,
            left_percent: None,
        }
    }

    /// Attach an interactive fallback for cache misses.
    pub fn with_resolver(mut self, resolver: Arc<dyn WindowResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The resolved context size, if known.
    pub fn max(&self) -> Option<u64> {
        self.max
    }

    /// Prompt tokens reported by the latest response.
    pub fn prompt_tokens(&self) -> Option<u64> {
        self.prompt_tokens
    }

    /// Remaining-context percentage from the latest response.
    pub fn left_percent(&self) -> Option<u8> {
        self.left_percent
    }

    /// Drop the cached window size so the next [`resolve`](Self::resolve)
    /// looks it up again.
    pub fn clear(&mut self) {
        self.max = None;
    }

    /// Resolve the context size for `model_name`, once per run.
    ///
    /// On a cache miss the injected resolver (if any) is consulted; a
    /// discovered value is written back keyed by the *original* name unless
    /// a normalized-equivalent key already exists, so aliases accumulate
    /// without clobbering a working entry.
    pub fn resolve(&mut self, model_name: &str) {
        if self.max.is_some() {
            return;
        }
        let model_name = model_name.trim();
        if model_name.is_empty() {
            return;
        }
        let map = self.store.load();
        let normalized = normalize_model_name(model_name);
        let mut resolved = map
            .iter()
            .find(|(key, _)| normalize_model_name(key) == normalized)
            .map(|(_, size)| *size);
        if resolved.is_none() {
            if let Some(resolver) = &self.resolver {
                resolved = resolver.resolve_window(model_name);
            }
        }
        let Some(window) = resolved else {
            debug!(model = model_name, "Context window unknown, budget tracking disabled");
            return;
        };
        self.max = Some(window);
        let already_known = map
            .keys()
            .any(|key| normalize_model_name(key) == normalized);
        if !already_known {
            self.store.insert(model_name, window);
        }
    }

    /// Extract prompt-token usage from a response and update the budget.
    ///
    /// Writes the remaining-context percentage onto the tracker and onto
    /// the message. Leaves everything unset when either the window size or
    /// the token count is unknown.
    pub fn note_usage(&mut self, message: &mut Message) -> Option<u8> {
        let prompt_tokens = usage_source(message)?.prompt_tokens()?;
        self.prompt_tokens = Some(prompt_tokens);
        let max = match self.max {
            Some(max) if max > 0 => max,
            _ => return None,
        };
        let left = (100.0 * (1.0 - prompt_tokens as f64 / max as f64)).round();
        let left = left.clamp(0.0, 100.0) as u8;
        self.left_percent = Some(left);
        message.context_left_percent = Some(left);
        Some(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironloop_core::message::Role;
    use serde_json::json;
    use tempfile::TempDir;

    struct FixedResolver(u64);

    impl WindowResolver for FixedResolver {
        fn resolve_window(&self, _model_name: &str) -> Option<u64> {
            Some(self.0)
        }
    }

    fn response_with_prompt_tokens(tokens: u64) -> Message {
        Message::assistant("ok").with_extra(
            "response",
            json!({"usage": {"prompt_tokens": tokens, "completion_tokens": 5}}),
        )
    }

    #[test]
    fn normalization_strips_provider_prefix_and_case() {
        assert_eq!(normalize_model_name("  Anthropic/Claude-X  "), "claude-x");
        assert_eq!(normalize_model_name("claude-x"), "claude-x");
        assert_eq!(normalize_model_name("openrouter/GPT-4o"), "gpt-4o");
        // Unknown prefix is kept
        assert_eq!(normalize_model_name("local/model"), "local/model");
    }

    #[test]
    fn resolve_hits_normalized_alias() {
        let store = Arc::new(MemoryWindowStore::new().with_entry("openai/gpt-4o", 128_000));
        let mut tracker = ContextWindowTracker::new(store);
        tracker.resolve("GPT-4o");
        assert_eq!(tracker.max(), Some(128_000));
    }

    #[test]
    fn resolve_caches_for_the_run() {
        let store = Arc::new(MemoryWindowStore::new().with_entry("m", 1000));
        let mut tracker = ContextWindowTracker::new(store.clone());
        tracker.resolve("m");
        assert_eq!(tracker.max(), Some(1000));

        // A store change is invisible until the cache is cleared
        store.insert("m", 2000);
        tracker.resolve("m");
        assert_eq!(tracker.max(), Some(1000));

        tracker.clear();
        tracker.resolve("m");
        assert_eq!(tracker.max(), Some(2000));
    }

    #[test]
    fn miss_without_resolver_stays_unknown() {
        let mut tracker = ContextWindowTracker::new(Arc::new(MemoryWindowStore::new()));
        tracker.resolve("mystery-model");
        assert_eq!(tracker.max(), None);

        let mut msg = response_with_prompt_tokens(500);
        assert_eq!(tracker.note_usage(&mut msg), None);
        assert_eq!(msg.context_left_percent, None);
        assert_eq!(tracker.prompt_tokens(), Some(500));
    }

    #[test]
    fn resolver_discovery_writes_back_original_name() {
        let store = Arc::new(MemoryWindowStore::new());
        let mut tracker =
            ContextWindowTracker::new(store.clone()).with_resolver(Arc::new(FixedResolver(8192)));
        tracker.resolve("Vendor/New-Model");
        assert_eq!(tracker.max(), Some(8192));
        // Keyed by the original, non-normalized name
        assert_eq!(store.load().get("Vendor/New-Model"), Some(&8192));
    }

    #[test]
    fn known_alias_is_not_overwritten() {
        let store = Arc::new(MemoryWindowStore::new().with_entry("anthropic/claude-x", 200_000));
        let mut tracker =
            ContextWindowTracker::new(store.clone()).with_resolver(Arc::new(FixedResolver(1)));
        tracker.resolve("CLAUDE-X");
        assert_eq!(tracker.max(), Some(200_000));
        // No second key accumulated for a normalized-equivalent alias
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn budget_percentages_match_contract() {
        let store = Arc::new(MemoryWindowStore::new().with_entry("m", 1000));
        let mut tracker = ContextWindowTracker::new(store);
        tracker.resolve("m");

        let mut msg = response_with_prompt_tokens(250);
        assert_eq!(tracker.note_usage(&mut msg), Some(75));
        assert_eq!(msg.context_left_percent, Some(75));

        let mut msg = response_with_prompt_tokens(1000);
        assert_eq!(tracker.note_usage(&mut msg), Some(0));

        // Overflow clamps to zero, never negative
        let mut msg = response_with_prompt_tokens(1200);
        assert_eq!(tracker.note_usage(&mut msg), Some(0));
        assert_eq!(tracker.left_percent(), Some(0));
    }

    #[test]
    fn usage_extraction_precedence() {
        // extra.response.usage wins over extra.usage and the typed record
        let mut msg = Message::assistant("ok")
            .with_extra("response", json!({"usage": {"prompt_tokens": 100}}))
            .with_extra("usage", json!({"prompt_tokens": 900}));
        msg.usage = Some(Usage {
            prompt_tokens: 800,
            ..Usage::default()
        });
        assert_eq!(usage_source(&msg).unwrap().prompt_tokens(), Some(100));

        // Then extra.usage
        let msg = Message::assistant("ok").with_extra("usage", json!({"prompt_tokens": 900}));
        assert_eq!(usage_source(&msg).unwrap().prompt_tokens(), Some(900));

        // Then the typed record
        let mut msg = Message::new(Role::Assistant, "ok");
        msg.usage = Some(Usage {
            prompt_tokens: 800,
            ..Usage::default()
        });
        assert_eq!(usage_source(&msg).unwrap().prompt_tokens(), Some(800));

        // Absent everywhere
        assert!(usage_source(&Message::assistant("ok")).is_none());
    }

    #[test]
    fn first_source_short_circuits_even_without_tokens() {
        // A present-but-empty response.usage shadows a later usable source
        let msg = Message::assistant("ok")
            .with_extra("response", json!({"usage": {}}))
            .with_extra("usage", json!({"prompt_tokens": 900}));
        assert_eq!(usage_source(&msg).unwrap().prompt_tokens(), None);
    }

    #[test]
    fn file_store_roundtrip_and_tolerance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("windows.json");
        let store = JsonFileWindowStore::new(path.clone());

        // Missing file reads empty
        assert!(store.load().is_empty());

        store.insert("model-a", 4096);
        store.insert("model-b", 8192);
        let map = store.load();
        assert_eq!(map.get("model-a"), Some(&4096));
        assert_eq!(map.get("model-b"), Some(&8192));

        // Partial entries are skipped, not fatal
        std::fs::write(&path, r#"{"good": 100, "bad": "not a number"}"#).unwrap();
        let map = store.load();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("good"), Some(&100));

        // Corrupt file reads empty
        std::fs::write(&path, "not json at all").unwrap();
        assert!(store.load().is_empty());
    }
}
