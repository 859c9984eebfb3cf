//! Step and cost limit enforcement.
//!
//! Checked before every model query. Hitting a limit is expected
//! termination, not a failure: the check hands back a synthetic exit message
//! so downstream handling is uniform with a model-produced exit.

use ironloop_core::message::Message;

use crate::config::AgentConfig;

/// Exit status recorded when a resource limit stops the run.
pub const LIMITS_EXCEEDED: &str = "LimitsExceeded";

/// Pure limit state: no side effects, just a check.
#[derive(Debug, Clone, Copy)]
pub struct LimitTracker {
    step_limit: u32,
    cost_limit: f64,
}

/// Outcome of a limit check.
#[derive(Debug, Clone)]
pub enum LimitCheck {
    /// Within budget, proceed with the query
    Within,
    /// A limit was hit; carries the terminal message to append
    Exceeded(Message),
}

impl LimitTracker {
    /// Create a tracker. A `step_limit` of 0 and a `cost_limit` of 0 or
    /// below each disable that limit.
    pub fn new(step_limit: u32, cost_limit: f64) -> Self {
        Self {
            step_limit,
            cost_limit,
        }
    }

    /// Build from the run config.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.step_limit, config.cost_limit)
    }

    /// Check the counters the loop has accumulated so far.
    pub fn check(&self, n_calls: u32, cost: f64) -> LimitCheck {
        let steps_hit = self.step_limit > 0 && n_calls >= self.step_limit;
        let cost_hit = self.cost_limit > 0.0 && cost >= self.cost_limit;
        if steps_hit || cost_hit {
            LimitCheck::Exceeded(Message::exit(LIMITS_EXCEEDED, LIMITS_EXCEEDED, ""))
        } else {
            LimitCheck::Within
        }
    }
}
