//! Inbound requests from the operator surface.
//!
//! The web/UI collaborator never commands a relay.  It drops requests on
//! the [`RequestDesk`] during its service slot; the controller drains the
//! desk on the same cooperative step.
//!
//! Start and stop requests are two-step: the first arms a [`PromptGate`],
//! and only a confirmation inside the prompt window turns it into a
//! [`Directive`] for the next decision point.

use heapless::Deque;
use serde::{Deserialize, Serialize};

use crate::config::ConfigUpdate;

use super::ports::ConfigError;

/// Most requests of each kind held between two steps.
pub const REQUEST_QUEUE_DEPTH: usize = 8;

/// How long an armed prompt waits for confirmation.
pub const PROMPT_TIMEOUT_MS: u64 = 15_000;

/// An operator intent, exactly as entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideIntent {
    ForceStart,
    ForceStopOrRest,
    ToggleAtHome,
    ConfirmPendingPrompt,
}

/// A confirmed override, consumed at most once by a decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    StartNow,
    StopOrRest,
}

// ───────────────────────────────────────────────────────────────
// Prompt gate
// ───────────────────────────────────────────────────────────────

/// Holds at most one armed prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptGate {
    armed: Option<(Directive, u64)>,
}

impl PromptGate {
    /// Arm (or re-arm) the prompt.  A newer request replaces an older one.
    pub fn arm(&mut self, directive: Directive, now_ms: u64) {
        self.armed = Some((directive, now_ms));
    }

    /// Confirm the armed prompt if it has not expired.
    pub fn confirm(&mut self, now_ms: u64) -> Option<Directive> {
        self.expire(now_ms);
        self.armed.take().map(|(d, _)| d)
    }

    /// The directive awaiting confirmation, if still live.
    pub fn pending(&self, now_ms: u64) -> Option<Directive> {
        self.armed
            .filter(|&(_, at)| now_ms.saturating_sub(at) < PROMPT_TIMEOUT_MS)
            .map(|(d, _)| d)
    }

    pub fn expire(&mut self, now_ms: u64) {
        if self.pending(now_ms).is_none() {
            self.armed = None;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Request desk
// ───────────────────────────────────────────────────────────────

/// Bounded inbox shared with the operator collaborator.
#[derive(Debug, Default)]
pub struct RequestDesk {
    intents: Deque<OverrideIntent, REQUEST_QUEUE_DEPTH>,
    updates: Deque<ConfigUpdate, REQUEST_QUEUE_DEPTH>,
}

impl RequestDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an override intent.  Returns `false` if the queue is full.
    pub fn push_override(&mut self, intent: OverrideIntent) -> bool {
        self.intents.push_back(intent).is_ok()
    }

    /// Queue a config update after checking its bounds.
    pub fn update_config(&mut self, update: ConfigUpdate) -> Result<(), ConfigError> {
        update.check()?;
        self.updates
            .push_back(update)
            .map_err(|_| ConfigError::Busy)
    }

    pub fn next_override(&mut self) -> Option<OverrideIntent> {
        self.intents.pop_front()
    }

    pub fn next_update(&mut self) -> Option<ConfigUpdate> {
        self.updates.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.updates.is_empty()
    }
}
