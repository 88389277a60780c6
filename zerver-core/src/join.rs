//! Join resolver (C8): decides when a `Need`'s effects have resolved enough
//! to resume its continuation, per the policy table in §4.8.
//!
//! Implemented as a mutex-guarded state machine rather than a lock-free
//! counter set — the policies are small and branchy enough that a lock
//! makes the "latches exactly once" guarantee easy to see by inspection,
//! and `record_completion` is called at most once per effect, so
//! contention is never more than the effect fan-out width.

use crate::types::{Effect, JoinPolicy};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStatus {
    Success,
    Failure,
}

struct Inner {
    outstanding: usize,
    required_remaining: usize,
    any_required_failure: bool,
    any_success: bool,
    latched: bool,
}

/// Per-`Need` join state. One instance is created when a `Need`'s effects
/// are dispatched and dropped once the join latches and the continuation
/// has been scheduled.
pub struct JoinState {
    policy: JoinPolicy,
    inner: Mutex<Inner>,
}

impl JoinState {
    pub fn new(policy: JoinPolicy, effects: &[Effect]) -> Self {
        let required_total = effects.iter().filter(|e| e.required).count();
        Self {
            policy,
            inner: Mutex::new(Inner {
                outstanding: effects.len(),
                required_remaining: required_total,
                any_required_failure: false,
                any_success: false,
                latched: false,
            }),
        }
    }

    /// Record one effect's completion. Returns `Some(status)` exactly once,
    /// on the call that satisfies the join; every other call (including
    /// ones after latching) returns `None`.
    pub fn record_completion(&self, required: bool, success: bool) -> Option<ResumeStatus> {
        let mut g = self.inner.lock().expect("join state mutex poisoned");
        if g.latched {
            return None;
        }

        g.outstanding = g.outstanding.saturating_sub(1);
        if required {
            g.required_remaining = g.required_remaining.saturating_sub(1);
            if !success {
                g.any_required_failure = true;
            }
        }
        if success {
            g.any_success = true;
        }

        let resume = match self.policy {
            JoinPolicy::All => {
                if g.any_required_failure {
                    Some(ResumeStatus::Failure)
                } else if g.outstanding == 0 {
                    Some(ResumeStatus::Success)
                } else {
                    None
                }
            }
            JoinPolicy::AllRequired => {
                if g.any_required_failure {
                    Some(ResumeStatus::Failure)
                } else if g.required_remaining == 0 {
                    Some(ResumeStatus::Success)
                } else {
                    None
                }
            }
            JoinPolicy::Any => Some(if success {
                ResumeStatus::Success
            } else {
                ResumeStatus::Failure
            }),
            JoinPolicy::FirstSuccess => {
                if success {
                    Some(ResumeStatus::Success)
                } else if required && !g.any_success {
                    Some(ResumeStatus::Failure)
                } else if g.outstanding == 0 && !g.any_success {
                    Some(ResumeStatus::Failure)
                } else {
                    None
                }
            }
        };

        if resume.is_some() {
            g.latched = true;
        }
        resume
    }
}
