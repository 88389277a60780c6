//! Step engine (C5): advances one [`ExecutionContext`] by running steps in
//! order and interpreting each [`Decision`] until the chain parks on a
//! `Need` or reaches a terminal outcome.
//!
//! `drive` is synchronous and must never be awaited from inside — it is
//! the unit of work a step worker runs between queue dequeues.

use crate::error::Error;
use crate::queue::{ExecutionContext, Terminal, RECURSION_LIMIT};
use crate::types::{Decision, Need, Response};
use std::panic::AssertUnwindSafe;

pub enum StepOutcome {
    Continue,
    Parked(Need),
    Terminal(Terminal),
}

fn interpret(decision: std::thread::Result<Decision>, depth: &mut u32, step_name: &'static str) -> StepOutcome {
    match decision {
        Err(_) => StepOutcome::Terminal(Terminal::Fail(Error::internal("step_panic", step_name))),
        Ok(Decision::Continue) => StepOutcome::Continue,
        Ok(Decision::Done(response)) => StepOutcome::Terminal(Terminal::Done(response)),
        Ok(Decision::Fail(err)) => StepOutcome::Terminal(Terminal::Fail(err)),
        Ok(Decision::Need(need)) => {
            *depth += 1;
            if *depth > RECURSION_LIMIT {
                StepOutcome::Terminal(Terminal::Fail(Error::internal("recursion", "recursion_limit")))
            } else {
                StepOutcome::Parked(need)
            }
        }
    }
}

/// Default body for a step chain that runs to completion without any step
/// ever producing `Done`.
fn default_ok_response() -> Response {
    Response::new(200, "OK")
}

/// Run exactly one step (or the pending continuation, if resuming) and
/// report what happened — without looping. Exposed for testing; `drive`
/// is what the reactor actually calls.
fn step_once(exec: &mut ExecutionContext) -> StepOutcome {
    if let Some(continuation) = exec.pending_continuation.take() {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| continuation(&mut exec.ctx)));
        return interpret(result, &mut exec.depth, "<continuation>");
    }

    if exec.index >= exec.steps.len() {
        return StepOutcome::Terminal(Terminal::Done(default_ok_response()));
    }

    let step = exec.steps[exec.index];
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| (step.call)(&mut exec.ctx)));
    interpret(result, &mut exec.depth, step.name)
}

/// Drive `exec` forward, running steps synchronously, until it parks on a
/// `Need` or reaches a terminal state.
pub fn drive(exec: &mut ExecutionContext) -> StepOutcome {
    loop {
        match step_once(exec) {
            StepOutcome::Continue => {
                exec.index += 1;
                continue;
            }
            other => return other,
        }
    }
}
