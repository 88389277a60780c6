//! Step queue + execution context (C9): the MPMC FIFO of in-flight
//! requests and the park/resume protocol that keeps parked requests off
//! the queue entirely while their effects are outstanding.

use crate::context::RequestContext;
use crate::join::{JoinState, ResumeStatus};
use crate::types::{ContinuationFn, Step};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

use crate::types::Response;

pub type ExecId = u64;

static NEXT_EXEC_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_exec_id() -> ExecId {
    NEXT_EXEC_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Running,
    Waiting,
    Resuming,
    Completed,
    Failed,
}

/// Marks where `global_before` ends and `route.before` ends within the
/// flattened step list, so the executor can tell which phase produced a
/// given `Decision` for logging purposes.
#[derive(Debug, Clone, Copy)]
pub struct PhaseBounds {
    pub global_before_end: usize,
    pub route_before_end: usize,
}

pub const RECURSION_LIMIT: u32 = 1000;

/// One in-flight request's full state: its context, its flattened step
/// list, and where it currently is in that list.
pub struct ExecutionContext {
    pub id: ExecId,
    pub ctx: RequestContext,
    pub steps: Arc<Vec<Step>>,
    pub phase_bounds: PhaseBounds,
    pub index: usize,
    pub depth: u32,
    pub state: RunState,
    pub resume_status: Option<ResumeStatus>,
    pub pending_continuation: Option<ContinuationFn>,
    pub terminal: Option<Terminal>,
    pub result_tx: Option<oneshot::Sender<Response>>,
}

pub enum Terminal {
    Done(Response),
    Fail(crate::error::Error),
}

impl ExecutionContext {
    pub fn new(
        ctx: RequestContext,
        steps: Arc<Vec<Step>>,
        phase_bounds: PhaseBounds,
        result_tx: oneshot::Sender<Response>,
    ) -> Self {
        Self {
            id: next_exec_id(),
            ctx,
            steps,
            phase_bounds,
            index: 0,
            depth: 0,
            state: RunState::Ready,
            resume_status: None,
            pending_continuation: None,
            terminal: None,
            result_tx: Some(result_tx),
        }
    }
}

/// Table of requests parked on an outstanding `Need`. A parked context is
/// never present in the step queue — property required for the "parked
/// requests are absent from the queue" testable guarantee.
pub type ParkedTable = Arc<Mutex<HashMap<ExecId, Box<ExecutionContext>>>>;

/// Registry of join states for outstanding `Need`s, keyed by exec id. One
/// entry per currently-parked request.
pub type JoinTable = Arc<Mutex<HashMap<ExecId, Arc<JoinState>>>>;

/// The step queue: an MPMC FIFO of execution contexts ready to run,
/// modeled as a Tokio `mpsc` channel shared by all step workers through a
/// guarded receiver.
#[derive(Clone)]
pub struct StepQueue {
    tx: mpsc::Sender<Box<ExecutionContext>>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Box<ExecutionContext>>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl StepQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }

    pub fn try_submit(&self, exec: Box<ExecutionContext>) -> Result<(), QueueFull> {
        self.tx.try_send(exec).map_err(|_| QueueFull)
    }

    pub async fn submit(&self, exec: Box<ExecutionContext>) {
        // Producers here are internal (resume path); a closed receiver
        // means the reactor has already shut down.
        let _ = self.tx.send(exec).await;
    }

    /// Pull the next ready context off the queue. Multiple workers can
    /// call this concurrently; the shared receiver serializes dequeues
    /// without serializing the work done with each context.
    pub async fn recv(&self) -> Option<Box<ExecutionContext>> {
        self.rx.lock().await.recv().await
    }
}
