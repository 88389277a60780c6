//! Reactor (C6): three fixed-size worker pools — step, effector, compute —
//! plus the glue that parks a request on a `Need`, dispatches its effects,
//! and resumes it once the join latches.
//!
//! Workers never block on I/O. Step workers only ever wait on the step
//! queue's dequeue; effector/compute workers await handler futures and the
//! connection-pool lease (C10), never a raw blocking syscall.

use crate::context::RequestContext;
use crate::effects::{self, Dispatcher, EffectResult, ResolvedEffect, RuntimeContext};
use crate::error::Error;
use crate::join::JoinState;
use crate::queue::{ExecutionContext, JoinTable, ParkedTable, QueueFull, RunState, StepQueue, Terminal};
use crate::types::{EffectKind, Need};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy)]
pub struct ReactorConfig {
    pub step_workers: usize,
    pub effector_workers: usize,
    pub compute_workers: usize,
    pub step_queue_capacity: usize,
    pub effector_queue_capacity: usize,
    pub compute_queue_capacity: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            step_workers: 4,
            effector_workers: 8,
            compute_workers: 2,
            step_queue_capacity: 1024,
            effector_queue_capacity: 1024,
            compute_queue_capacity: 256,
        }
    }
}

enum PoolKind {
    Effector,
    Compute,
}

fn effect_pool(kind: &EffectKind) -> PoolKind {
    match kind {
        EffectKind::Compute { .. } => PoolKind::Compute,
        _ => PoolKind::Effector,
    }
}

struct EffectJob {
    exec_id: u64,
    token: crate::types::SlotToken,
    required: bool,
    timeout_ms: u64,
    resolved: ResolvedEffect,
    tag: &'static str,
    retry: Option<crate::types::RetryPolicy>,
    join: Arc<JoinState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    QueueFull,
    ShuttingDown,
}

/// The running reactor: owns the step queue and the two effect job
/// channels, and the bookkeeping tables for parked requests.
#[derive(Clone)]
pub struct Reactor {
    config: ReactorConfig,
    step_queue: StepQueue,
    effector_tx: mpsc::Sender<EffectJob>,
    compute_tx: mpsc::Sender<EffectJob>,
    parked: ParkedTable,
    joins: JoinTable,
    dispatcher: Dispatcher,
    runtime_ctx: RuntimeContext,
    shutting_down: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Reactor {
    pub fn start(config: ReactorConfig, dispatcher: Dispatcher, runtime_ctx: RuntimeContext) -> Self {
        let step_queue = StepQueue::bounded(config.step_queue_capacity);
        let (effector_tx, effector_rx) = mpsc::channel(config.effector_queue_capacity);
        let (compute_tx, compute_rx) = mpsc::channel(config.compute_queue_capacity);

        let reactor = Self {
            config,
            step_queue,
            effector_tx,
            compute_tx,
            parked: Arc::new(std::sync::Mutex::new(HashMap::new())),
            joins: Arc::new(std::sync::Mutex::new(HashMap::new())),
            dispatcher,
            runtime_ctx,
            shutting_down: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        };

        reactor.spawn_step_workers();
        reactor.spawn_effect_workers(effector_rx, config.effector_workers, "effector");
        reactor.spawn_effect_workers(compute_rx, config.compute_workers, "compute");

        reactor
    }

    pub fn step_queue(&self) -> &StepQueue {
        &self.step_queue
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.cancel.cancel();
    }

    fn spawn_step_workers(&self) {
        for worker_id in 0..self.config.step_workers {
            let queue = self.step_queue.clone();
            let reactor = self.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                loop {
                    let exec = tokio::select! {
                        _ = cancel.cancelled() => break,
                        exec = queue.recv() => exec,
                    };
                    let Some(mut exec) = exec else { break };
                    debug!(worker_id, exec_id = exec.id, "step worker picked up request");
                    reactor.run_one_tick(&mut exec).await;
                }
            });
        }
    }

    fn spawn_effect_workers(&self, rx: mpsc::Receiver<EffectJob>, worker_count: usize, pool_name: &'static str) {
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        for worker_id in 0..worker_count {
            let rx = rx.clone();
            let reactor = self.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            job = guard.recv() => job,
                        }
                    };
                    let Some(job) = job else { break };
                    debug!(worker_id, pool = pool_name, exec_id = job.exec_id, tag = job.tag, "effector worker running job");
                    reactor.run_effect_job(job).await;
                }
            });
        }
    }

    /// Advance a just-dequeued (or just-resumed) request one "tick":
    /// either drives it to completion/parking, or (if resuming) picks up
    /// where its continuation left off.
    async fn run_one_tick(&self, exec: &mut Box<ExecutionContext>) {
        exec.state = RunState::Running;
        let outcome = crate::executor::drive(exec);
        match outcome {
            crate::executor::StepOutcome::Continue => unreachable!("drive() never returns mid-loop"),
            crate::executor::StepOutcome::Terminal(terminal) => {
                exec.state = match &terminal {
                    Terminal::Done(_) => RunState::Completed,
                    Terminal::Fail(_) => RunState::Failed,
                };
                self.finish(std::mem::replace(exec, placeholder_exec()), terminal);
            }
            crate::executor::StepOutcome::Parked(need) => {
                exec.state = RunState::Waiting;
                self.park_and_dispatch(exec, need).await;
            }
        }
    }

    fn finish(&self, mut exec: Box<ExecutionContext>, terminal: Terminal) {
        exec.ctx.run_exit_callbacks();
        let response = match terminal {
            Terminal::Done(r) => r,
            Terminal::Fail(e) => {
                warn!(exec_id = exec.id, error = %e, "request failed");
                crate::types::Response::json(e.kind.status(), &e.to_json())
                    .unwrap_or_else(|_| crate::types::Response::new(500, "internal error"))
            }
        };
        if let Some(tx) = exec.result_tx.take() {
            let _ = tx.send(response);
        }
    }

    async fn park_and_dispatch(&self, exec: &mut Box<ExecutionContext>, need: Need) {
        let Need { effects, mode, join, continuation } = need;
        exec.pending_continuation = Some(continuation);

        let mut resolved_effects = Vec::with_capacity(effects.len());
        for effect in &effects {
            match effects::resolve(&exec.ctx, effect) {
                Ok(resolved) => resolved_effects.push(Some(resolved)),
                Err(e) => {
                    // A param that fails to resolve is treated as an
                    // immediately-failed effect for join purposes.
                    error!(exec_id = exec.id, error = %e, "effect param resolution failed");
                    resolved_effects.push(None);
                }
            }
        }

        let join_state = Arc::new(JoinState::new(join, &effects));
        let exec_id = exec.id;
        self.joins.lock().expect("joins mutex poisoned").insert(exec_id, join_state.clone());

        // Sequential mode only constrains submission order to the pools,
        // matching §4.8 — the join policy alone governs resume timing.
        let _ = mode;

        // The context must already be visible in `parked` before a single
        // effect job reaches a worker pool. Worker tasks run concurrently
        // with this function once `try_send` succeeds, and a worker that
        // finishes its job before we return here calls `resume`, which
        // only finds (and can therefore resume) a context that is already
        // in this table. Inserting after dispatch leaves a window where a
        // fast completion finds nothing, silently drops its result, and —
        // because the join has already latched — strands the request
        // forever once the context is finally inserted. Insert first.
        let owned = std::mem::replace(exec, placeholder_exec());
        self.parked.lock().expect("parked mutex poisoned").insert(exec_id, owned);

        let mut immediate_resumes = Vec::new();
        for (effect, resolved) in effects.iter().zip(resolved_effects.into_iter()) {
            match resolved {
                Some(resolved) => {
                    let job = EffectJob {
                        exec_id,
                        token: effect.token,
                        required: effect.required,
                        timeout_ms: effect.timeout_ms,
                        tag: effect.kind.tag(),
                        resolved,
                        retry: effect.retry,
                        join: join_state.clone(),
                    };
                    let submitted = match effect_pool(&effect.kind) {
                        PoolKind::Effector => self.effector_tx.try_send(job),
                        PoolKind::Compute => self.compute_tx.try_send(job),
                    };
                    if let Err(e) = submitted {
                        warn!(exec_id, tag = effect.kind.tag(), "effect pool saturated, failing effect");
                        if let Some(status) = join_state.record_completion(effect.required, false) {
                            immediate_resumes.push(status);
                        }
                        drop(e);
                    }
                }
                None => {
                    if let Some(status) = join_state.record_completion(effect.required, false) {
                        immediate_resumes.push(status);
                    }
                }
            }
        }

        for status in immediate_resumes {
            self.resume(exec_id, status).await;
        }
    }

    /// Run a handler to completion, retrying per `job.retry` on failure.
    /// Retries happen one at a time within this single job — a `Need`'s
    /// effects are never re-submitted to a pool mid-retry, so two attempts
    /// at the same effect (and its `idempotency_key`, if any) never run
    /// concurrently with each other.
    async fn run_handler_with_retry(&self, handler: &effects::HandlerFn, job: &EffectJob) -> EffectResult {
        let max_attempts = job.retry.map(|r| r.max_attempts).unwrap_or(1).max(1);
        let backoff = job.retry.map(|r| r.backoff).unwrap_or_default();

        let mut attempt = 1;
        loop {
            let fut = handler(self.runtime_ctx.clone(), job.resolved.clone());
            let outcome = match timeout(Duration::from_millis(job.timeout_ms), fut).await {
                Ok(result) => result,
                Err(_) => EffectResult::Failure(Error::upstream_unavailable("effect_timeout", job.tag)),
            };
            if outcome.is_success() || attempt >= max_attempts {
                return outcome;
            }
            warn!(exec_id = job.exec_id, tag = job.tag, attempt, max_attempts, "effect failed, retrying after backoff");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn run_effect_job(&self, job: EffectJob) {
        let handler = self.dispatcher.handler_for(job.tag);
        let result = match handler {
            Some(handler) => self.run_handler_with_retry(&handler, &job).await,
            None => EffectResult::Failure(Error::internal("effect_handler", format!("unregistered:{}", job.tag))),
        };

        let success = result.is_success();
        {
            let mut table = self.parked.lock().expect("parked mutex poisoned");
            if let Some(exec) = table.get_mut(&job.exec_id) {
                match result {
                    EffectResult::Success(bytes) => exec.ctx.slot_put(job.token, bytes),
                    EffectResult::Failure(err) => exec.ctx.slot_put(job.token, err),
                }
            }
        }

        if let Some(status) = job.join.record_completion(job.required, success) {
            self.resume(job.exec_id, status).await;
        }
    }

    async fn resume(&self, exec_id: u64, status: crate::join::ResumeStatus) {
        self.joins.lock().expect("joins mutex poisoned").remove(&exec_id);
        let exec = self.parked.lock().expect("parked mutex poisoned").remove(&exec_id);
        let Some(mut exec) = exec else {
            // Already resumed by a racing completion, or evicted by shutdown.
            return;
        };
        exec.state = RunState::Resuming;
        exec.resume_status = Some(status);
        if self.shutting_down.load(Ordering::Acquire) {
            self.finish(exec, Terminal::Fail(Error::shutdown("reactor", "shutting_down")));
            return;
        }
        self.step_queue.submit(exec).await;
    }

    pub async fn submit_new(&self, exec: Box<ExecutionContext>) -> Result<(), SubmitError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(SubmitError::ShuttingDown);
        }
        self.step_queue.try_submit(exec).map_err(|QueueFull| SubmitError::QueueFull)
    }
}

/// A cheap placeholder used only to satisfy `mem::replace` when moving an
/// `ExecutionContext` out of a `&mut Box<ExecutionContext>` slot that is
/// about to be discarded. Never observed by user code.
fn placeholder_exec() -> Box<ExecutionContext> {
    let (tx, _rx) = tokio::sync::oneshot::channel();
    Box::new(ExecutionContext::new(
        RequestContext::new(
            crate::context::ParsedRequest {
                method: http::Method::GET,
                path: String::new(),
                headers: vec![],
                query: Default::default(),
                body: bytes::Bytes::new(),
                client_ip: None,
            },
            String::new(),
        ),
        Arc::new(vec![]),
        crate::queue::PhaseBounds { global_before_end: 0, route_before_end: 0 },
        tx,
    ))
}
