//! Type kernel (C1): the sum types every other component is built from.
//!
//! Pure data, no I/O. `Step` bodies are plain function pointers — by design
//! they cannot close over mutable state, so a step chain can be replayed or
//! inspected without worrying about captured references.

use crate::context::RequestContext;
use crate::error::Error;
use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;
use std::time::Duration;

/// A 32-bit per-feature token identifying a slot in the request context.
///
/// Tokens are the only names the effect layer understands — steps never
/// pass Rust references to each other, only tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotToken(pub u32);

impl SlotToken {
    pub const fn new(id: u32) -> Self {
        SlotToken(id)
    }
}

/// HTTP method. Re-exported from `http` rather than reinvented — the wire
/// parser (out of scope here) is expected to hand back `http::Method` values.
pub type Method = http::Method;

/// One HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Complete(body.into()),
        }
    }

    pub fn json(status: u16, value: &impl serde::Serialize) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| Error::internal("response", e.to_string()))?;
        Ok(Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Body::Complete(Bytes::from(bytes)),
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `true` when this response streams its body (no `Content-Length`).
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Streaming { .. })
    }
}

/// A stream of response body chunks, used for `Body::Streaming`.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

pub enum Body {
    Complete(Bytes),
    Streaming {
        stream: BodyStream,
        content_type: String,
        is_sse: bool,
    },
}

impl Clone for Body {
    fn clone(&self) -> Self {
        match self {
            Body::Complete(b) => Body::Complete(b.clone()),
            // Streaming bodies are single-consumption; cloning a Response
            // that carries one replaces it with an already-exhausted stream.
            Body::Streaming { content_type, is_sse, .. } => Body::Streaming {
                stream: Box::pin(futures_util::stream::empty()),
                content_type: content_type.clone(),
                is_sse: *is_sse,
            },
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Complete(b) => f.debug_tuple("Complete").field(&b.len()).finish(),
            Body::Streaming { content_type, is_sse, .. } => f
                .debug_struct("Streaming")
                .field("content_type", content_type)
                .field("is_sse", is_sse)
                .finish(),
        }
    }
}

/// Dispatch mode for the effects within one [`Need`].
///
/// `Sequential` only constrains dispatch order to the effector/compute
/// pools; it does not by itself constrain when completions may resume the
/// continuation — that is entirely the join policy's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sequential,
    Parallel,
}

/// Resolver policy deciding when a `Need` resumes (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    All,
    AllRequired,
    Any,
    FirstSuccess,
}

/// A late-bound effect parameter: either an inline value or a reference to
/// a slot, resolved against the request context at dispatch time.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Inline(serde_json::Value),
    SlotRef(SlotToken),
}

impl ParamValue {
    pub fn inline(value: impl Into<serde_json::Value>) -> Self {
        ParamValue::Inline(value.into())
    }
}

/// Retry policy attached to an effect.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts, backoff }
    }
}

/// Tagged-union payload of an effect. Every variant is a declarative
/// description of an I/O or compute action; none of them perform I/O
/// themselves — a registered handler (C7) interprets the payload.
#[derive(Debug, Clone)]
pub enum EffectKind {
    HttpRequest {
        method: Method,
        url: ParamValue,
        headers: Vec<(String, ParamValue)>,
        body: Option<ParamValue>,
    },
    KvGet { key: ParamValue },
    KvPut { key: ParamValue, value: ParamValue },
    KvDel { key: ParamValue },
    KvScan { prefix: ParamValue },
    DbQuery { sql: String, params: Vec<ParamValue> },
    FileJsonRead { path: ParamValue },
    FileJsonWrite { path: ParamValue, value: ParamValue },
    Compute { task: String, payload: ParamValue },
    CacheGet { key: ParamValue },
    CacheSet { key: ParamValue, value: ParamValue, ttl_ms: Option<u64> },
    CacheDel { key: ParamValue },
    TcpConnect { addr: ParamValue },
    TcpSend { conn: ParamValue, bytes: ParamValue },
    TcpReceive { conn: ParamValue },
    TcpClose { conn: ParamValue },
    GrpcUnary { service: String, method: String, payload: ParamValue },
    GrpcServerStream { service: String, method: String, payload: ParamValue },
    WsConnect { url: ParamValue },
    WsSend { conn: ParamValue, message: ParamValue },
    WsReceive { conn: ParamValue },
}

impl EffectKind {
    /// The handler-registry key for this variant. Stable across a process;
    /// used both for dispatcher lookup and for `ctx = {what:"effect", key}`
    /// error reporting.
    pub fn tag(&self) -> &'static str {
        match self {
            EffectKind::HttpRequest { .. } => "http.request",
            EffectKind::KvGet { .. } => "kv.get",
            EffectKind::KvPut { .. } => "kv.put",
            EffectKind::KvDel { .. } => "kv.del",
            EffectKind::KvScan { .. } => "kv.scan",
            EffectKind::DbQuery { .. } => "db.query",
            EffectKind::FileJsonRead { .. } => "file.json_read",
            EffectKind::FileJsonWrite { .. } => "file.json_write",
            EffectKind::Compute { .. } => "compute.task",
            EffectKind::CacheGet { .. } => "cache.get",
            EffectKind::CacheSet { .. } => "cache.set",
            EffectKind::CacheDel { .. } => "cache.del",
            EffectKind::TcpConnect { .. } => "tcp.connect",
            EffectKind::TcpSend { .. } => "tcp.send",
            EffectKind::TcpReceive { .. } => "tcp.receive",
            EffectKind::TcpClose { .. } => "tcp.close",
            EffectKind::GrpcUnary { .. } => "grpc.unary",
            EffectKind::GrpcServerStream { .. } => "grpc.server_stream",
            EffectKind::WsConnect { .. } => "ws.connect",
            EffectKind::WsSend { .. } => "ws.send",
            EffectKind::WsReceive { .. } => "ws.receive",
        }
    }
}

/// A declarative effect: the payload plus the bookkeeping every variant
/// carries regardless of kind (§3).
#[derive(Debug, Clone)]
pub struct Effect {
    pub kind: EffectKind,
    pub token: SlotToken,
    pub timeout_ms: u64,
    pub required: bool,
    pub idempotency_key: Option<String>,
    pub retry: Option<RetryPolicy>,
}

impl Effect {
    pub fn new(kind: EffectKind, token: SlotToken) -> Self {
        Self {
            kind,
            token,
            timeout_ms: 5_000,
            required: true,
            idempotency_key: None,
            retry: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// A continuation invoked once a `Need`'s join resolves. Modeled as a plain
/// function pointer (not a boxed closure) to keep the hot path
/// allocation-free; steps that must capture state should stash it in a slot
/// instead (see Design Notes on continuations).
pub type ContinuationFn = fn(&mut RequestContext) -> Decision;

/// A request to run a set of effects and then invoke a continuation.
#[derive(Clone)]
pub struct Need {
    pub effects: Vec<Effect>,
    pub mode: Mode,
    pub join: JoinPolicy,
    pub continuation: ContinuationFn,
}

/// The outcome of running one step.
#[derive(Clone)]
pub enum Decision {
    Continue,
    Done(Response),
    Fail(Error),
    Need(Need),
}

pub fn continue_() -> Decision {
    Decision::Continue
}

pub fn done(response: Response) -> Decision {
    Decision::Done(response)
}

pub fn fail(kind: crate::error::ErrorKind, what: impl Into<String>, key: impl Into<String>) -> Decision {
    Decision::Fail(Error::new(kind, what, key))
}

pub fn need(effects: Vec<Effect>, mode: Mode, join: JoinPolicy, continuation: ContinuationFn) -> Decision {
    Decision::Need(Need { effects, mode, join, continuation })
}

/// The function signature every step body implements.
pub type StepFn = fn(&mut RequestContext) -> Decision;

/// A named, pure unit of pipeline composition with declared slot access.
///
/// `reads`/`writes` are checked by the [typed view](crate::view) at step
/// construction and, for steps that bypass the view, re-checked at runtime
/// by the slot store itself (`AccessDenied` surfaces as `InternalError`).
#[derive(Clone, Copy)]
pub struct Step {
    pub name: &'static str,
    pub call: StepFn,
    pub reads: &'static [SlotToken],
    pub writes: &'static [SlotToken],
}

/// Build a step with no declared slot access (full access, checked only by
/// convention). Prefer [`ctx_view`] for steps that touch slots.
pub const fn step(name: &'static str, call: StepFn) -> Step {
    Step { name, call, reads: &[], writes: &[] }
}

/// Build a step with an explicit `{reads, writes}` access declaration.
pub const fn ctx_view(
    name: &'static str,
    reads: &'static [SlotToken],
    writes: &'static [SlotToken],
    call: StepFn,
) -> Step {
    Step { name, call, reads, writes }
}
