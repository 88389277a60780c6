//! Effect dispatcher (C7): a registry mapping an effect's tag to a
//! handler, plus the slot-value resolution that turns a declarative
//! [`Effect`] into bytes a handler can act on.

use crate::context::RequestContext;
use crate::error::Error;
use crate::types::{Effect, EffectKind, ParamValue};
use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Shared, request-independent state passed to every effect handler.
/// Handlers that need a connection pool or other resource capture it in
/// their own closure state at registration time — this stays minimal.
#[derive(Clone)]
pub struct RuntimeContext {
    pub config: Arc<crate::config::ZerverConfig>,
}

pub enum EffectResult {
    Success(Bytes),
    Failure(Error),
}

impl EffectResult {
    pub fn is_success(&self) -> bool {
        matches!(self, EffectResult::Success(_))
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = EffectResult> + Send>>;
pub type HandlerFn = Arc<dyn Fn(RuntimeContext, ResolvedEffect) -> HandlerFuture + Send + Sync>;

/// An [`Effect`] with every [`ParamValue::SlotRef`] resolved against the
/// owning request's slots, taken while the worker still holds the context
/// synchronously (i.e. before the request parks).
#[derive(Clone)]
pub struct ResolvedEffect {
    pub kind: EffectKind,
    pub resolved_params: Vec<(String, serde_json::Value)>,
}

/// Resolve every `ParamValue` reachable from an effect's kind against the
/// owning context's slots. Slot-valued params are looked up as
/// `serde_json::Value` (the lowest common denominator a handler can match
/// on); typed slots used elsewhere in the pipeline are unaffected.
fn resolve_param(ctx: &RequestContext, name: &str, value: &ParamValue, out: &mut Vec<(String, serde_json::Value)>) -> Result<(), Error> {
    let resolved = match value {
        ParamValue::Inline(v) => v.clone(),
        ParamValue::SlotRef(token) => ctx
            .slot_get::<serde_json::Value>(*token)?
            .ok_or_else(|| Error::internal("effect_param", format!("{name}:slot_{}", token.0)))?,
    };
    out.push((name.to_string(), resolved));
    Ok(())
}

pub fn resolve(ctx: &RequestContext, effect: &Effect) -> Result<ResolvedEffect, Error> {
    let mut params = Vec::new();
    match &effect.kind {
        EffectKind::HttpRequest { url, headers, body, .. } => {
            resolve_param(ctx, "url", url, &mut params)?;
            for (name, v) in headers {
                resolve_param(ctx, &format!("header.{name}"), v, &mut params)?;
            }
            if let Some(b) = body {
                resolve_param(ctx, "body", b, &mut params)?;
            }
        }
        EffectKind::KvGet { key } | EffectKind::KvDel { key } => resolve_param(ctx, "key", key, &mut params)?,
        EffectKind::KvPut { key, value } => {
            resolve_param(ctx, "key", key, &mut params)?;
            resolve_param(ctx, "value", value, &mut params)?;
        }
        EffectKind::KvScan { prefix } => resolve_param(ctx, "prefix", prefix, &mut params)?,
        EffectKind::DbQuery { params: query_params, .. } => {
            for (i, p) in query_params.iter().enumerate() {
                resolve_param(ctx, &format!("param.{i}"), p, &mut params)?;
            }
        }
        EffectKind::FileJsonRead { path } => resolve_param(ctx, "path", path, &mut params)?,
        EffectKind::FileJsonWrite { path, value } => {
            resolve_param(ctx, "path", path, &mut params)?;
            resolve_param(ctx, "value", value, &mut params)?;
        }
        EffectKind::Compute { payload, .. } => resolve_param(ctx, "payload", payload, &mut params)?,
        EffectKind::CacheGet { key } | EffectKind::CacheDel { key } => resolve_param(ctx, "key", key, &mut params)?,
        EffectKind::CacheSet { key, value, .. } => {
            resolve_param(ctx, "key", key, &mut params)?;
            resolve_param(ctx, "value", value, &mut params)?;
        }
        EffectKind::TcpConnect { addr } => resolve_param(ctx, "addr", addr, &mut params)?,
        EffectKind::TcpSend { conn, bytes } => {
            resolve_param(ctx, "conn", conn, &mut params)?;
            resolve_param(ctx, "bytes", bytes, &mut params)?;
        }
        EffectKind::TcpReceive { conn } | EffectKind::TcpClose { conn } => {
            resolve_param(ctx, "conn", conn, &mut params)?
        }
        EffectKind::GrpcUnary { payload, .. } | EffectKind::GrpcServerStream { payload, .. } => {
            resolve_param(ctx, "payload", payload, &mut params)?
        }
        EffectKind::WsConnect { url } => resolve_param(ctx, "url", url, &mut params)?,
        EffectKind::WsSend { conn, message } => {
            resolve_param(ctx, "conn", conn, &mut params)?;
            resolve_param(ctx, "message", message, &mut params)?;
        }
        EffectKind::WsReceive { conn } => resolve_param(ctx, "conn", conn, &mut params)?,
    }
    Ok(ResolvedEffect { kind: effect.kind.clone(), resolved_params: params })
}

/// Registry of effect handlers, keyed by [`EffectKind::tag`].
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Arc<DashMap<&'static str, HandlerFn>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tag: &'static str, handler: HandlerFn) {
        self.handlers.insert(tag, handler);
    }

    pub fn handler_for(&self, tag: &str) -> Option<HandlerFn> {
        self.handlers.get(tag).map(|h| h.clone())
    }
}
