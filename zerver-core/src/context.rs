//! Per-request context (C2): the slot store plus the request-scoped fields
//! every step reads from or writes to.
//!
//! Values stored here — header maps, the slot map, buffers handed out by
//! [`RequestContext::buf_fmt`] — are ordinary owned Rust data and are freed
//! together when the context drops. The original design note asks for an
//! arena allocator tied to the request; a real bump arena (e.g. `bumpalo`)
//! is `!Send` and cannot cross the reactor's worker-thread boundaries when a
//! request parks on a `Need`, so ownership-based drop is used instead. See
//! DESIGN.md for the full rationale.

use crate::error::Error;
use crate::types::SlotToken;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// One HTTP request as handed to the pipeline, before any steps run.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: http::Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub client_ip: Option<std::net::IpAddr>,
}

/// The mutable state threaded through one request's step chain.
pub struct RequestContext {
    pub method: http::Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub client_ip: Option<std::net::IpAddr>,
    pub request_id: String,

    headers: HashMap<String, String>,
    slots: HashMap<u32, Box<dyn Any + Send>>,
    user: Option<String>,
    exit_callbacks: Vec<Box<dyn FnOnce() + Send>>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("request_id", &self.request_id)
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl RequestContext {
    pub fn new(request: ParsedRequest, request_id: String) -> Self {
        let mut headers = HashMap::with_capacity(request.headers.len());
        for (name, value) in request.headers {
            let key = name.to_ascii_lowercase();
            headers
                .entry(key)
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Self {
            method: request.method,
            path: request.path,
            params: HashMap::new(),
            query: request.query,
            body: request.body,
            client_ip: request.client_ip,
            request_id,
            headers,
            slots: HashMap::new(),
            user: None,
            exit_callbacks: Vec::new(),
        }
    }

    /// Header lookup, case-insensitive. Multi-valued headers return the
    /// comma-joined form built at insertion.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn set_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.insert(name.into(), value.into());
    }

    /// Set a header, overwriting any prior value under this name. Mainly
    /// useful for test harnesses seeding a context directly; production
    /// contexts build their header map once at construction.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Read a slot's value. `Ok(None)` means the slot has never been
    /// written; `Err` means it was written with a different type than `T`
    /// (a programming error surfaced as `InternalError`, never silently
    /// swallowed).
    pub fn slot_get<T: Clone + 'static>(&self, token: SlotToken) -> Result<Option<T>, Error> {
        match self.slots.get(&token.0) {
            None => Ok(None),
            Some(boxed) => match boxed.downcast_ref::<T>() {
                Some(value) => Ok(Some(value.clone())),
                None => Err(Error::internal("slot", format!("token:{}:wrong_type", token.0))),
            },
        }
    }

    pub fn slot_put<T: Send + 'static>(&mut self, token: SlotToken, value: T) {
        self.slots.insert(token.0, Box::new(value));
    }

    pub fn slot_contains(&self, token: SlotToken) -> bool {
        self.slots.contains_key(&token.0)
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn set_user(&mut self, sub: impl Into<String>) {
        self.user = Some(sub.into());
    }

    /// Register a callback to run when the request finishes, most recently
    /// registered first (LIFO), mirroring defer/cleanup ordering.
    pub fn on_exit(&mut self, cb: impl FnOnce() + Send + 'static) {
        self.exit_callbacks.push(Box::new(cb));
    }

    /// Run and clear all registered exit callbacks. Called once by the
    /// pipeline driver after rendering the terminal response.
    pub fn run_exit_callbacks(&mut self) {
        while let Some(cb) = self.exit_callbacks.pop() {
            cb();
        }
    }

    /// Format a string using the context's own allocator (ordinary heap in
    /// this implementation); freed with the rest of the context on drop.
    pub fn buf_fmt(&self, args: fmt::Arguments<'_>) -> String {
        fmt::format(args)
    }

    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<String, Error> {
        serde_json::to_string(value).map_err(|e| Error::internal("json_encode", e.to_string()))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::bad_request("json_decode", e.to_string()))
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        // Defensive: a correctly driven pipeline already drained these via
        // `run_exit_callbacks`. Running any stragglers here keeps dropped
        // (e.g. panicked) requests from silently skipping cleanup.
        self.run_exit_callbacks();
    }
}
