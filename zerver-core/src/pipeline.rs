//! Request pipeline driver (C11): binds parsed request -> route match ->
//! step chain -> reactor -> rendered response. This is the one component
//! that talks to all the others; everything upstream of `ParsedRequest`
//! (wire parsing) and downstream of `Response` (transmission) is an
//! external collaborator out of scope here.

use crate::context::{ParsedRequest, RequestContext};
use crate::effects::{Dispatcher, HandlerFn, RuntimeContext};
use crate::error::Error;
use crate::queue::{ExecutionContext, PhaseBounds};
use crate::reactor::{Reactor, ReactorConfig, SubmitError};
use crate::router::{MatchError, RouteSpec, Router};
use crate::types::{Method, Response, Step};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::instrument;

pub type OnErrorFn = fn(&Error) -> Response;

fn default_on_error(err: &Error) -> Response {
    Response::json(err.kind.status(), &err.to_json())
        .unwrap_or_else(|_| Response::new(500, "internal error"))
}

fn default_not_found(_method: &Method, path: &str) -> Response {
    Response::new(
        404,
        serde_json::to_vec(&serde_json::json!({"error": {"code": 404, "what": "route", "key": path}}))
            .unwrap_or_default(),
    )
    .with_header("content-type", "application/json")
}

/// The application: a router, a shared "before everything" step list, and
/// the reactor that actually runs requests.
#[derive(Clone)]
pub struct Server {
    router: Arc<Router>,
    global_before: Arc<Vec<Step>>,
    on_error: OnErrorFn,
    reactor: Reactor,
    dispatcher: Dispatcher,
}

/// Builder for [`Server`]. Two-phase construction mirrors the teacher's
/// `AppBuilder` pattern: accumulate routes/steps/handlers, then `build()`
/// starts the reactor's worker pools.
pub struct ServerBuilder {
    router: Router,
    global_before: Vec<Step>,
    on_error: OnErrorFn,
    dispatcher: Dispatcher,
    reactor_config: ReactorConfig,
    config: Arc<crate::config::ZerverConfig>,
}

impl ServerBuilder {
    pub fn new(config: Arc<crate::config::ZerverConfig>) -> Self {
        Self {
            router: Router::new(),
            global_before: Vec::new(),
            on_error: default_on_error,
            dispatcher: Dispatcher::new(),
            reactor_config: ReactorConfig::default(),
            config,
        }
    }

    pub fn with_reactor_config(mut self, config: ReactorConfig) -> Self {
        self.reactor_config = config;
        self
    }

    /// Register steps that run before every route's own `before` phase.
    pub fn use_global(mut self, steps: Vec<Step>) -> Self {
        self.global_before.extend(steps);
        self
    }

    pub fn add_route(mut self, method: Method, path: &str, spec: RouteSpec) -> Self {
        self.router.add_route(method, path, spec);
        self
    }

    /// Sugar for a POST route under `/flow/v1/<slug>`, the convention used
    /// by background/automation flows that share the same step engine as
    /// ordinary routes.
    pub fn add_flow(self, slug: &str, spec: RouteSpec) -> Self {
        let path = format!("/flow/v1/{slug}");
        self.add_route(Method::POST, &path, spec)
    }

    pub fn on_error(mut self, f: OnErrorFn) -> Self {
        self.on_error = f;
        self
    }

    pub fn register_effect_handler(self, tag: &'static str, handler: HandlerFn) -> Self {
        self.dispatcher.register(tag, handler);
        self
    }

    /// Validates every registered config section's required keys before
    /// starting the reactor's worker pools. A missing key is a startup
    /// failure, not a per-request `Decision::Fail`.
    pub fn build(self) -> Result<Server, crate::config::ConfigValidationError> {
        let mut missing = Vec::new();
        for section in crate::config::registered_sections() {
            let keys: Vec<(&str, &str, &str)> = section
                .properties
                .iter()
                .filter(|p| p.required && !p.is_section)
                .map(|p| (section.prefix.as_str(), p.full_key.as_str(), p.type_name))
                .collect();
            missing.extend(crate::config::validate_keys(&self.config, &keys));
        }
        if !missing.is_empty() {
            return Err(crate::config::ConfigValidationError { errors: missing });
        }

        let runtime_ctx = RuntimeContext { config: self.config };
        let reactor = Reactor::start(self.reactor_config, self.dispatcher.clone(), runtime_ctx);
        Ok(Server {
            router: Arc::new(self.router),
            global_before: Arc::new(self.global_before),
            on_error: self.on_error,
            reactor,
            dispatcher: self.dispatcher,
        })
    }
}

impl Server {
    pub fn builder(config: Arc<crate::config::ZerverConfig>) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn shutdown(&self) {
        self.reactor.shutdown();
    }

    /// Run one request through the pipeline and wait for its rendered
    /// response. This is the function a wire-parsing front end calls per
    /// request; everything else is driven by the reactor.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn handle(&self, request: ParsedRequest) -> Response {
        let method = request.method.clone();
        let path = request.path.clone();

        let mut ctx = RequestContext::new(request, String::new());
        let request_id = crate::correlation::resolve_request_id(&ctx);
        ctx.request_id = request_id;

        let matched = self.router.match_path(&method, &path);
        let (spec, params) = match matched {
            Ok(m) => (m.spec.clone(), m.params),
            Err(MatchError::NotFound) => return default_not_found(&method, &path),
            Err(MatchError::MethodNotAllowed) => {
                return Response::new(405, "method not allowed");
            }
        };
        for (k, v) in params {
            ctx.set_param(k, v);
        }

        let global_before_end = self.global_before.len();
        let route_before_end = global_before_end + spec.before.len();
        let mut steps = Vec::with_capacity(route_before_end + spec.steps.len());
        steps.extend(self.global_before.iter().copied());
        steps.extend(spec.before.iter().copied());
        steps.extend(spec.steps.iter().copied());

        let (tx, rx) = oneshot::channel();
        let exec = Box::new(ExecutionContext::new(
            ctx,
            Arc::new(steps),
            PhaseBounds { global_before_end, route_before_end },
            tx,
        ));

        match self.reactor.submit_new(exec).await {
            Ok(()) => {}
            Err(SubmitError::QueueFull) => {
                return (self.on_error)(&Error::upstream_unavailable("step_queue", "full"));
            }
            Err(SubmitError::ShuttingDown) => {
                return (self.on_error)(&Error::shutdown("reactor", "shutting_down"));
            }
        }

        match rx.await {
            Ok(response) => response,
            Err(_) => (self.on_error)(&Error::internal("pipeline", "result_channel_dropped")),
        }
    }
}
