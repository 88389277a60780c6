pub mod config;
pub mod context;
pub mod correlation;
pub mod effects;
pub mod error;
pub mod executor;
pub mod join;
pub mod logging;
pub mod pipeline;
pub mod pool_lease;
pub mod queue;
pub mod reactor;
pub mod router;
pub mod types;
pub mod view;

pub use config::{
    register_section, registered_sections, validate_keys, validate_section, ConfigError,
    ConfigProperties, ConfigValidationError, ConfigValue, DefaultSecretResolver, FromConfigValue,
    MissingKeyError, PropertyMeta, RegisteredSection, SecretResolver, ZerverConfig,
};
pub use context::{ParsedRequest, RequestContext};
pub use effects::{Dispatcher, EffectResult, HandlerFn, HandlerFuture, ResolvedEffect, RuntimeContext};
pub use error::{Error, ErrorContext, ErrorKind};
pub use join::{JoinState, ResumeStatus};
pub use logging::init_tracing;
pub use pipeline::{OnErrorFn, Server, ServerBuilder};
pub use pool_lease::{ConnectionPool, Lease};
pub use reactor::{Reactor, ReactorConfig};
pub use router::{MatchError, RouteSpec, Router};
pub use types::{
    continue_, ctx_view, done, fail, need, Body, BodyStream, ContinuationFn, Decision, Effect,
    EffectKind, JoinPolicy, Method, Mode, Need, ParamValue, Response, RetryPolicy, SlotToken, Step,
    StepFn, step,
};
pub use view::View;
