//! Drives a real `Server` + `Reactor` through a `Need -> dispatch -> join ->
//! resume` cycle on the multi-thread runtime, so effect-pool worker tasks
//! actually run concurrently with the request task parking on them.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use zerver_core::{
    done, need, step, Effect, EffectKind, EffectResult, JoinPolicy, Method, Mode, ParamValue,
    ParsedRequest, RequestContext, Response, RouteSpec, Server, SlotToken, ZerverConfig,
};

const KV_VALUE_SLOT: SlotToken = SlotToken::new(0);

fn start_step(ctx: &mut RequestContext) -> zerver_core::Decision {
    let effect = Effect::new(
        EffectKind::KvGet { key: ParamValue::inline(serde_json::json!("greeting")) },
        KV_VALUE_SLOT,
    )
    .with_timeout_ms(1_000);
    need(vec![effect], Mode::Sequential, JoinPolicy::All, render_step)
}

fn render_step(ctx: &mut RequestContext) -> zerver_core::Decision {
    match ctx.slot_get::<Bytes>(KV_VALUE_SLOT) {
        Ok(Some(bytes)) => done(Response::new(200, bytes)),
        _ => done(Response::new(502, "kv effect did not land")),
    }
}

fn config() -> Arc<ZerverConfig> {
    Arc::new(ZerverConfig::empty())
}

fn request(path: &str) -> ParsedRequest {
    ParsedRequest {
        method: Method::GET,
        path: path.to_string(),
        headers: vec![],
        query: HashMap::new(),
        body: Bytes::new(),
        client_ip: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_kv_effect_resolves_and_resumes_request() {
    let server = Server::builder(config())
        .register_effect_handler(
            "kv.get",
            Arc::new(|_runtime, _resolved| {
                Box::pin(async move { EffectResult::Success(Bytes::from_static(b"hello")) })
            }),
        )
        .add_route(Method::GET, "/greeting", RouteSpec::new(vec![step("start", start_step)]))
        .build()
        .unwrap();

    // Fire many requests concurrently so several parked contexts and their
    // effect jobs are in flight at once across the worker pools.
    let mut handles = Vec::new();
    for _ in 0..32 {
        let server = server.clone();
        handles.push(tokio::spawn(async move { server.handle(request("/greeting")).await }));
    }

    for handle in handles {
        let resp = handle.await.expect("task panicked");
        assert_eq!(resp.status, 200);
    }

    server.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_required_effect_renders_error_instead_of_hanging() {
    let server = Server::builder(config())
        .register_effect_handler(
            "kv.get",
            Arc::new(|_runtime, _resolved| {
                Box::pin(async move {
                    EffectResult::Failure(zerver_core::Error::upstream_unavailable("kv", "greeting"))
                })
            }),
        )
        .add_route(Method::GET, "/greeting", RouteSpec::new(vec![step("start", start_step)]))
        .build()
        .unwrap();

    let resp = tokio::time::timeout(std::time::Duration::from_secs(5), server.handle(request("/greeting")))
        .await
        .expect("request hung instead of resolving");
    assert_eq!(resp.status, 502);

    server.shutdown();
}
