//! `ReqTest`: a fluent harness for exercising a single step (or step
//! chain fragment) against a hand-built [`RequestContext`], without going
//! through the router or reactor.
//!
//! Grounded on the teacher's `TestApp`/`TestResponse` pair (fluent
//! builder dispatching one request, fluent `assert_*` on the result) —
//! adapted here to drive steps directly, since HTTP wire dispatch is out
//! of scope for this engine and the thing worth testing in isolation is a
//! step's `Decision`, not a wire-level response.

use std::collections::HashMap;

use bytes::Bytes;
use zerver_core::{
    ContinuationFn, Decision, Error, ErrorKind, Method, Need, ParsedRequest, RequestContext,
    Response, SlotToken, StepFn,
};

pub struct ReqTest {
    ctx: RequestContext,
}

impl Default for ReqTest {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqTest {
    pub fn new() -> Self {
        let request = ParsedRequest {
            method: Method::GET,
            path: "/".to_string(),
            headers: Vec::new(),
            query: HashMap::new(),
            body: Bytes::new(),
            client_ip: None,
        };
        Self {
            ctx: RequestContext::new(request, "test-request".to_string()),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.ctx.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.ctx.path = path.into();
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.ctx.body = body.into();
        self
    }

    pub fn set_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.set_param(name, value);
        self
    }

    pub fn set_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.set_query(name, value);
        self
    }

    pub fn set_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.ctx.set_header(name, value);
        self
    }

    /// Seed a slot with an already-typed value, as if a prior step had
    /// written it.
    pub fn seed_slot<T: Send + 'static>(mut self, token: SlotToken, value: T) -> Self {
        self.ctx.slot_put(token, value);
        self
    }

    /// Convenience for the common case of seeding a string-valued slot.
    pub fn seed_slot_string(self, token: SlotToken, value: impl Into<String>) -> Self {
        self.seed_slot(token, value.into())
    }

    /// Run one step against the accumulated context and capture its
    /// `Decision` for assertion.
    pub fn call_step(mut self, step: StepFn) -> ReqAssert {
        let decision = step(&mut self.ctx);
        ReqAssert { decision, ctx: self.ctx }
    }

    /// Run a `Need`'s continuation directly, as if its join had just
    /// resolved — useful for testing continuations without wiring up a
    /// real reactor.
    pub fn call_continuation(mut self, continuation: ContinuationFn) -> ReqAssert {
        let decision = continuation(&mut self.ctx);
        ReqAssert { decision, ctx: self.ctx }
    }

    pub fn into_context(self) -> RequestContext {
        self.ctx
    }
}

/// The outcome of [`ReqTest::call_step`], offering fluent assertions
/// mirroring the teacher's `TestResponse::assert_*` methods.
pub struct ReqAssert {
    decision: Decision,
    ctx: RequestContext,
}

impl ReqAssert {
    pub fn assert_continue(self) -> RequestContext {
        match self.decision {
            Decision::Continue => self.ctx,
            other => panic!("expected Continue, got {}", describe(&other)),
        }
    }

    pub fn assert_done(self, status: u16) -> Response {
        match self.decision {
            Decision::Done(response) if response.status == status => response,
            Decision::Done(response) => panic!("expected Done({status}), got Done({})", response.status),
            other => panic!("expected Done({status}), got {}", describe(&other)),
        }
    }

    pub fn assert_fail(self, kind: ErrorKind) -> Error {
        match self.decision {
            Decision::Fail(err) if err.kind == kind => err,
            Decision::Fail(err) => panic!("expected Fail({kind}), got Fail({})", err.kind),
            other => panic!("expected Fail({kind}), got {}", describe(&other)),
        }
    }

    pub fn assert_need(self) -> Need {
        match self.decision {
            Decision::Need(need) => need,
            other => panic!("expected Need, got {}", describe(&other)),
        }
    }

    pub fn ctx(&self) -> &RequestContext {
        &self.ctx
    }
}

fn describe(decision: &Decision) -> &'static str {
    match decision {
        Decision::Continue => "Continue",
        Decision::Done(_) => "Done",
        Decision::Fail(_) => "Fail",
        Decision::Need(_) => "Need",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerver_core::{continue_, done, fail, need, EffectKind, Effect, JoinPolicy, Mode, ParamValue};

    const GREETING: SlotToken = SlotToken::new(1);

    fn greet(ctx: &mut RequestContext) -> Decision {
        match ctx.slot_get::<String>(GREETING).unwrap() {
            Some(name) => done(Response::new(200, format!("hello {name}"))),
            None => fail(ErrorKind::BadRequest, "greeting", "missing"),
        }
    }

    fn ask_for_name(_ctx: &mut RequestContext) -> Decision {
        let effect = Effect::new(
            EffectKind::KvGet { key: ParamValue::inline(serde_json::json!("name")) },
            GREETING,
        );
        fn resume(ctx: &mut RequestContext) -> Decision {
            if ctx.slot_contains(GREETING) {
                continue_()
            } else {
                fail(ErrorKind::InternalError, "name_lookup", "unresolved")
            }
        }
        need(vec![effect], Mode::Sequential, JoinPolicy::All, resume)
    }

    #[test]
    fn seeded_slot_drives_a_done_decision() {
        ReqTest::new()
            .seed_slot_string(GREETING, "ada")
            .call_step(greet)
            .assert_done(200);
    }

    #[test]
    fn missing_slot_fails_with_bad_request() {
        ReqTest::new().call_step(greet).assert_fail(ErrorKind::BadRequest);
    }

    #[test]
    fn step_can_park_on_a_need() {
        let need = ReqTest::new().call_step(ask_for_name).assert_need();
        assert_eq!(need.effects.len(), 1);
    }

    #[test]
    fn continuation_runs_directly_against_seeded_context() {
        ReqTest::new()
            .seed_slot(GREETING, "ada".to_string())
            .call_continuation(|ctx| {
                if ctx.slot_contains(GREETING) {
                    continue_()
                } else {
                    fail(ErrorKind::InternalError, "name_lookup", "unresolved")
                }
            })
            .assert_continue();
    }
}
