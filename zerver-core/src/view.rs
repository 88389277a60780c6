//! Typed slot view (C3): a thin borrow over [`RequestContext`] that enforces
//! a step's declared `{reads, writes}` set.
//!
//! Rust has no compile-time-checked capability system cheap enough to wire
//! through a `fn` pointer step without proc-macros, so declared sets are
//! recorded on [`crate::types::Step`] at construction (via [`crate::types::ctx_view`])
//! and checked here at call time — the "runtime-checked declared sets"
//! fallback the design notes call out for steps registered dynamically.

use crate::context::RequestContext;
use crate::error::Error;
use crate::types::SlotToken;

pub struct View<'a> {
    ctx: &'a mut RequestContext,
    reads: &'static [SlotToken],
    writes: &'static [SlotToken],
}

impl<'a> View<'a> {
    pub fn new(ctx: &'a mut RequestContext, reads: &'static [SlotToken], writes: &'static [SlotToken]) -> Self {
        Self { ctx, reads, writes }
    }

    pub fn require<T: Clone + 'static>(&self, token: SlotToken) -> Result<T, Error> {
        self.check_read(token)?;
        self.ctx
            .slot_get::<T>(token)?
            .ok_or_else(|| Error::internal("slot", format!("token:{}:missing", token.0)))
    }

    pub fn optional<T: Clone + 'static>(&self, token: SlotToken) -> Result<Option<T>, Error> {
        self.check_read(token)?;
        self.ctx.slot_get::<T>(token)
    }

    pub fn put<T: Send + 'static>(&mut self, token: SlotToken, value: T) -> Result<(), Error> {
        self.check_write(token)?;
        self.ctx.slot_put(token, value);
        Ok(())
    }

    pub fn ctx(&self) -> &RequestContext {
        self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut RequestContext {
        self.ctx
    }

    fn check_read(&self, token: SlotToken) -> Result<(), Error> {
        if self.reads.contains(&token) || self.writes.contains(&token) {
            Ok(())
        } else {
            Err(Error::internal("access", format!("read_denied:{}", token.0)))
        }
    }

    fn check_write(&self, token: SlotToken) -> Result<(), Error> {
        if self.writes.contains(&token) {
            Ok(())
        } else {
            Err(Error::internal("access", format!("write_denied:{}", token.0)))
        }
    }
}
