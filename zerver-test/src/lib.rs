mod req_test;

pub use req_test::{ReqAssert, ReqTest};
