//! Correlation id resolution for the request pipeline driver (C11, §6):
//! `traceparent` > `x-request-id` > `x-correlation-id` > generated.

use crate::context::RequestContext;

/// A strict W3C `traceparent` header: `version-traceid-spanid-flags`, with
/// a non-zero trace id and span id. Anything else is treated as absent
/// rather than guessed at.
fn parse_traceparent(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 4 {
        return None;
    }
    let [version, trace_id, span_id, flags] = [parts[0], parts[1], parts[2], parts[3]];
    if version.len() != 2 || trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
        return None;
    }
    let all_hex = |s: &str| s.chars().all(|c| c.is_ascii_hexdigit());
    if !all_hex(version) || !all_hex(trace_id) || !all_hex(span_id) || !all_hex(flags) {
        return None;
    }
    if version != "00" {
        return None;
    }
    if trace_id.chars().all(|c| c == '0') || span_id.chars().all(|c| c == '0') {
        return None;
    }
    Some(trace_id.to_string())
}

/// Resolve the correlation id for a request, generating a fresh one if no
/// recognized header is present.
pub fn resolve_request_id(ctx_headers: &RequestContext) -> String {
    if let Some(tp) = ctx_headers.header("traceparent").and_then(parse_traceparent) {
        return tp;
    }
    if let Some(id) = ctx_headers.header("x-request-id") {
        if !id.trim().is_empty() {
            return id.to_string();
        }
    }
    if let Some(id) = ctx_headers.header("x-correlation-id") {
        if !id.trim().is_empty() {
            return id.to_string();
        }
    }
    generate_request_id()
}

pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ParsedRequest;
    use bytes::Bytes;
    use std::collections::HashMap;

    fn ctx_with_headers(headers: Vec<(&str, &str)>) -> RequestContext {
        RequestContext::new(
            ParsedRequest {
                method: http::Method::GET,
                path: "/".into(),
                headers: headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                query: HashMap::new(),
                body: Bytes::new(),
                client_ip: None,
            },
            "placeholder".into(),
        )
    }

    #[test]
    fn traceparent_wins_over_everything() {
        let ctx = ctx_with_headers(vec![
            ("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
            ("x-request-id", "should-be-ignored"),
        ]);
        assert_eq!(resolve_request_id(&ctx), "4bf92f3577b34da6a3ce929d0e0e4736");
    }

    #[test]
    fn falls_back_to_x_request_id() {
        let ctx = ctx_with_headers(vec![("x-request-id", "abc-123")]);
        assert_eq!(resolve_request_id(&ctx), "abc-123");
    }

    #[test]
    fn falls_back_to_x_correlation_id() {
        let ctx = ctx_with_headers(vec![("x-correlation-id", "corr-1")]);
        assert_eq!(resolve_request_id(&ctx), "corr-1");
    }

    #[test]
    fn generates_when_nothing_present() {
        let ctx = ctx_with_headers(vec![]);
        let id = resolve_request_id(&ctx);
        assert_eq!(id.len(), 32);
    }

    #[test]
    fn malformed_traceparent_falls_through() {
        let ctx = ctx_with_headers(vec![
            ("traceparent", "not-a-traceparent"),
            ("x-request-id", "abc"),
        ]);
        assert_eq!(resolve_request_id(&ctx), "abc");
    }

    #[test]
    fn all_zero_trace_id_is_rejected() {
        let ctx = ctx_with_headers(vec![
            ("traceparent", "00-00000000000000000000000000000000-00f067aa0ba902b7-01"),
            ("x-request-id", "abc"),
        ]);
        assert_eq!(resolve_request_id(&ctx), "abc");
    }
}
