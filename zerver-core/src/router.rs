//! Router (C4): literal / `:param` / `*wildcard` path matching.
//!
//! No regex — each registered pattern is compiled once into a small
//! segment list and matching walks both segment lists in lockstep.

use crate::types::{Method, Step};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

fn compile(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = s.strip_prefix('*') {
                Segment::Wildcard(name.to_string())
            } else {
                Segment::Literal(s.to_string())
            }
        })
        .collect()
}

/// The steps registered for one route, already split by phase.
#[derive(Clone, Default)]
pub struct RouteSpec {
    pub before: Vec<Step>,
    pub steps: Vec<Step>,
}

impl RouteSpec {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { before: Vec::new(), steps }
    }

    pub fn with_before(mut self, before: Vec<Step>) -> Self {
        self.before = before;
        self
    }
}

struct RouteEntry {
    method: Method,
    segments: Vec<Segment>,
    spec: RouteSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    NotFound,
    MethodNotAllowed,
}

pub struct Matched<'a> {
    pub spec: &'a RouteSpec,
    pub params: HashMap<String, String>,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn add_route(&mut self, method: Method, pattern: &str, spec: RouteSpec) {
        self.routes.push(RouteEntry {
            method,
            segments: compile(pattern),
            spec,
        });
    }

    pub fn match_path(&self, method: &Method, path: &str) -> Result<Matched<'_>, MatchError> {
        let request_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut path_matched_other_method = false;

        for route in &self.routes {
            if let Some(params) = match_segments(&route.segments, &request_segments) {
                if &route.method == method {
                    return Ok(Matched { spec: &route.spec, params });
                }
                path_matched_other_method = true;
            }
        }

        if path_matched_other_method {
            Err(MatchError::MethodNotAllowed)
        } else {
            Err(MatchError::NotFound)
        }
    }
}

fn match_segments(pattern: &[Segment], request: &[&str]) -> Option<HashMap<String, String>> {
    let mut params = HashMap::new();
    let mut pi = 0usize;
    let mut ri = 0usize;

    while pi < pattern.len() {
        match &pattern[pi] {
            Segment::Wildcard(name) => {
                let rest = request.get(ri..).unwrap_or(&[]).join("/");
                params.insert(name.clone(), rest);
                return Some(params);
            }
            Segment::Literal(lit) => {
                if request.get(ri)? != lit {
                    return None;
                }
            }
            Segment::Param(name) => {
                params.insert(name.clone(), (*request.get(ri)?).to_string());
            }
        }
        pi += 1;
        ri += 1;
    }

    if ri == request.len() {
        Some(params)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::step;

    fn noop_spec() -> RouteSpec {
        RouteSpec::new(vec![step("noop", |_| crate::types::continue_())])
    }

    #[test]
    fn literal_and_param_segments_match() {
        let mut r = Router::new();
        r.add_route(Method::GET, "/posts/:id", noop_spec());
        let m = r.match_path(&Method::GET, "/posts/42").unwrap();
        assert_eq!(m.params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn wildcard_captures_remaining_segments() {
        let mut r = Router::new();
        r.add_route(Method::GET, "/assets/*rest", noop_spec());
        let m = r.match_path(&Method::GET, "/assets/css/app.css").unwrap();
        assert_eq!(m.params.get("rest"), Some(&"css/app.css".to_string()));
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let mut r = Router::new();
        r.add_route(Method::GET, "/posts/:id", noop_spec());
        assert_eq!(r.match_path(&Method::GET, "/comments/1"), Err(MatchError::NotFound));
    }

    #[test]
    fn matched_path_wrong_method_is_method_not_allowed() {
        let mut r = Router::new();
        r.add_route(Method::GET, "/posts/:id", noop_spec());
        assert_eq!(
            r.match_path(&Method::POST, "/posts/1"),
            Err(MatchError::MethodNotAllowed)
        );
    }
}
