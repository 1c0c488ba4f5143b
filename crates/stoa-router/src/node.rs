//! Path tree used by the route table.
//!
//! Each node is one path segment. Matching prefers static children, then the
//! parameter child, then the wildcard child, and backtracks when a branch has
//! no endpoint for the requested method.

use http::Method;

use crate::RouteError;

/// Kind of path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Literal segment (`users`).
    Static,
    /// Named parameter (`{id}`).
    Param(String),
    /// Trailing catch-all (`*rest`).
    Wildcard(String),
}

/// A node in the path tree holding endpoints of type `T`.
#[derive(Debug)]
pub(crate) struct Node<T> {
    segment: String,
    kind: SegmentKind,
    endpoints: Vec<(Method, T)>,
    /// Sorted by segment for binary search.
    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
    wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn new(segment: &str, kind: SegmentKind) -> Self {
        Self {
            segment: segment.to_string(),
            kind,
            endpoints: Vec::new(),
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new("", SegmentKind::Static)
    }

    /// Splits a pattern into typed segments.
    pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<(String, SegmentKind)>, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::invalid(pattern, "must start with '/'"));
        }

        let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let last = raw.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(raw.len());

        for (i, s) in raw.iter().enumerate() {
            let kind = if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(RouteError::invalid(pattern, "empty parameter name"));
                }
                SegmentKind::Param(name.to_string())
            } else if let Some(name) = s.strip_prefix('*') {
                if i != last {
                    return Err(RouteError::invalid(
                        pattern,
                        "wildcard must be the last segment",
                    ));
                }
                SegmentKind::Wildcard(name.to_string())
            } else if s.contains(['{', '}', '*']) {
                return Err(RouteError::invalid(pattern, "malformed segment"));
            } else {
                SegmentKind::Static
            };
            segments.push(((*s).to_string(), kind));
        }

        Ok(segments)
    }

    /// Inserts an endpoint for `method` under the given segments.
    pub(crate) fn insert(
        &mut self,
        pattern: &str,
        segments: &[(String, SegmentKind)],
        method: Method,
        endpoint: T,
    ) -> Result<(), RouteError> {
        let Some(((segment, kind), remaining)) = segments.split_first() else {
            if self.endpoints.iter().any(|(m, _)| *m == method) {
                return Err(RouteError::Duplicate {
                    method,
                    pattern: pattern.to_string(),
                });
            }
            self.endpoints.push((method, endpoint));
            return Ok(());
        };

        let child = match kind {
            SegmentKind::Static => {
                match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(i) => &mut self.static_children[i],
                    Err(i) => {
                        self.static_children
                            .insert(i, Self::new(segment, SegmentKind::Static));
                        &mut self.static_children[i]
                    }
                }
            }
            SegmentKind::Param(_) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Self::new(segment, kind.clone())));
                if child.kind != *kind {
                    return Err(RouteError::invalid(
                        pattern,
                        format!("parameter conflicts with existing '{}'", child.segment),
                    ));
                }
                &mut **child
            }
            SegmentKind::Wildcard(_) => {
                let child = self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(Self::new(segment, kind.clone())));
                if child.kind != *kind {
                    return Err(RouteError::invalid(
                        pattern,
                        format!("wildcard conflicts with existing '{}'", child.segment),
                    ));
                }
                &mut **child
            }
        };

        child.insert(pattern, remaining, method, endpoint)
    }

    /// Finds the endpoint for `method` and `path`, capturing parameters.
    pub(crate) fn find<'a>(
        &'a self,
        method: &Method,
        path: &str,
        params: &mut Vec<(String, String)>,
    ) -> Option<&'a T> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.find_segments(method, &segments, params)
    }

    fn endpoint(&self, method: &Method) -> Option<&T> {
        self.endpoints
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, t)| t)
    }

    fn find_segments<'a>(
        &'a self,
        method: &Method,
        segments: &[&str],
        params: &mut Vec<(String, String)>,
    ) -> Option<&'a T> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.endpoint(method);
        };

        if let Some(found) = self
            .find_static_child(segment)
            .and_then(|child| child.find_segments(method, remaining, params))
        {
            return Some(found);
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push((name.clone(), (*segment).to_string()));
                if let Some(found) = child.find_segments(method, remaining, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let SegmentKind::Wildcard(name) = &child.kind {
                if let Some(found) = child.endpoint(method) {
                    if !name.is_empty() {
                        params.push((name.clone(), segments.join("/")));
                    }
                    return Some(found);
                }
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Self> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}
