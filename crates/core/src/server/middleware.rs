//! Request middleware for the static server

use std::fmt;

use axum::http::Method;

/// A request rewrite applied when no document root contains the requested path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Middleware {
    /// Serve `index` for navigation requests so client-side routing works
    HistoryFallback { index: String },
}

impl Middleware {
    /// The path to try instead of `path`, if this middleware applies
    pub fn rewrite(&self, method: &Method, path: &str, accepts_html: bool) -> Option<String> {
        match self {
            Middleware::HistoryFallback { index } => {
                if *method != Method::GET && *method != Method::HEAD {
                    return None;
                }
                if !accepts_html {
                    return None;
                }
                // Paths whose last segment looks like a file are real asset misses
                let last_segment = path.rsplit('/').next().unwrap_or_default();
                if last_segment.contains('.') {
                    return None;
                }
                Some(index.clone())
            }
        }
    }
}

/// Produces the middleware stack for a server profile
pub trait MiddlewareFactory: Send + Sync + fmt::Debug {
    fn build(&self) -> Vec<Middleware>;
}

/// History API fallback to `/index.html`
#[derive(Debug, Clone)]
pub struct HistoryFallback {
    pub index: String,
}

impl Default for HistoryFallback {
    fn default() -> Self {
        Self {
            index: "/index.html".to_string(),
        }
    }
}

impl MiddlewareFactory for HistoryFallback {
    fn build(&self) -> Vec<Middleware> {
        vec![Middleware::HistoryFallback {
            index: self.index.clone(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_fallback_rewrites_navigation() {
        let stack = HistoryFallback::default().build();
        let fallback = &stack[0];

        assert_eq!(
            fallback.rewrite(&Method::GET, "/users/42", true).as_deref(),
            Some("/index.html")
        );
        assert_eq!(fallback.rewrite(&Method::GET, "/js/missing.js", true), None);
        assert_eq!(fallback.rewrite(&Method::GET, "/users/42", false), None);
        assert_eq!(fallback.rewrite(&Method::POST, "/users/42", true), None);
    }
}
