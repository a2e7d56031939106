//! Ordered, named request pipeline.
//!
//! A [`HandlerStack`] is a list of named [`Middleware`] stages wrapped
//! around an [`HttpSend`] transport. Index 0 is the outermost stage: it sees
//! the request first and the response last.

mod history;
pub use history::{History, Transaction};

use crate::request::merge_query_extension;
use crate::{Error, HttpSend, Result};
use bytes::Bytes;
use http::{Request, Response};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Middleware is one step of the request pipeline.
///
/// Implementations may inspect or mutate the request before calling
/// `next.run(req)`, and observe the response after it returns.
#[async_trait::async_trait]
pub trait Middleware: Debug + Send + Sync + 'static {
    /// Handle the request and delegate to the rest of the pipeline.
    async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>>;
}

/// The remaining stages and the transport behind them.
pub struct Next<'a> {
    stages: &'a [Stage],
    transport: &'a dyn HttpSend,
}

impl Next<'_> {
    /// Run the rest of the pipeline.
    pub async fn run(self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    transport: self.transport,
                };
                stage.middleware.handle(req, next).await
            }
            None => {
                let (mut parts, body) = req.into_parts();
                merge_query_extension(&mut parts)?;
                self.transport
                    .http_send(Request::from_parts(parts, body))
                    .await
            }
        }
    }
}

/// Where to put a stage relative to the ones already in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// Directly before the named stage.
    Before(&'a str),
    /// Directly after the named stage.
    After(&'a str),
    /// At the end of the stack, closest to the transport.
    Push,
}

#[derive(Clone)]
struct Stage {
    name: String,
    middleware: Arc<dyn Middleware>,
}

/// HandlerStack keeps middleware in order and by name.
#[derive(Clone, Default)]
pub struct HandlerStack {
    stages: Vec<Stage>,
}

impl Debug for HandlerStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl HandlerStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage closest to the transport.
    pub fn push(&mut self, name: &str, middleware: impl Middleware) -> &mut Self {
        self.push_arc(name, Arc::new(middleware))
    }

    /// Prepend a stage so that it runs first.
    pub fn unshift(&mut self, name: &str, middleware: impl Middleware) -> &mut Self {
        self.stages.insert(
            0,
            Stage {
                name: name.to_string(),
                middleware: Arc::new(middleware),
            },
        );
        self
    }

    /// Insert a stage directly before `anchor`.
    pub fn before(&mut self, anchor: &str, name: &str, middleware: impl Middleware) -> Result<()> {
        let idx = self
            .position(anchor)
            .ok_or_else(|| Error::stage_anchor_not_found(anchor))?;
        self.insert_at(idx, name, Arc::new(middleware));
        Ok(())
    }

    /// Insert a stage directly after `anchor`.
    pub fn after(&mut self, anchor: &str, name: &str, middleware: impl Middleware) -> Result<()> {
        let idx = self
            .position(anchor)
            .ok_or_else(|| Error::stage_anchor_not_found(anchor))?;
        self.insert_at(idx + 1, name, Arc::new(middleware));
        Ok(())
    }

    /// Insert a stage at the first placement that can be satisfied.
    ///
    /// Placements are tried in order. Returns the index the stage landed
    /// at, or `StageAnchorNotFound` for the last anchor when none matched.
    pub fn insert(
        &mut self,
        placements: &[Placement<'_>],
        name: &str,
        middleware: Arc<dyn Middleware>,
    ) -> Result<usize> {
        let mut missing = None;
        for placement in placements {
            let idx = match *placement {
                Placement::Push => Some(self.stages.len()),
                Placement::Before(anchor) => self.position(anchor).or_else(|| {
                    missing = Some(anchor);
                    None
                }),
                Placement::After(anchor) => match self.position(anchor) {
                    Some(i) => Some(i + 1),
                    None => {
                        missing = Some(anchor);
                        None
                    }
                },
            };

            if let Some(idx) = idx {
                debug!("insert stage {name} at {idx} via {placement:?}");
                self.insert_at(idx, name, middleware);
                return Ok(idx);
            }
        }

        Err(Error::stage_anchor_not_found(missing.unwrap_or_default()))
    }

    /// Remove every stage with the given name, returns whether any existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|s| s.name != name);
        before != self.stages.len()
    }

    /// Index of the first stage with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Whether a stage with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Stage names from outermost to innermost.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the stack has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Send a request through every stage and then the transport.
    pub async fn send(
        &self,
        transport: &dyn HttpSend,
        req: Request<Bytes>,
    ) -> Result<Response<Bytes>> {
        Next {
            stages: &self.stages,
            transport,
        }
        .run(req)
        .await
    }

    fn push_arc(&mut self, name: &str, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.stages.push(Stage {
            name: name.to_string(),
            middleware,
        });
        self
    }

    fn insert_at(&mut self, idx: usize, name: &str, middleware: Arc<dyn Middleware>) {
        self.stages.insert(
            idx,
            Stage {
                name: name.to_string(),
                middleware,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Query;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Appends its name to `x-trace` on the way in.
    #[derive(Debug)]
    struct Trace(&'static str);

    #[async_trait::async_trait]
    impl Middleware for Trace {
        async fn handle(&self, mut req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
            let trace = match req.headers().get("x-trace") {
                Some(v) => format!("{},{}", v.to_str()?, self.0),
                None => self.0.to_string(),
            };
            req.headers_mut().insert("x-trace", trace.parse()?);
            next.run(req).await
        }
    }

    /// Echoes the trace header and uri back in the response.
    #[derive(Debug, Default)]
    struct Echo(Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl HttpSend for Echo {
        async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
            self.0.lock().unwrap().push(req.uri().to_string());
            let trace = req
                .headers()
                .get("x-trace")
                .map(|v| v.to_str().unwrap().to_string())
                .unwrap_or_default();
            Ok(Response::new(Bytes::from(trace)))
        }
    }

    fn stack(names: &[&'static str]) -> HandlerStack {
        let mut stack = HandlerStack::new();
        for &name in names {
            stack.push(name, Trace(name));
        }
        stack
    }

    #[tokio::test]
    async fn test_send_runs_stages_in_order() {
        let mut stack = stack(&["a", "b"]);
        stack.unshift("first", Trace("first"));

        let transport = Echo::default();
        let req = Request::get("https://example.com/").body(Bytes::new()).unwrap();
        let resp = stack.send(&transport, req).await.unwrap();
        assert_eq!(resp.body(), &Bytes::from("first,a,b"));
    }

    #[tokio::test]
    async fn test_send_merges_query_extension() {
        let stack = HandlerStack::new();
        let transport = Echo::default();

        let mut req = Request::get("https://example.com/v1/x")
            .body(Bytes::new())
            .unwrap();
        req.extensions_mut().insert(Query::parse("a=1&b=%20"));
        stack.send(&transport, req).await.unwrap();

        assert_eq!(
            transport.0.lock().unwrap().clone(),
            vec!["https://example.com/v1/x?a=1&b=%20".to_string()]
        );
    }

    #[test]
    fn test_before_and_after() {
        let mut stack = stack(&["allow_redirects", "history"]);
        stack.before("history", "auth", Trace("auth")).unwrap();
        stack
            .after("allow_redirects", "debug", Trace("debug"))
            .unwrap();
        assert_eq!(
            stack.names(),
            vec!["allow_redirects", "debug", "auth", "history"]
        );
    }

    #[test]
    fn test_missing_anchor_is_reported() {
        let mut stack = stack(&["a"]);
        let err = stack
            .before("history", "auth", Trace("auth"))
            .expect_err("anchor is absent");
        assert_eq!(err.kind(), ErrorKind::StageAnchorNotFound);
        assert_eq!(stack.names(), vec!["a"]);
    }

    #[test]
    fn test_insert_walks_placements_in_order() {
        let logger: Arc<dyn Middleware> = Arc::new(Trace("logger"));
        let chain = [
            Placement::After("history"),
            Placement::Before("allow_redirects"),
            Placement::Push,
        ];

        let mut full = stack(&["allow_redirects", "history", "tail"]);
        assert_eq!(full.insert(&chain, "logger", logger.clone()).unwrap(), 2);
        assert_eq!(
            full.names(),
            vec!["allow_redirects", "history", "logger", "tail"]
        );

        let mut redirects_only = stack(&["x", "allow_redirects"]);
        assert_eq!(
            redirects_only
                .insert(&chain, "logger", logger.clone())
                .unwrap(),
            1
        );
        assert_eq!(redirects_only.names(), vec!["x", "logger", "allow_redirects"]);

        let mut bare = stack(&["x"]);
        assert_eq!(bare.insert(&chain, "logger", logger.clone()).unwrap(), 1);
        assert_eq!(bare.names(), vec!["x", "logger"]);

        let mut strict = stack(&["x"]);
        let err = strict
            .insert(&[Placement::Before("history")], "logger", logger)
            .expect_err("no fallback");
        assert_eq!(err.kind(), ErrorKind::StageAnchorNotFound);
    }

    #[test]
    fn test_remove_and_contains() {
        let mut stack = stack(&["a", "logger", "b"]);
        assert!(stack.contains("logger"));
        assert!(stack.remove("logger"));
        assert!(!stack.remove("logger"));
        assert_eq!(stack.names(), vec!["a", "b"]);
        assert_eq!(stack.len(), 2);
    }
}
