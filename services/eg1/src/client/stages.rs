//! Pipeline stages installed by the client.

use super::Sink;
use crate::Credential;
use bytes::Bytes;
use edgegrid_core::pipeline::{Middleware, Next};
use edgegrid_core::{Query, Result, Signer};
use http::{Request, Response};
use log::warn;

/// Signs every request that passes through it.
#[derive(Debug, Clone)]
pub struct Authentication {
    signer: Signer<Credential>,
}

impl Authentication {
    /// Create a new authentication stage.
    pub fn new(signer: Signer<Credential>) -> Self {
        Self { signer }
    }
}

#[async_trait::async_trait]
impl Middleware for Authentication {
    async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
        let (mut parts, body) = req.into_parts();
        self.signer.sign(&mut parts, &body).await?;
        next.run(Request::from_parts(parts, body)).await
    }
}

/// Writes failed exchanges to a sink.
#[derive(Debug, Clone)]
pub struct DebugEcho {
    sink: Sink,
}

impl DebugEcho {
    /// Create a new debug stage.
    pub fn new(sink: Sink) -> Self {
        Self { sink }
    }
}

#[async_trait::async_trait]
impl Middleware for DebugEcho {
    async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
        let head = format!("{} {}", req.method(), target(&req));
        let result = next.run(req).await;

        let message = match &result {
            Ok(resp) if resp.status().is_client_error() || resp.status().is_server_error() => {
                Some(format!(
                    "===> [ERROR] An error occurred: \n{head}\n{}\n{}\n",
                    resp.status(),
                    pretty_body(resp.body())
                ))
            }
            Ok(_) => None,
            Err(err) => Some(format!("===> [ERROR] An error occurred: \n{head}\n{err}\n")),
        };
        if let Some(message) = message {
            write_or_warn(&self.sink, &message);
        }

        result
    }
}

/// Writes request and response summaries to its sinks.
///
/// Failures go to the error sink, everything else to the output sink.
#[derive(Debug, Clone)]
pub struct VerboseEcho {
    output: Sink,
    error: Sink,
}

impl VerboseEcho {
    /// Create a new verbose stage.
    pub fn new(output: Sink, error: Sink) -> Self {
        Self { output, error }
    }
}

#[async_trait::async_trait]
impl Middleware for VerboseEcho {
    async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
        write_or_warn(
            &self.output,
            &format!(
                "===> [VERBOSE] Request: \n{} {}\n{}\n",
                req.method(),
                target(&req),
                pretty_body(req.body())
            ),
        );

        let result = next.run(req).await;
        match &result {
            Ok(resp) if resp.status().is_client_error() || resp.status().is_server_error() => {
                write_or_warn(
                    &self.error,
                    &format!(
                        "===> [ERROR] An error occurred: \n{}\n{}\n",
                        resp.status(),
                        pretty_body(resp.body())
                    ),
                );
            }
            Ok(resp) => write_or_warn(
                &self.output,
                &format!(
                    "===> [VERBOSE] Response: \n{}\n{}\n",
                    resp.status(),
                    pretty_body(resp.body())
                ),
            ),
            Err(err) => write_or_warn(
                &self.error,
                &format!("===> [ERROR] An error occurred: \n{err}\n"),
            ),
        }

        result
    }
}

/// Request target including query pairs that haven't been merged back yet.
pub(crate) fn target(req: &Request<Bytes>) -> String {
    match req.extensions().get::<Query>() {
        Some(q) if !q.is_empty() => match req.uri().query() {
            Some(_) => format!("{}&{q}", req.uri()),
            None => format!("{}?{q}", req.uri()),
        },
        _ => req.uri().to_string(),
    }
}

fn pretty_body(body: &Bytes) -> String {
    if body.is_empty() {
        return "No body".to_string();
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(v) => serde_json::to_string_pretty(&v)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).to_string()),
        Err(_) => String::from_utf8_lossy(body).to_string(),
    }
}

fn write_or_warn(sink: &Sink, message: &str) {
    if let Err(err) = sink.write_str(message) {
        warn!("failed to write to sink: {err}");
    }
}
