use super::stages::target;
use super::Sink;
use bytes::Bytes;
use edgegrid_core::pipeline::{Middleware, Next};
use edgegrid_core::time::{format_common_log, format_rfc3339, now, DateTime};
use edgegrid_core::utils::display_header_value;
use edgegrid_core::{Error, Query, Result};
use http::header::{HeaderMap, HeaderName};
use http::{header, Request, Response, Version};
use log::{error, info, warn};

/// Formats one exchange into a log line.
///
/// Placeholders look like `{code}`. Supported names: `method`, `uri`,
/// `target`, `version`, `host`, `hostname`, `code`, `phrase`, `req_body`,
/// `res_body`, `ts`, `date_iso_8601`, `date_common_log`, `error`, and
/// `req_header_{name}` / `res_header_{name}`. Unknown names render empty.
/// Authorization headers only show their scheme and a redacted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormatter {
    template: String,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(Self::CLF)
    }
}

impl MessageFormatter {
    /// Apache common log format.
    pub const CLF: &'static str = "{hostname} {req_header_User-Agent} - [{date_common_log}] \"{method} {target} HTTP/{version}\" {code} {res_header_Content-Length}";
    /// Method, target and status.
    pub const SHORT: &'static str = "[{ts}] \"{method} {target} HTTP/{version}\" {code}";
    /// Status code only.
    pub const CODE: &'static str = "{code}";

    /// Create a formatter from a template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the template for one exchange.
    pub fn format(
        &self,
        req: &Request<Bytes>,
        resp: Option<&Response<Bytes>>,
        err: Option<&Error>,
        at: DateTime,
    ) -> String {
        let mut out = String::with_capacity(self.template.len() + 64);
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let name = &rest[start + 1..start + len];
            out.push_str(&placeholder(name, req, resp, err, at));
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        out
    }
}

fn placeholder(
    name: &str,
    req: &Request<Bytes>,
    resp: Option<&Response<Bytes>>,
    err: Option<&Error>,
    at: DateTime,
) -> String {
    if let Some(h) = name.strip_prefix("req_header_") {
        return header_value(req.headers(), h);
    }
    if let Some(h) = name.strip_prefix("res_header_") {
        return resp.map(|r| header_value(r.headers(), h)).unwrap_or_default();
    }

    match name {
        "method" => req.method().to_string(),
        "uri" | "url" => target(req),
        "target" => origin_form(req),
        "version" => version(req.version()).to_string(),
        "host" | "hostname" => req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().host().map(str::to_string))
            .unwrap_or_default(),
        "code" => resp.map(|r| r.status().as_str().to_string()).unwrap_or_else(|| "NULL".to_string()),
        "phrase" => resp
            .and_then(|r| r.status().canonical_reason())
            .unwrap_or_default()
            .to_string(),
        "req_body" => String::from_utf8_lossy(req.body()).to_string(),
        "res_body" => resp
            .map(|r| String::from_utf8_lossy(r.body()).to_string())
            .unwrap_or_default(),
        "ts" | "date_iso_8601" => format_rfc3339(at),
        "date_common_log" => format_common_log(at),
        "error" => err.map(|e| e.to_string()).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Path and query as they will appear on the request line.
fn origin_form(req: &Request<Bytes>) -> String {
    let mut query = Query::parse(req.uri().query().unwrap_or_default());
    if let Some(extra) = req.extensions().get::<Query>() {
        query.extend(extra.clone());
    }

    if query.is_empty() {
        req.uri().path().to_string()
    } else {
        format!("{}?{query}", req.uri().path())
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
        return String::new();
    };
    headers
        .get_all(&name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| display_header_value(&name, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn version(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Emits one formatted line per exchange.
///
/// Lines go to the sink when one is set, otherwise through the `log` facade
/// under the `edgegrid::http` target.
#[derive(Debug, Clone, Default)]
pub struct Log {
    formatter: MessageFormatter,
    sink: Option<Sink>,
}

impl Log {
    /// Create a log stage with the given formatter.
    pub fn new(formatter: MessageFormatter) -> Self {
        Self {
            formatter,
            sink: None,
        }
    }

    /// Write lines to a sink instead of the `log` facade.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }
}

#[async_trait::async_trait]
impl Middleware for Log {
    async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
        let request = req.clone();
        let result = next.run(req).await;

        let line = self
            .formatter
            .format(&request, result.as_ref().ok(), result.as_ref().err(), now());
        match &self.sink {
            Some(sink) => {
                if let Err(err) = sink.write_str(&format!("{line}\n")) {
                    warn!("failed to write log line: {err}");
                }
            }
            None if result.is_err() => error!(target: "edgegrid::http", "{line}"),
            None => info!(target: "edgegrid::http", "{line}"),
        }

        result
    }
}
