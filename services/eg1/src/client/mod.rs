//! An HTTP client that signs every request it sends.
//!
//! [`Client`] threads each request through a [`HandlerStack`] with an
//! `authentication` stage, and optionally `debug`, `verbose` and `logger`
//! stages, before it reaches the transport.

mod logger;
pub use logger::{Log, MessageFormatter};
mod sink;
pub use sink::Sink;
mod stages;
pub use stages::{Authentication, DebugEcho, VerboseEcho};

use crate::constants::*;
use crate::provide_credential::{
    DefaultCredentialProvider, EdgeRcCredentialProvider, StaticCredentialProvider,
};
use crate::{Credential, RequestSigner, SigningOverrides, Timestamp};
use async_trait::async_trait;
use bytes::Bytes;
use edgegrid_core::pipeline::{HandlerStack, Middleware, Placement};
use edgegrid_core::{
    Context, Error, HttpSend, OsEnv, ProvideCredential, ProvideCredentialChain, Query, Result,
    Signer,
};
use edgegrid_file_read_tokio::TokioFileRead;
use edgegrid_http_send_reqwest::ReqwestHttpSend;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::uri::PathAndQuery;
use http::{header, Method, Request, Response, Uri};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const AUTHENTICATION_PLACEMENT: [Placement<'static>; 2] =
    [Placement::Before(STAGE_HISTORY), Placement::Push];
const ECHO_PLACEMENT: [Placement<'static>; 2] =
    [Placement::After(STAGE_ALLOW_REDIRECTS), Placement::Push];
const LOGGER_PLACEMENT: [Placement<'static>; 3] = [
    Placement::After(STAGE_HISTORY),
    Placement::Before(STAGE_ALLOW_REDIRECTS),
    Placement::Push,
];

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    timestamp: Option<String>,
    nonce: Option<String>,
    debug: Option<Sink>,
    headers: HeaderMap,
    stack: Option<HandlerStack>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign with this timestamp, like `20140321T19:34:21+0000`.
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Sign with this nonce.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Echo failures of this request to a sink, unless the client already does.
    pub fn debug(mut self, sink: Sink) -> Self {
        self.debug = Some(sink);
        self
    }

    /// Set a request header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send through this stack instead of the client's.
    ///
    /// The client's stages are added to it with the same rules as at build time.
    pub fn stack(mut self, stack: HandlerStack) -> Self {
        self.stack = Some(stack);
        self
    }
}

/// The stages a client installs into every stack it sends through.
#[derive(Debug, Clone)]
struct Stages {
    authentication: Arc<dyn Middleware>,
    debug: Option<Arc<dyn Middleware>>,
    verbose: Option<Arc<dyn Middleware>>,
    logger: Option<Arc<dyn Middleware>>,
}

impl Stages {
    fn apply(&self, stack: &mut HandlerStack) -> Result<()> {
        if !stack.contains(STAGE_AUTHENTICATION) {
            stack.insert(
                &AUTHENTICATION_PLACEMENT,
                STAGE_AUTHENTICATION,
                self.authentication.clone(),
            )?;
        }
        if let Some(verbose) = &self.verbose {
            if !stack.contains(STAGE_VERBOSE) {
                stack.insert(&ECHO_PLACEMENT, STAGE_VERBOSE, verbose.clone())?;
            }
        }
        if let Some(debug) = &self.debug {
            if !stack.contains(STAGE_DEBUG) {
                stack.insert(&ECHO_PLACEMENT, STAGE_DEBUG, debug.clone())?;
            }
        }
        if let Some(logger) = &self.logger {
            stack.remove(STAGE_LOGGER);
            stack.insert(&LOGGER_PLACEMENT, STAGE_LOGGER, logger.clone())?;
        }
        Ok(())
    }
}

/// Wraps the context transport with a deadline.
#[derive(Debug)]
struct TimeoutSend {
    ctx: Context,
    timeout: Duration,
}

#[async_trait]
impl HttpSend for TimeoutSend {
    async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        tokio::time::timeout(self.timeout, self.ctx.http_send(req))
            .await
            .map_err(|e| {
                Error::unexpected(format!("request timed out after {:?}", self.timeout))
                    .with_source(e)
            })?
    }
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    ctx: Option<Context>,
    provider: Option<ProvideCredentialChain<Credential>>,
    headers_to_sign: Vec<String>,
    max_body_size: Option<usize>,
    host: Option<String>,
    timeout: Duration,
    debug: Option<Sink>,
    verbose: Option<(Sink, Sink)>,
    logger: Option<Log>,
    stack: Option<HandlerStack>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            ctx: None,
            provider: None,
            headers_to_sign: Vec::new(),
            max_body_size: None,
            host: None,
            timeout: DEFAULT_TIMEOUT,
            debug: None,
            verbose: None,
            logger: None,
            stack: None,
        }
    }
}

impl ClientBuilder {
    /// Use this context for transport, file reads and env lookups.
    ///
    /// Defaults to reqwest, tokio fs and the process environment.
    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Sign with these credentials.
    pub fn auth(self, client_token: &str, client_secret: &str, access_token: &str) -> Self {
        self.credential(Credential::new(client_token, client_secret, access_token))
    }

    /// Sign with this credential.
    pub fn credential(self, credential: Credential) -> Self {
        self.credential_provider(StaticCredentialProvider::from(credential))
    }

    /// Load credentials through this provider.
    ///
    /// Without one, credentials come from the environment, then `~/.edgerc`.
    pub fn credential_provider(
        mut self,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        self.provider = Some(ProvideCredentialChain::new().push(provider));
        self
    }

    /// Load credentials, host and max body size from an edgerc section.
    ///
    /// Fails with `CredentialMissing` when the file or section can't be found.
    pub async fn edgerc(mut self, section: Option<&str>, path: Option<&str>) -> Result<Self> {
        let mut provider = EdgeRcCredentialProvider::new();
        if let Some(section) = section {
            provider = provider.with_section(section);
        }
        if let Some(path) = path {
            provider = provider.with_path(path);
        }

        let ctx = self.ctx.clone().unwrap_or_else(default_context);
        let Some(cfg) = provider.load_config(&ctx).await? else {
            return Err(Error::credential_missing(format!(
                "edgerc section `{}` not found",
                section.unwrap_or(DEFAULT_SECTION)
            )));
        };
        let Some(cred) = cfg.credential() else {
            return Err(Error::credential_missing(
                "edgerc section must set client_token, client_secret and access_token",
            ));
        };

        if let Some(host) = &cred.host {
            self.host = Some(host.clone());
        }
        Ok(self.credential(cred))
    }

    /// Replace the ordered list of signed headers.
    pub fn headers_to_sign<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers_to_sign = names.into_iter().map(Into::into).collect();
        self
    }

    /// Byte ceiling for body hashing, must be positive.
    ///
    /// Takes precedence over a `max-body` loaded with the credential. Without
    /// either, 2048 bytes are hashed.
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = Some(size);
        self
    }

    /// API host, with or without scheme. One trailing `/` is ignored.
    ///
    /// Without one, relative targets resolve against the host loaded with
    /// the credential.
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Deadline for the transport call, 10s by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Echo failed exchanges to stderr.
    pub fn debug(mut self, enable: bool) -> Self {
        self.debug = enable.then(Sink::stderr);
        self
    }

    /// Echo failed exchanges to a sink.
    pub fn debug_to(mut self, sink: Sink) -> Self {
        self.debug = Some(sink);
        self
    }

    /// Echo every exchange to stdout, failures to stderr.
    pub fn verbose(mut self, enable: bool) -> Self {
        self.verbose = enable.then(|| (Sink::stdout(), Sink::stderr()));
        self
    }

    /// Echo every exchange to `output`, failures to `error`.
    pub fn verbose_to(mut self, output: Sink, error: Sink) -> Self {
        self.verbose = Some((output, error));
        self
    }

    /// Log one line per exchange.
    pub fn logger(mut self, log: Log) -> Self {
        self.logger = Some(log);
        self
    }

    /// Start from this stack instead of an empty one.
    pub fn stack(mut self, stack: HandlerStack) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let mut request_signer = RequestSigner::new().with_headers_to_sign(self.headers_to_sign);
        if let Some(size) = self.max_body_size {
            let size = NonZeroUsize::new(size)
                .ok_or_else(|| Error::config_invalid("max body size must be positive"))?;
            request_signer = request_signer.with_max_body_size(size);
        }
        let ctx = self.ctx.unwrap_or_else(default_context);
        let provider = self.provider.unwrap_or_else(|| {
            ProvideCredentialChain::new().push(DefaultCredentialProvider::new())
        });

        let signer = Signer::new(ctx.clone(), provider, request_signer);

        let (base_uri, host) = match &self.host {
            Some(host) => {
                let (uri, host) = parse_host(host)?;
                (Some(uri), Some(host))
            }
            None => (None, None),
        };

        let stages = Stages {
            authentication: Arc::new(Authentication::new(signer.clone())),
            debug: self
                .debug
                .map(|sink| Arc::new(DebugEcho::new(sink)) as Arc<dyn Middleware>),
            verbose: self.verbose.map(|(output, error)| {
                Arc::new(VerboseEcho::new(output, error)) as Arc<dyn Middleware>
            }),
            logger: self.logger.map(|log| Arc::new(log) as Arc<dyn Middleware>),
        };
        let mut stack = self.stack.unwrap_or_default();
        stages.apply(&mut stack)?;

        Ok(Client {
            ctx,
            signer,
            base_uri,
            host,
            timeout: self.timeout,
            stack,
            stages,
        })
    }
}

/// Client signs and sends EdgeGrid API requests.
///
/// Clones share the credential and the configured stages, so one client can
/// serve concurrent requests. Each request signs with its own timestamp and
/// nonce.
#[derive(Debug, Clone)]
pub struct Client {
    ctx: Context,
    signer: Signer<Credential>,
    base_uri: Option<Uri>,
    host: Option<String>,
    timeout: Duration,
    stack: HandlerStack,
    stages: Stages,
}

impl Client {
    /// Create a builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Build a client from an edgerc section with default settings.
    pub async fn from_edgerc(section: Option<&str>, path: Option<&str>) -> Result<Self> {
        Self::builder().edgerc(section, path).await?.build()
    }

    /// Replace the credentials used for signing.
    ///
    /// The new triple is used as given. If any part is empty, requests fail
    /// with `CredentialMissing` instead of being signed with older values.
    pub fn set_auth(&self, client_token: &str, client_secret: &str, access_token: &str) {
        self.signer
            .set_credential(Credential::new(client_token, client_secret, access_token));
    }

    /// Replace the logger stage.
    pub fn set_logger(&mut self, log: Log) -> Result<()> {
        self.stages.logger = Some(Arc::new(log));
        self.stages.apply(&mut self.stack)
    }

    /// Append one formatted line per exchange to a file.
    ///
    /// `MessageFormatter::CODE` logs just the status code.
    pub fn set_simple_log(&mut self, path: impl AsRef<Path>, format: &str) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.set_logger(Log::new(MessageFormatter::new(format)).with_sink(Sink::new(file)))
    }

    /// Replace the transport deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Transport deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Host header value sent by default.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The stack requests go through.
    pub fn stack(&self) -> &HandlerStack {
        &self.stack
    }

    /// The signer used by the authentication stage.
    pub fn signer(&self) -> &Signer<Credential> {
        &self.signer
    }

    /// Send a request.
    ///
    /// `uri` may be absolute, or relative to the configured host or the
    /// host of the loaded credential.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: impl Into<Bytes>,
        opts: RequestOptions,
    ) -> Result<Response<Bytes>> {
        let (uri, host) = self.resolve_uri(uri).await?;
        let (uri, query) = split_query(uri)?;

        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())?;
        req.headers_mut().extend(opts.headers);
        apply_default_headers(req.headers_mut(), host.as_deref())?;

        if !query.is_empty() {
            req.extensions_mut().insert(query);
        }
        req.extensions_mut().insert(SigningOverrides {
            timestamp: opts
                .timestamp
                .as_deref()
                .map(str::parse::<Timestamp>)
                .transpose()?,
            nonce: opts.nonce,
        });

        let stack = self.request_stack(opts.stack, opts.debug)?;
        let transport = TimeoutSend {
            ctx: self.ctx.clone(),
            timeout: self.timeout,
        };
        stack.send(&transport, req).await
    }

    /// Send a GET request.
    pub async fn get(&self, uri: &str, opts: RequestOptions) -> Result<Response<Bytes>> {
        self.request(Method::GET, uri, Bytes::new(), opts).await
    }

    /// Send a HEAD request.
    pub async fn head(&self, uri: &str, opts: RequestOptions) -> Result<Response<Bytes>> {
        self.request(Method::HEAD, uri, Bytes::new(), opts).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, uri: &str, opts: RequestOptions) -> Result<Response<Bytes>> {
        self.request(Method::DELETE, uri, Bytes::new(), opts).await
    }

    /// Send a POST request.
    pub async fn post(
        &self,
        uri: &str,
        body: impl Into<Bytes>,
        opts: RequestOptions,
    ) -> Result<Response<Bytes>> {
        self.request(Method::POST, uri, body, opts).await
    }

    /// Send a PUT request.
    pub async fn put(
        &self,
        uri: &str,
        body: impl Into<Bytes>,
        opts: RequestOptions,
    ) -> Result<Response<Bytes>> {
        self.request(Method::PUT, uri, body, opts).await
    }

    fn request_stack(
        &self,
        stack: Option<HandlerStack>,
        debug: Option<Sink>,
    ) -> Result<Cow<'_, HandlerStack>> {
        let mut stack = match stack {
            Some(mut stack) => {
                self.stages.apply(&mut stack)?;
                Cow::Owned(stack)
            }
            None => Cow::Borrowed(&self.stack),
        };

        if let Some(sink) = debug {
            if !stack.contains(STAGE_DEBUG) {
                stack.to_mut().insert(
                    &ECHO_PLACEMENT,
                    STAGE_DEBUG,
                    Arc::new(DebugEcho::new(sink)),
                )?;
            }
        }
        Ok(stack)
    }

    /// Resolve a target into the uri to send and, for relative targets, the
    /// default `Host` header value.
    async fn resolve_uri(&self, target: &str) -> Result<(Uri, Option<String>)> {
        if is_absolute(target) {
            let uri: Uri = target.parse()?;
            if uri.authority().is_none() {
                return Err(Error::request_invalid(format!(
                    "target `{target}` has no authority"
                )));
            }
            return Ok((uri, None));
        }

        let Some((base, host)) = self.base().await? else {
            return Err(Error::request_invalid(format!(
                "relative target `{target}` needs a host"
            )));
        };
        Ok((join_uri(&base, target)?, Some(host)))
    }

    /// The configured base uri, else the host loaded with the credential.
    async fn base(&self) -> Result<Option<(Uri, String)>> {
        if let (Some(uri), Some(host)) = (&self.base_uri, &self.host) {
            return Ok(Some((uri.clone(), host.clone())));
        }

        let Some(cred) = self.signer.credential().await? else {
            return Ok(None);
        };
        cred.host.as_deref().map(parse_host).transpose()
    }
}

/// Whether the target starts with a scheme followed by `://`.
fn is_absolute(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Join a relative target onto the base uri, like a browser would for
/// paths. The base query is never kept.
fn join_uri(base: &Uri, target: &str) -> Result<Uri> {
    let paq = if target.starts_with('/') {
        target.to_string()
    } else {
        let base_path = base.path();
        let dir = base_path
            .rfind('/')
            .map(|i| &base_path[..=i])
            .unwrap_or("/");
        format!("{dir}{target}")
    };

    let mut parts = base.clone().into_parts();
    parts.path_and_query = Some(paq.parse::<PathAndQuery>()?);
    Ok(Uri::from_parts(parts)?)
}

fn apply_default_headers(headers: &mut HeaderMap, host: Option<&str>) -> Result<()> {
    if let Some(host) = host {
        if !headers.contains_key(header::HOST) {
            headers.insert(header::HOST, HeaderValue::from_str(host)?);
        }
    }
    if !headers.contains_key(header::USER_AGENT) {
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    }
    Ok(())
}

fn default_context() -> Context {
    Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv)
}

/// Split a host setting into the base uri and the `Host` header value.
fn parse_host(host: &str) -> Result<(Uri, String)> {
    let host = host.strip_suffix('/').unwrap_or(host);
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };

    let uri: Uri = base.parse()?;
    let authority = uri
        .authority()
        .map(|v| v.to_string())
        .ok_or_else(|| Error::config_invalid(format!("host `{host}` has no authority")))?;
    Ok((uri, authority))
}

/// Move the query string out of the uri into a [`Query`] extension value.
///
/// A bare trailing `?` is dropped so the uri sent matches the one signed.
fn split_query(uri: Uri) -> Result<(Uri, Query)> {
    let Some(raw) = uri.query() else {
        return Ok((uri, Query::default()));
    };
    let query = Query::parse(raw);

    let path = uri.path().to_string();
    let mut parts = uri.into_parts();
    parts.path_and_query = Some(path.parse::<PathAndQuery>()?);
    Ok((Uri::from_parts(parts)?, query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sink::tests::Buffer;
    use edgegrid_core::pipeline::{History, Next};
    use edgegrid_core::{ErrorKind, StaticEnv};
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records what reached the transport.
    #[derive(Debug, Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Request<Bytes>>>>);

    impl Recorder {
        fn requests(&self) -> Vec<Request<Bytes>> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpSend for Recorder {
        async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
            self.0.lock().unwrap().push(req);
            Ok(Response::new(Bytes::from_static(b"{}")))
        }
    }

    #[derive(Debug)]
    struct Passthrough;

    #[async_trait]
    impl Middleware for Passthrough {
        async fn handle(&self, req: Request<Bytes>, next: Next<'_>) -> Result<Response<Bytes>> {
            next.run(req).await
        }
    }

    fn ctx(transport: impl HttpSend) -> Context {
        Context::new().with_http_send(transport).with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::new(),
        })
    }

    fn builder(recorder: &Recorder) -> ClientBuilder {
        Client::builder()
            .context(ctx(recorder.clone()))
            .auth("ct", "cs", "at")
            .host("example.luna.akamaiapis.net/")
    }

    #[tokio::test]
    async fn test_request_signs_and_restores_query() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = builder(&recorder).build()?;

        let resp = client
            .get(
                "/papi/v1/groups?contractId=ctr_1&x=a%20b",
                RequestOptions::new()
                    .timestamp("20140321T19:34:21+0000")
                    .nonce("nonce123"),
            )
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);

        let sent = recorder.requests();
        assert_eq!(sent.len(), 1);
        let req = &sent[0];
        assert_eq!(
            req.uri(),
            "https://example.luna.akamaiapis.net/papi/v1/groups?contractId=ctr_1&x=a%20b"
        );
        assert_eq!(req.headers()[header::HOST], "example.luna.akamaiapis.net");
        assert_eq!(req.headers()[header::USER_AGENT], USER_AGENT);

        let authorization = req.headers()[header::AUTHORIZATION].to_str()?;
        assert!(authorization.starts_with(
            "EG1-HMAC-SHA256 client_token=ct;access_token=at;timestamp=20140321T19:34:21+0000;nonce=nonce123;signature="
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_signature_matches_direct_signing() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = Client::builder()
            .context(ctx(recorder.clone()))
            .auth("a", "b", "c")
            .host("example.com")
            .build()?;

        client
            .get(
                "/v1/x",
                RequestOptions::new()
                    .timestamp("20140321T19:34:21+0000")
                    .nonce("nonce123"),
            )
            .await?;

        let sent = recorder.requests();
        let authorization = sent[0].headers()[header::AUTHORIZATION].to_str()?;
        assert!(authorization.ends_with(";signature=uN925Jd9mUzHCupsiu3nZd/en+Ph0FuXXu6U/CeRIWI="));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_timestamp_is_not_sent() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = builder(&recorder).build()?;

        let err = client
            .get("/x", RequestOptions::new().timestamp("yesterday"))
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::TimestampInvalid);
        assert!(recorder.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_credentials_never_send() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = Client::builder()
            .context(ctx(recorder.clone()))
            .host("example.com")
            .build()?;

        let err = client
            .get("/x", RequestOptions::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::CredentialMissing);
        assert!(recorder.requests().is_empty());

        client.set_auth("ct", "cs", "at");
        client.get("/x", RequestOptions::new()).await?;
        assert_eq!(recorder.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_auth_with_empty_part_never_uses_old_credentials() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = Client::builder()
            .context(ctx(recorder.clone()))
            .auth("old-ct", "old-cs", "old-at")
            .host("example.com")
            .build()?;
        client.get("/x", RequestOptions::new()).await?;
        assert_eq!(recorder.requests().len(), 1);

        client.set_auth("new-ct", "", "new-at");
        let err = client
            .get("/x", RequestOptions::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::CredentialMissing);
        assert_eq!(recorder.requests().len(), 1);
        Ok(())
    }

    #[test]
    fn test_zero_max_body_size_is_rejected() {
        let err = Client::builder()
            .context(ctx(Recorder::default()))
            .max_body_size(0)
            .build()
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_default_stage_order() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = builder(&recorder)
            .debug_to(Buffer::default().sink())
            .verbose_to(Buffer::default().sink(), Buffer::default().sink())
            .logger(Log::default())
            .build()?;
        assert_eq!(
            client.stack().names(),
            vec!["authentication", "verbose", "debug", "logger"]
        );
        Ok(())
    }

    #[test]
    fn test_stage_order_with_anchors() -> anyhow::Result<()> {
        let mut base = HandlerStack::new();
        base.push("allow_redirects", Passthrough)
            .push("history", History::new())
            .push("prepare_body", Passthrough);

        let recorder = Recorder::default();
        let client = builder(&recorder)
            .stack(base)
            .debug_to(Buffer::default().sink())
            .verbose_to(Buffer::default().sink(), Buffer::default().sink())
            .logger(Log::default())
            .build()?;
        assert_eq!(
            client.stack().names(),
            vec![
                "allow_redirects",
                "debug",
                "verbose",
                "authentication",
                "history",
                "logger",
                "prepare_body"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_logger_is_replaced() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let mut client = builder(&recorder).logger(Log::default()).build()?;
        client.set_logger(Log::new(MessageFormatter::new(MessageFormatter::SHORT)))?;
        client.set_logger(Log::new(MessageFormatter::new(MessageFormatter::CODE)))?;

        assert_eq!(
            client.stack().names(),
            vec!["authentication", "logger"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_per_request_stack_is_not_duplicated() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = builder(&recorder)
            .debug_to(Buffer::default().sink())
            .verbose_to(Buffer::default().sink(), Buffer::default().sink())
            .build()?;

        let history = History::new();
        let mut stack = HandlerStack::new();
        stack.push("history", history.clone());

        // Installing into the same stack twice keeps one of each stage.
        let mut prepared = stack.clone();
        client.stages.apply(&mut prepared)?;
        client.stages.apply(&mut prepared)?;
        assert_eq!(
            prepared.names(),
            vec!["authentication", "history", "verbose", "debug"]
        );

        client
            .get("/x", RequestOptions::new().stack(prepared.clone()))
            .await?;
        assert_eq!(history.len(), 1);

        let transactions = history.transactions();
        assert!(transactions[0]
            .request
            .headers()
            .contains_key(header::AUTHORIZATION));
        Ok(())
    }

    #[tokio::test]
    async fn test_per_request_debug_sink() -> anyhow::Result<()> {
        #[derive(Debug)]
        struct Forbidden;

        #[async_trait]
        impl HttpSend for Forbidden {
            async fn http_send(&self, _: Request<Bytes>) -> Result<Response<Bytes>> {
                let mut resp = Response::new(Bytes::new());
                *resp.status_mut() = StatusCode::FORBIDDEN;
                Ok(resp)
            }
        }

        let client = Client::builder()
            .context(ctx(Forbidden))
            .auth("ct", "cs", "at")
            .host("example.com")
            .build()?;

        let buf = Buffer::default();
        let resp = client
            .get("/x", RequestOptions::new().debug(buf.sink()))
            .await?;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(buf.contents().contains("403 Forbidden"));
        assert_eq!(client.stack().names(), vec!["authentication"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout() -> anyhow::Result<()> {
        #[derive(Debug)]
        struct Slow;

        #[async_trait]
        impl HttpSend for Slow {
            async fn http_send(&self, _: Request<Bytes>) -> Result<Response<Bytes>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Response::new(Bytes::new()))
            }
        }

        let mut client = Client::builder()
            .context(ctx(Slow))
            .auth("ct", "cs", "at")
            .host("example.com")
            .build()?;
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        client.set_timeout(Duration::from_millis(10));

        let err = client
            .get("/x", RequestOptions::new())
            .await
            .expect_err("must time out");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_uri() -> anyhow::Result<()> {
        let client = Client::builder()
            .context(ctx(Recorder::default()))
            .host("https://example.com/")
            .build()?;

        assert_eq!(client.host(), Some("example.com"));
        let (uri, host) = client.resolve_uri("/a/b").await?;
        assert_eq!(uri, "https://example.com/a/b");
        assert_eq!(host.as_deref(), Some("example.com"));
        let (uri, _) = client.resolve_uri("a/b").await?;
        assert_eq!(uri, "https://example.com/a/b");
        let (uri, host) = client.resolve_uri("http://other.com/x").await?;
        assert_eq!(uri, "http://other.com/x");
        assert_eq!(host, None);

        let bare = Client::builder()
            .context(ctx(Recorder::default()))
            .build()?;
        let err = bare.resolve_uri("/a").await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::RequestInvalid);
        Ok(())
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("https://example.com/x"));
        assert!(is_absolute("svn+ssh://example.com"));
        assert!(!is_absolute("/redirect?to=https://other.com/"));
        assert!(!is_absolute("a/b?next=http://x"));
        assert!(!is_absolute("://example.com"));
    }

    #[tokio::test]
    async fn test_relative_target_with_url_in_query() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = builder(&recorder).build()?;

        client
            .get("/redirect?to=https://other.com/", RequestOptions::new())
            .await?;
        let sent = recorder.requests();
        assert_eq!(
            sent[0].uri(),
            "https://example.luna.akamaiapis.net/redirect?to=https://other.com/"
        );
        assert!(sent[0].headers().contains_key(header::AUTHORIZATION));
        Ok(())
    }

    #[tokio::test]
    async fn test_bare_question_mark_is_not_sent() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let client = builder(&recorder).build()?;
        let pinned = || {
            RequestOptions::new()
                .timestamp("20140321T19:34:21+0000")
                .nonce("nonce123")
        };

        client.get("/x?", pinned()).await?;
        client.get("/x", pinned()).await?;

        let sent = recorder.requests();
        assert_eq!(sent[0].uri(), "https://example.luna.akamaiapis.net/x");
        assert_eq!(
            sent[0].headers()[header::AUTHORIZATION],
            sent[1].headers()[header::AUTHORIZATION]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_host_and_max_body_from_loaded_credential() -> anyhow::Result<()> {
        let recorder = Recorder::default();
        let envs = HashMap::from([
            ("AKAMAI_CLIENT_TOKEN".to_string(), "ct".to_string()),
            ("AKAMAI_CLIENT_SECRET".to_string(), "cs".to_string()),
            ("AKAMAI_ACCESS_TOKEN".to_string(), "at".to_string()),
            ("AKAMAI_HOST".to_string(), "env.luna.akamaiapis.net/".to_string()),
            ("AKAMAI_MAX_BODY".to_string(), "4".to_string()),
        ]);
        let client = Client::builder()
            .context(
                Context::new()
                    .with_http_send(recorder.clone())
                    .with_env(StaticEnv {
                        home_dir: None,
                        envs,
                    }),
            )
            .build()?;
        assert_eq!(client.host(), None);

        let pinned = || {
            RequestOptions::new()
                .timestamp("20140321T19:34:21+0000")
                .nonce("nonce123")
        };
        client.post("/x", "abcdef", pinned()).await?;
        client.post("/x", "abcdXX", pinned()).await?;
        client.post("/x", "abc", pinned()).await?;

        let sent = recorder.requests();
        assert_eq!(sent[0].uri(), "https://env.luna.akamaiapis.net/x");
        assert_eq!(sent[0].headers()[header::HOST], "env.luna.akamaiapis.net");
        assert_eq!(
            sent[0].headers()[header::AUTHORIZATION],
            sent[1].headers()[header::AUTHORIZATION]
        );
        assert_ne!(
            sent[0].headers()[header::AUTHORIZATION],
            sent[2].headers()[header::AUTHORIZATION]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_simple_log() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("http.log");

        let recorder = Recorder::default();
        let mut client = builder(&recorder).build()?;
        client.set_simple_log(&path, MessageFormatter::CODE)?;
        client.get("/x", RequestOptions::new()).await?;
        client.get("/y", RequestOptions::new()).await?;

        assert_eq!(std::fs::read_to_string(&path)?, "200\n200\n");
        Ok(())
    }
}
