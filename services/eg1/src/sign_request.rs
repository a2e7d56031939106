use crate::constants::{DEFAULT_MAX_BODY_SIZE, EG1_HMAC_SHA256};
use crate::Credential;
use async_trait::async_trait;
use edgegrid_core::hash::{base64_hmac_sha256, base64_sha256};
use edgegrid_core::time::{format_edgegrid_timestamp, now, parse_edgegrid_timestamp, DateTime};
use edgegrid_core::{Context, Error, Result, SignRequest, SigningCredential, SigningRequest};
use http::request::Parts;
use http::{header, HeaderValue};
use log::debug;
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp in the fixed-width EG1 layout: `20140321T19:34:21+0000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timestamp(String);

impl Timestamp {
    /// Timestamp of the current moment.
    pub fn now() -> Self {
        Self::from_datetime(now())
    }

    /// Timestamp of the given moment.
    pub fn from_datetime(t: DateTime) -> Self {
        Self(format_edgegrid_timestamp(t))
    }

    /// The timestamp as it appears in the header.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_edgegrid_timestamp(s)?;
        Ok(Self(s.to_string()))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request signing inputs, carried in the request extensions.
///
/// Anything left unset is generated right before that request is signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningOverrides {
    /// Timestamp to sign with instead of the current time.
    pub timestamp: Option<Timestamp>,
    /// Nonce to sign with instead of a fresh UUID v4.
    pub nonce: Option<String>,
}

impl SigningOverrides {
    /// Pin the timestamp.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Pin the nonce.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// The seven fields that make up the string to sign.
///
/// `Display` renders them joined by tabs, which is exactly what gets signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Uppercased method.
    pub method: String,
    /// `https` unless the target carries another scheme.
    pub scheme: String,
    /// Host without a trailing `/`.
    pub host: String,
    /// Path and query, encoded as supplied.
    pub path_and_query: String,
    /// Signed headers, `name:value` joined by tabs.
    pub headers: String,
    /// Base64 SHA-256 of the (truncated) body, empty when not hashed.
    pub content_hash: String,
    /// Authorization header value up to `signature=`.
    pub auth_header_prefix: String,
}

impl Display for CanonicalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.method,
            self.scheme,
            self.host,
            self.path_and_query,
            self.headers,
            self.content_hash,
            self.auth_header_prefix
        )
    }
}

/// RequestSigner that implements EG1-HMAC-SHA256.
///
/// It only holds static configuration. The timestamp and nonce of a request
/// come from its [`SigningOverrides`] or are generated per request.
///
/// The body hashing ceiling is, in order: the one set here, the one carried
/// by the credential, then 2048 bytes.
#[derive(Debug, Clone, Default)]
pub struct RequestSigner {
    headers_to_sign: Vec<String>,
    max_body_size: Option<NonZeroUsize>,
}

impl RequestSigner {
    /// Create a new signer that signs no headers and hashes up to 2048 bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ordered list of headers that take part in the signature.
    pub fn with_headers_to_sign<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers_to_sign = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the byte ceiling for body hashing.
    pub fn with_max_body_size(mut self, size: NonZeroUsize) -> Self {
        self.max_body_size = Some(size);
        self
    }

    /// Headers that take part in the signature.
    pub fn headers_to_sign(&self) -> &[String] {
        &self.headers_to_sign
    }

    /// Byte ceiling for body hashing when signing with this credential.
    pub fn max_body_size(&self, cred: &Credential) -> usize {
        self.max_body_size
            .map(NonZeroUsize::get)
            .or(cred.max_body_size.filter(|v| *v > 0))
            .unwrap_or(DEFAULT_MAX_BODY_SIZE)
    }

    /// Build the full authorization header value for one request.
    ///
    /// This is a pure function of its inputs: the same request, credential,
    /// timestamp and nonce always give the same value.
    pub fn authorization(
        &self,
        req: &SigningRequest,
        body: &[u8],
        cred: &Credential,
        timestamp: &Timestamp,
        nonce: &str,
    ) -> Result<String> {
        check_header_field("client_token", &cred.client_token)?;
        check_header_field("access_token", &cred.access_token)?;
        check_header_field("nonce", nonce)?;

        let prefix = auth_header_prefix(cred, timestamp, nonce);
        let creq = canonicalize(
            req,
            body,
            &self.headers_to_sign,
            self.max_body_size(cred),
            &prefix,
        )?;
        debug!(
            "calculated canonical request: {} {}://{}{} headers=[{}] content_hash={}",
            creq.method,
            creq.scheme,
            creq.host,
            creq.path_and_query,
            creq.headers,
            creq.content_hash
        );

        let signature = sign(&creq, cred, timestamp);
        Ok(format!("{prefix}signature={signature}"))
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        body: &[u8],
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let Some(cred) = credential.filter(|c| c.is_valid()) else {
            return Err(Error::credential_missing(
                "client_token, client_secret and access_token must be set before signing",
            ));
        };

        let overrides = req
            .extensions
            .get::<SigningOverrides>()
            .cloned()
            .unwrap_or_default();
        let timestamp = overrides.timestamp.unwrap_or_else(Timestamp::now);
        let nonce = overrides
            .nonce
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut signing_req = SigningRequest::build(req)?;
        let authorization = self
            .authorization(&signing_req, body, cred, &timestamp, &nonce)
            .and_then(|v| -> Result<HeaderValue> {
                let mut value = HeaderValue::from_str(&v)?;
                value.set_sensitive(true);
                Ok(value)
            });

        match authorization {
            Ok(value) => {
                signing_req.headers.insert(header::AUTHORIZATION, value);
                signing_req.apply(req)
            }
            Err(err) => {
                // Headers must go back even if nothing gets attached.
                signing_req.apply(req)?;
                Err(err)
            }
        }
    }
}

/// Turn a request into the fields of the string to sign.
///
/// Only a POST with a non-empty body gets a content hash, computed over at
/// most `max_body_size` bytes. Configured headers the request doesn't carry
/// are left out entirely.
pub fn canonicalize(
    req: &SigningRequest,
    body: &[u8],
    headers_to_sign: &[String],
    max_body_size: usize,
    auth_header_prefix: &str,
) -> Result<CanonicalRequest> {
    let method = req.method.as_str().to_ascii_uppercase();

    let mut headers = Vec::with_capacity(headers_to_sign.len());
    for name in headers_to_sign {
        let name = name.trim();
        if let Some(value) = req.header_get(name)? {
            headers.push(format!(
                "{}:{}",
                name.to_ascii_lowercase(),
                SigningRequest::header_value_normalize(value)
            ));
        }
    }

    let content_hash = if method == "POST" && !body.is_empty() {
        base64_sha256(&body[..body.len().min(max_body_size)])
    } else {
        String::new()
    };

    Ok(CanonicalRequest {
        method,
        scheme: req.scheme.as_str().to_string(),
        host: req.host().to_string(),
        path_and_query: req.path_and_query(),
        headers: headers.join("\t"),
        content_hash,
        auth_header_prefix: auth_header_prefix.to_string(),
    })
}

/// Authorization header value without the signature.
///
/// The trailing `;` is part of the signed data.
pub fn auth_header_prefix(cred: &Credential, timestamp: &Timestamp, nonce: &str) -> String {
    format!(
        "{EG1_HMAC_SHA256} client_token={};access_token={};timestamp={};nonce={};",
        cred.client_token, cred.access_token, timestamp, nonce
    )
}

/// Derive the signing key for a timestamp: base64(HMAC(secret, timestamp)).
pub fn signing_key(client_secret: &str, timestamp: &Timestamp) -> String {
    base64_hmac_sha256(client_secret.as_bytes(), timestamp.as_str().as_bytes())
}

/// Sign a canonical request.
///
/// The HMAC key is the base64 text of the signing key, not its decoded bytes.
pub fn sign(creq: &CanonicalRequest, cred: &Credential, timestamp: &Timestamp) -> String {
    let key = signing_key(&cred.client_secret, timestamp);
    base64_hmac_sha256(key.as_bytes(), creq.to_string().as_bytes())
}

fn check_header_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_graphic() && b != b';') {
        return Err(Error::credential_invalid(format!(
            "{field} can't be encoded into the authorization header"
        )));
    }
    Ok(())
}
