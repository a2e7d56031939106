use std::fmt::{Display, Formatter, Write};
use std::mem;

use crate::{Error, Result};
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, Method, Uri};

/// Query parameters split off a request target.
///
/// Pairs keep the exact encoding the caller supplied, so joining them back
/// reproduces the original query string byte for byte. Stored as a request
/// extension by dispatchers that hand structured queries to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, Option<String>)>);

impl Query {
    /// Split a raw query string (without the leading `?`) into pairs.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        Query(
            raw.split('&')
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (pair.to_string(), None),
                })
                .collect(),
        )
    }

    /// Raw pairs in their original order.
    pub fn pairs(&self) -> &[(String, Option<String>)] {
        &self.0
    }

    /// Push a raw pair, the caller is responsible for its encoding.
    pub fn push(&mut self, key: impl Into<String>, value: Option<String>) {
        self.0.push((key.into(), value));
    }

    /// Append all pairs of another query.
    pub fn extend(&mut self, other: Query) {
        self.0.extend(other.0);
    }

    /// Whether the query has no pairs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (idx, (k, v)) in self.0.iter().enumerate() {
            if idx != 0 {
                f.write_char('&')?;
            }
            f.write_str(k)?;
            if let Some(v) = v {
                f.write_char('=')?;
                f.write_str(v)?;
            }
        }
        Ok(())
    }
}

/// Move a [`Query`] extension back into the request uri.
///
/// This is the last thing that happens before a request reaches the
/// transport. Requests without the extension are left untouched.
pub fn merge_query_extension(parts: &mut http::request::Parts) -> Result<()> {
    let Some(extra) = parts.extensions.remove::<Query>() else {
        return Ok(());
    };
    if extra.is_empty() {
        return Ok(());
    }

    let mut uri = mem::take(&mut parts.uri).into_parts();
    let paq = uri
        .path_and_query
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    let mut query = Query::parse(paq.query().unwrap_or_default());
    query.extend(extra);

    uri.path_and_query = Some(format!("{}?{}", paq.path(), query).parse::<PathAndQuery>()?);
    parts.uri = Uri::from_parts(uri)?;
    Ok(())
}

/// Signing view of a request.
///
/// Headers are moved out of the request while signing and handed back by
/// [`SigningRequest::apply`]. The target is read, never rewritten.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme, `https` when the target doesn't carry one.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path, encoded as supplied.
    pub path: String,
    /// Query pairs from the uri followed by any [`Query`] extension.
    pub query: Query,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing request from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = &parts.uri;
        let authority = uri.authority().cloned().ok_or_else(|| {
            Error::request_invalid("request without authority is invalid for signing")
        })?;

        let mut query = Query::parse(uri.query().unwrap_or_default());
        if let Some(extra) = parts.extensions.get::<Query>() {
            query.extend(extra.clone());
        }

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme().cloned().unwrap_or(Scheme::HTTPS),
            authority,
            path: match uri.path() {
                "" => "/".to_string(),
                v => v.to_string(),
            },
            query,

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the context.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Hand headers back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        mem::swap(&mut parts.headers, &mut self.headers);
        Ok(())
    }

    /// Path followed by `?query` when a query is present.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Host part of the target without a trailing `/`.
    pub fn host(&self) -> &str {
        self.authority.as_str().trim_end_matches('/')
    }

    /// Get header value by name, case-insensitive.
    ///
    /// Returns `None` if the header is absent.
    pub fn header_get(&self, name: &str) -> Result<Option<&str>> {
        match self.headers.get(name.trim().to_ascii_lowercase().as_str()) {
            Some(v) => Ok(Some(v.to_str()?)),
            None => Ok(None),
        }
    }

    /// Trim a header value and collapse inner whitespace runs into one space.
    pub fn header_value_normalize(v: &str) -> String {
        v.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
