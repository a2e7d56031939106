//! Utility functions and types.

use http::header::{HeaderName, AUTHORIZATION, PROXY_AUTHORIZATION};
use std::fmt::Debug;

/// Redacts a string by replacing all but the first and last three characters with asterisks.
///
/// - If the input string has fewer than 12 characters, it is entirely redacted.
/// - If the input is empty, the result is `EMPTY`.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        match value {
            None => Redact(""),
            Some(v) => Redact(v),
        }
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        if length == 0 {
            f.write_str("EMPTY")
        } else if length < 12 || !self.0.is_char_boundary(3) || !self.0.is_char_boundary(length - 3)
        {
            f.write_str("***")
        } else {
            f.write_str(&self.0[..3])?;
            f.write_str("***")?;
            f.write_str(&self.0[length - 3..])
        }
    }
}

/// Render a header value for human readable output.
///
/// Credentials carried in authorization headers keep only their scheme,
/// everything else is returned untouched.
pub fn display_header_value(name: &HeaderName, value: &str) -> String {
    if *name != AUTHORIZATION && *name != PROXY_AUTHORIZATION {
        return value.to_string();
    }

    match value.split_once(' ') {
        Some((scheme, rest)) => format!("{scheme} {:?}", Redact(rest)),
        None => format!("{:?}", Redact(value)),
    }
}
