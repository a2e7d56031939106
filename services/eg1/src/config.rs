use crate::constants::*;
use crate::Credential;
use edgegrid_core::utils::Redact;
use edgegrid_core::{Context, Error, Result};
use ini::Ini;
use log::debug;
use std::fmt::{Debug, Formatter};

/// Config for EdgeGrid clients.
///
/// A config is one section worth of settings, loaded either from the
/// environment or from an `.edgerc` file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Client token
    pub client_token: Option<String>,
    /// Client secret
    pub client_secret: Option<String>,
    /// Access token
    pub access_token: Option<String>,
    /// API host, like `akab-xxx.luna.akamaiapis.net`
    pub host: Option<String>,
    /// Byte ceiling for body hashing
    pub max_body_size: Option<usize>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client_token", &Redact::from(&self.client_token))
            .field("client_secret", &Redact::from(&self.client_secret))
            .field("access_token", &Redact::from(&self.access_token))
            .field("host", &self.host)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

impl Config {
    /// Load config from environment variables.
    ///
    /// The `default` section reads `AKAMAI_CLIENT_TOKEN` and friends, any
    /// other section reads `AKAMAI_{SECTION}_CLIENT_TOKEN` instead.
    pub fn from_env(ctx: &Context, section: &str) -> Result<Self> {
        let var = |name: &str| ctx.env_var(&env_key(section, name));

        Ok(Self {
            client_token: var(AKAMAI_CLIENT_TOKEN),
            client_secret: var(AKAMAI_CLIENT_SECRET),
            access_token: var(AKAMAI_ACCESS_TOKEN),
            host: var(AKAMAI_HOST),
            max_body_size: var(AKAMAI_MAX_BODY)
                .map(|v| parse_max_body(&v))
                .transpose()?,
        })
    }

    /// Load one section of an edgerc file.
    ///
    /// Returns `None` if the file can't be read or doesn't have the section.
    pub async fn from_edgerc(ctx: &Context, path: &str, section: &str) -> Result<Option<Self>> {
        let Some(path) = ctx.expand_home_dir(path) else {
            debug!("failed to expand homedir for path: {path}");
            return Ok(None);
        };

        let content = match ctx.file_read(&path).await {
            Ok(content) => content,
            Err(err) => {
                debug!("failed to read edgerc file {path}: {err:?}");
                return Ok(None);
            }
        };

        let conf = Ini::load_from_str(&String::from_utf8_lossy(&content)).map_err(|e| {
            Error::config_invalid(format!("failed to parse edgerc file {path}"))
                .with_source(anyhow::Error::new(e))
        })?;

        let Some(props) = conf.section(Some(section)) else {
            debug!("section {section} not found in edgerc file {path}");
            return Ok(None);
        };

        Ok(Some(Self {
            client_token: props.get("client_token").map(str::to_string),
            client_secret: props.get("client_secret").map(str::to_string),
            access_token: props.get("access_token").map(str::to_string),
            host: props.get("host").map(str::to_string),
            max_body_size: props
                .get("max-body")
                .or_else(|| props.get("max_body"))
                .map(parse_max_body)
                .transpose()?,
        }))
    }

    /// Build a credential if all three signing parts are present.
    pub fn credential(&self) -> Option<Credential> {
        match (&self.client_token, &self.client_secret, &self.access_token) {
            (Some(ct), Some(cs), Some(at)) => Some(Credential {
                client_token: ct.clone(),
                client_secret: cs.clone(),
                access_token: at.clone(),
                host: self.host.clone(),
                max_body_size: self.max_body_size,
            }),
            _ => None,
        }
    }
}

/// Resolve which section to use: explicit value, `EDGERC_SECTION`, then `default`.
pub(crate) fn resolve_section(ctx: &Context, section: Option<&str>) -> String {
    section
        .map(str::to_string)
        .or_else(|| ctx.env_var(EDGERC_SECTION))
        .unwrap_or_else(|| DEFAULT_SECTION.to_string())
}

fn env_key(section: &str, name: &str) -> String {
    if section == DEFAULT_SECTION {
        format!("{AKAMAI_ENV_PREFIX}_{name}")
    } else {
        format!(
            "{AKAMAI_ENV_PREFIX}_{}_{name}",
            section.to_ascii_uppercase().replace('-', "_")
        )
    }
}

fn parse_max_body(v: &str) -> Result<usize> {
    v.trim().parse().map_err(|e| {
        Error::config_invalid(format!("max body size `{v}` is not a number")).with_source(
            anyhow::Error::new(e),
        )
    })
}
