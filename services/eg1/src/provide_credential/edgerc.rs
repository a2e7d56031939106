use crate::config::resolve_section;
use crate::constants::*;
use crate::{Config, Credential};
use async_trait::async_trait;
use edgegrid_core::{Context, ProvideCredential, Result};
use log::debug;

/// EdgeRcCredentialProvider loads EdgeGrid credentials from an edgerc file.
///
/// The file is picked by:
/// 1. The path specified via `with_path()`
/// 2. The `EDGERC` environment variable
/// 3. `~/.edgerc`, then `.edgerc` in the working directory
///
/// The section is picked by `with_section()`, then `EDGERC_SECTION`, and
/// defaults to `default`. A missing file or section yields no credential.
#[derive(Debug, Default, Clone)]
pub struct EdgeRcCredentialProvider {
    path: Option<String>,
    section: Option<String>,
}

impl EdgeRcCredentialProvider {
    /// Create a new EdgeRcCredentialProvider with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to the edgerc file.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the section name to use.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Load the whole section, including the host and max body size.
    pub async fn load_config(&self, ctx: &Context) -> Result<Option<Config>> {
        let section = resolve_section(ctx, self.section.as_deref());

        let paths = match (&self.path, ctx.env_var(EDGERC)) {
            (Some(path), _) => vec![path.clone()],
            (None, Some(path)) => vec![path],
            (None, None) => DEFAULT_EDGERC_PATHS.iter().map(|v| v.to_string()).collect(),
        };

        for path in paths {
            if let Some(cfg) = Config::from_edgerc(ctx, &path, &section).await? {
                debug!("loaded section {section} from edgerc file {path}");
                return Ok(Some(cfg));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ProvideCredential for EdgeRcCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        Ok(self
            .load_config(ctx)
            .await?
            .and_then(|cfg| cfg.credential()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegrid_core::StaticEnv;
    use edgegrid_file_read_tokio::TokioFileRead;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_edgerc(path: &PathBuf, section: &str, token: &str) -> anyhow::Result<()> {
        let mut f = File::create(path)?;
        writeln!(f, "[{section}]")?;
        writeln!(f, "client_token = {token}")?;
        writeln!(f, "client_secret = secret")?;
        writeln!(f, "access_token = access")?;
        writeln!(f, "host = example.luna.akamaiapis.net")?;
        Ok(())
    }

    #[tokio::test]
    async fn test_edgerc_from_home_dir() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let home = tempdir()?;
        write_edgerc(&home.path().join(".edgerc"), "default", "home-token")?;

        let ctx = Context::new().with_file_read(TokioFileRead).with_env(StaticEnv {
            home_dir: Some(home.path().to_path_buf()),
            envs: HashMap::new(),
        });

        let cred = EdgeRcCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(cred.client_token, "home-token");
        assert_eq!(cred.host.as_deref(), Some("example.luna.akamaiapis.net"));
        Ok(())
    }

    #[tokio::test]
    async fn test_edgerc_env_overrides_path_and_section() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempdir()?;
        let path = dir.path().join("custom.edgerc");
        write_edgerc(&path, "ccu", "ccu-token")?;

        let ctx = Context::new().with_file_read(TokioFileRead).with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from([
                (EDGERC.to_string(), path.to_string_lossy().to_string()),
                (EDGERC_SECTION.to_string(), "ccu".to_string()),
            ]),
        });

        let cred = EdgeRcCredentialProvider::new()
            .provide_credential(&ctx)
            .await?
            .expect("credential must be loaded");
        assert_eq!(cred.client_token, "ccu-token");

        let missing = EdgeRcCredentialProvider::new()
            .with_section("papi")
            .provide_credential(&ctx)
            .await?;
        assert!(missing.is_none());
        Ok(())
    }
}
