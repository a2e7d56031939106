use crate::Credential;
use async_trait::async_trait;
use edgegrid_core::{Context, ProvideCredential, Result};

/// StaticCredentialProvider provides a credential set in code.
///
/// This is what `set_auth` on a client boils down to.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Create a new StaticCredentialProvider from the three signing parts.
    pub fn new(client_token: &str, client_secret: &str, access_token: &str) -> Self {
        Self {
            credential: Credential::new(client_token, client_secret, access_token),
        }
    }

    /// Set the API host.
    pub fn with_host(mut self, host: &str) -> Self {
        self.credential.host = Some(host.to_string());
        self
    }
}

impl From<Credential> for StaticCredentialProvider {
    fn from(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl ProvideCredential for StaticCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        Ok(Some(self.credential.clone()))
    }
}
