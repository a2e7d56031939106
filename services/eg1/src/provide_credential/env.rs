// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::config::resolve_section;
use crate::{Config, Credential};
use async_trait::async_trait;
use edgegrid_core::{Context, ProvideCredential, Result};

/// EnvCredentialProvider loads EdgeGrid credentials from environment variables.
///
/// This provider looks for the following environment variables:
/// - `AKAMAI_CLIENT_TOKEN`
/// - `AKAMAI_CLIENT_SECRET`
/// - `AKAMAI_ACCESS_TOKEN`
/// - `AKAMAI_HOST` (optional)
///
/// For a section other than `default`, the section name is inserted after
/// the prefix: `AKAMAI_CCU_CLIENT_TOKEN`. The section comes from
/// `with_section()`, then `EDGERC_SECTION`.
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialProvider {
    section: Option<String>,
}

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the section to load.
    pub fn with_section(mut self, section: &str) -> Self {
        self.section = Some(section.to_string());
        self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let section = resolve_section(ctx, self.section.as_deref());
        Ok(Config::from_env(ctx, &section)?.credential())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgegrid_core::StaticEnv;
    use std::collections::HashMap;

    fn ctx(envs: HashMap<String, String>) -> Context {
        Context::new().with_env(StaticEnv {
            home_dir: None,
            envs,
        })
    }

    #[tokio::test]
    async fn test_env_credential_provider() -> anyhow::Result<()> {
        let envs = HashMap::from([
            ("AKAMAI_CLIENT_TOKEN".to_string(), "ct".to_string()),
            ("AKAMAI_CLIENT_SECRET".to_string(), "cs".to_string()),
            ("AKAMAI_ACCESS_TOKEN".to_string(), "at".to_string()),
        ]);

        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx(envs))
            .await?
            .expect("credential must be loaded");
        assert_eq!(cred, Credential::new("ct", "cs", "at"));
        Ok(())
    }

    #[tokio::test]
    async fn test_env_credential_provider_follows_edgerc_section() -> anyhow::Result<()> {
        let envs = HashMap::from([
            ("EDGERC_SECTION".to_string(), "ccu".to_string()),
            ("AKAMAI_CLIENT_TOKEN".to_string(), "ct".to_string()),
            ("AKAMAI_CLIENT_SECRET".to_string(), "cs".to_string()),
            ("AKAMAI_ACCESS_TOKEN".to_string(), "at".to_string()),
            ("AKAMAI_CCU_CLIENT_TOKEN".to_string(), "ccu-ct".to_string()),
            ("AKAMAI_CCU_CLIENT_SECRET".to_string(), "ccu-cs".to_string()),
            ("AKAMAI_CCU_ACCESS_TOKEN".to_string(), "ccu-at".to_string()),
            ("AKAMAI_CCU_HOST".to_string(), "ccu.example.com".to_string()),
        ]);

        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx(envs))
            .await?
            .expect("credential must be loaded");
        assert_eq!(cred.client_token, "ccu-ct");
        assert_eq!(cred.host.as_deref(), Some("ccu.example.com"));
        Ok(())
    }

    #[tokio::test]
    async fn test_env_credential_provider_partial() -> anyhow::Result<()> {
        let envs = HashMap::from([("AKAMAI_CLIENT_TOKEN".to_string(), "ct".to_string())]);

        let cred = EnvCredentialProvider::new()
            .provide_credential(&ctx(envs))
            .await?;
        assert!(cred.is_none());
        Ok(())
    }
}
