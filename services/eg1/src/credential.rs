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

use edgegrid_core::utils::Redact;
use edgegrid_core::SigningCredential;
use std::fmt::{Debug, Formatter};

/// Credential that holds the EdgeGrid client and access tokens.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Client token issued for the API client.
    pub client_token: String,
    /// Client secret, only ever used as an HMAC key.
    pub client_secret: String,
    /// Access token granting the client its permissions.
    pub access_token: String,
    /// API host the credential was issued for.
    pub host: Option<String>,
    /// Byte ceiling for body hashing configured next to the credential.
    pub max_body_size: Option<usize>,
}

impl Credential {
    /// Create a credential from its three signing parts.
    pub fn new(client_token: &str, client_secret: &str, access_token: &str) -> Self {
        Self {
            client_token: client_token.to_string(),
            client_secret: client_secret.to_string(),
            access_token: access_token.to_string(),
            host: None,
            max_body_size: None,
        }
    }

    /// Attach the API host.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Attach the body hashing ceiling.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = Some(size);
        self
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_token", &Redact::from(&self.client_token))
            .field("client_secret", &Redact::from(&self.client_secret))
            .field("access_token", &Redact::from(&self.access_token))
            .field("host", &self.host)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

impl SigningCredential for Credential {
    fn is_valid(&self) -> bool {
        !self.client_token.is_empty()
            && !self.client_secret.is_empty()
            && !self.access_token.is_empty()
    }
}
