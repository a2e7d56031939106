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

use std::time::Duration;

// Signing scheme.
pub const EG1_HMAC_SHA256: &str = "EG1-HMAC-SHA256";
pub const DEFAULT_MAX_BODY_SIZE: usize = 2048;

// Env values used by edgegrid clients.
pub const EDGERC: &str = "EDGERC";
pub const EDGERC_SECTION: &str = "EDGERC_SECTION";
pub const AKAMAI_CLIENT_TOKEN: &str = "CLIENT_TOKEN";
pub const AKAMAI_CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const AKAMAI_ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const AKAMAI_HOST: &str = "HOST";
pub const AKAMAI_MAX_BODY: &str = "MAX_BODY";
pub const AKAMAI_ENV_PREFIX: &str = "AKAMAI";

// Edgerc layout.
pub const DEFAULT_SECTION: &str = "default";
pub const DEFAULT_EDGERC_PATHS: [&str; 2] = ["~/.edgerc", ".edgerc"];

// Stage names inside the handler stack.
pub const STAGE_AUTHENTICATION: &str = "authentication";
pub const STAGE_DEBUG: &str = "debug";
pub const STAGE_VERBOSE: &str = "verbose";
pub const STAGE_LOGGER: &str = "logger";
pub const STAGE_HISTORY: &str = "history";
pub const STAGE_ALLOW_REDIRECTS: &str = "allow_redirects";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = concat!("edgegrid-rust/", env!("CARGO_PKG_VERSION"));
