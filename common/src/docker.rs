// Copyright (c) The Up Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;

use crate::config::RegistryConfig;

/// One entry of a legacy `.dockercfg` payload.
#[derive(Serialize)]
pub struct DockercfgEntry {
    pub username: String,
    pub password: String,
    pub email: String,
    pub auth: String,
}

#[derive(Serialize)]
pub struct AuthConfig {
    pub auth: String,
}

/// A modern `config.json` payload.
#[derive(Serialize)]
pub struct DockerConfig {
    pub auths: HashMap<String, AuthConfig>,
}

/// Base64 of `username:password`, as both payload formats expect it.
pub fn registry_auth(registry: &RegistryConfig) -> String {
    BASE64.encode(format!("{}:{}", registry.username, registry.password))
}

/// The legacy `.dockercfg` payload keyed by registry URL.
pub fn dockercfg(registry: &RegistryConfig) -> serde_json::Result<String> {
    let entry = DockercfgEntry {
        username: registry.username.clone(),
        password: registry.password.clone(),
        email: registry.email.clone(),
        auth: registry_auth(registry),
    };

    serde_json::to_string(&HashMap::from([(registry.url.clone(), entry)]))
}

/// The `config.json` payload consumed by kaniko and the kubelet.
pub fn config_json(registry: &RegistryConfig) -> serde_json::Result<String> {
    let config = DockerConfig {
        auths: HashMap::from([(registry.url.clone(), AuthConfig { auth: registry_auth(registry) })]),
    };

    serde_json::to_string(&config)
}
