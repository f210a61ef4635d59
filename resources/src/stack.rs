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

use kube::Client;
use up_common::config::UpConfig;
use up_common::event::Events;
use up_common::storage::Storage;

use super::error::Result;
use super::{namespace, secret};

/// Namespace name for a project stage.
pub fn namespace_name(project: &str, stage: &str) -> String {
    format!("up-{}-{}", project, stage)
}

/// The per-project, per-stage capability record: namespace plus the
/// client handles later stages consult.
#[derive(Clone)]
pub struct Stack {
    name: String,
    config: UpConfig,
    events: Events,
    k8s: Client,
    storage: Storage,
}

impl Stack {
    pub fn new(name: String, config: UpConfig, events: Events, k8s: Client, storage: Storage) -> Self {
        Self { name, config, events, k8s, storage }
    }

    pub fn namespace(&self) -> &str {
        &self.name
    }

    pub fn k8s(&self) -> &Client {
        &self.k8s
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &UpConfig {
        &self.config
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Idempotent provisioning: the namespace, then the registry-auth
    /// secret when the registry requires one.
    pub async fn create(&self) -> Result<()> {
        namespace::create(&self.k8s, &self.name).await?;

        let registry = &self.config.kubernetes.registry;
        if !registry.password.is_empty() {
            secret::ensure_registry_secret(&self.k8s, &self.name, registry).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_prefixed_per_stage() {
        assert_eq!(namespace_name("hello", "prod"), "up-hello-prod");
        assert_eq!(namespace_name("api", "staging"), "up-api-staging");
    }
}
