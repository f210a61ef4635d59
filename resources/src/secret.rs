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

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::ObjectMeta;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};
use up_common::config::RegistryConfig;
use up_common::docker;

use super::error::{Error, Result};

/// Name of the registry-auth secret referenced by the builder pod and
/// the workload's pull secrets.
pub const DOCKER_REGISTRY_SECRET: &str = "docker-registry";

/// Create or refresh the registry-auth secret with freshly computed
/// payloads.
pub async fn ensure_registry_secret(
    client: &Client,
    namespace: &str,
    registry: &RegistryConfig,
) -> Result<Secret> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let resource = new(namespace, registry)?;
    debug!("The Secret resource:\n {:?}\n", resource.metadata);

    match api.get_opt(DOCKER_REGISTRY_SECRET).await.map_err(Error::KubeError)? {
        Some(_) => {
            let params = &PatchParams::apply("up").force();
            let secret = api
                .patch(DOCKER_REGISTRY_SECRET, params, &Patch::Apply(&resource))
                .await
                .map_err(Error::KubeError)?;

            info!("Updated Secret: {}", secret.name_any());
            Ok(secret)
        }
        None => {
            let secret =
                api.create(&PostParams::default(), &resource).await.map_err(Error::KubeError)?;

            info!("Created Secret: {}", secret.name_any());
            Ok(secret)
        }
    }
}

/// The secret carries both the legacy `.dockercfg` and the modern
/// `config.json` payloads.
fn new(namespace: &str, registry: &RegistryConfig) -> Result<Secret> {
    let dockercfg = docker::dockercfg(registry).map_err(Error::SerializationError)?;
    let config_json = docker::config_json(registry).map_err(Error::SerializationError)?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(DOCKER_REGISTRY_SECRET.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/dockercfg".to_string()),
        string_data: Some(BTreeMap::from([
            (".dockercfg".to_string(), dockercfg),
            ("config.json".to_string(), config_json),
        ])),
        ..Default::default()
    })
}
