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

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, LocalObjectReference, PodSpec, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Patch, PatchParams, PostParams, WatchEvent, WatchParams};
use kube::core::ObjectMeta;
use kube::{Api, Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use up_common::config::UpConfig;

use super::error::{Error, Result};
use super::secret::DOCKER_REGISTRY_SECRET;
use super::labels;

/// Desired workload for a build: one replica of the built image behind
/// the stage's labels.
pub fn new(config: &UpConfig, stage: &str, build_id: &str, image: &str, commit: &str) -> Deployment {
    let name = config.name.clone();

    let pod_labels = labels(&config.name, stage, "deploy");
    let mut labels = pod_labels.clone();
    labels.insert("up-build-id".into(), build_id.into());

    let image_pull_secrets = if config.kubernetes.registry.password.is_empty() {
        None
    } else {
        Some(vec![LocalObjectReference { name: DOCKER_REGISTRY_SECRET.into() }])
    };

    let container = Container {
        name: name.clone(),
        image: Some(image.to_string()),
        env: Some(vec![
            env("UP_STAGE", stage),
            env("AWS_LAMBDA_FUNCTION_NAME", &config.name),
            env("AWS_LAMBDA_FUNCTION_VERSION", commit),
        ]),
        ports: Some(vec![ContainerPort { container_port: 8080, ..Default::default() }]),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta { name: Some(name), labels: Some(labels), ..Default::default() },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector { match_labels: Some(pod_labels.clone()), ..Default::default() },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(pod_labels), ..Default::default() }),
                spec: Some(PodSpec { containers: vec![container], image_pull_secrets, ..Default::default() }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create the workload if absent, update it otherwise.
pub async fn apply(client: &Client, namespace: &str, resource: Deployment) -> Result<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let name = resource.name_any();
    debug!("The Deployment resource:\n {:?}\n", resource);

    match api.get_opt(&name).await.map_err(Error::KubeError)? {
        Some(_) => {
            let params = &PatchParams::apply("up").force();
            let deployment =
                api.patch(&name, params, &Patch::Apply(&resource)).await.map_err(Error::KubeError)?;

            info!("Updated Deployment: {}", deployment.name_any());
            Ok(deployment)
        }
        None => {
            let deployment =
                api.create(&PostParams::default(), &resource).await.map_err(Error::KubeError)?;

            info!("Created Deployment: {}", deployment.name_any());
            Ok(deployment)
        }
    }
}

/// Consume watch events for this revision until the desired replicas
/// are available. No timeout is imposed; the token governs.
pub async fn wait_available(
    client: &Client,
    namespace: &str,
    build_id: &str,
    token: &CancellationToken,
) -> Result<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    let selector = super::selector(&[("up-build-id", build_id), ("up-process", "deploy")]);
    let params = WatchParams::default().labels(&selector);

    let mut stream = api.watch(&params, "0").await.map_err(Error::KubeError)?.boxed();

    loop {
        let event = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            event = stream.try_next() => event.map_err(Error::KubeError)?,
        };

        let Some(event) = event else {
            return Err(Error::WatchClosed);
        };

        match event {
            WatchEvent::Added(deployment) | WatchEvent::Modified(deployment) => {
                if available(&deployment) {
                    info!("Deployment {} is available", deployment.name_any());
                    return Ok(());
                }
            }
            WatchEvent::Error(err) => return Err(Error::WatchError(err)),
            _ => {}
        }
    }
}

fn available(deployment: &Deployment) -> bool {
    deployment
        .status
        .as_ref()
        .is_some_and(|status| status.replicas.is_some() && status.available_replicas == status.replicas)
}

#[inline]
fn env(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}
