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

pub mod archive;
pub mod context;
pub mod errors;

use std::path::Path;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, PostParams, WatchEvent, WatchParams};
use kube::{Api, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use up_resources::kaniko;
use up_resources::stack::Stack;
use uuid::Uuid;

use crate::archive::Stats;
use crate::errors::{Error, Result};

/// One attempt to turn the project source into a registry-hosted image.
pub struct Build {
    pub id: String,
    pub stage: String,
    pub stats: Stats,
    pub tarball_size: usize,

    stack: Stack,
}

impl Build {
    /// Ids are timestamp-ordered, so builds sort by creation.
    pub fn new(stage: impl Into<String>, stack: Stack) -> Self {
        Self {
            id: Uuid::now_v7().simple().to_string(),
            stage: stage.into(),
            stats: Stats::default(),
            tarball_size: 0,
            stack,
        }
    }

    /// Registry image reference for this build.
    pub fn image(&self) -> String {
        let registry = &self.stack.config().kubernetes.registry;
        format!("{}/{}:{}", registry.url, registry.image, self.id)
    }

    fn object_key(&self) -> String {
        format!("{}/build-{}.tar.gz", self.stack.namespace(), self.id)
    }

    /// Decorate the project directory, package it, record the stats.
    fn tarball(&mut self, dir: &Path) -> Result<Vec<u8>> {
        let _decoration = context::Decoration::apply(dir)?;

        let (tarball, stats) = archive::build(dir)?;
        self.stats = stats;
        self.tarball_size = tarball.len();

        Ok(tarball)
    }

    /// Ship the build context to the object store and return the
    /// bucket-prefixed object path the builder pod fetches.
    async fn upload(&self, tarball: Vec<u8>) -> Result<String> {
        let storage = self.stack.storage();
        let config = &self.stack.config().kubernetes.storage;

        if !storage.bucket_exists(&config.bucket).await.map_err(Error::StorageError)? {
            storage
                .create_bucket(&config.bucket, &config.location)
                .await
                .map_err(Error::StorageError)?;
        }

        let key = self.object_key();
        storage
            .put_object(&config.bucket, &key, tarball, "application/gzip")
            .await
            .map_err(Error::StorageError)?;

        Ok(format!("{}/{}", config.bucket, key))
    }

    /// Run the pipeline: package, upload, launch the builder pod, watch
    /// it to a terminal phase. The pod is deleted on terminal phases and
    /// preserved when the watch itself fails.
    pub async fn run(&mut self, dir: &Path, token: &CancellationToken) -> Result<()> {
        self.stack.events().log("packaging the build context");
        let tarball = self.tarball(dir)?;

        self.stack.events().log("uploading the build context");
        let object_path = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            uploaded = self.upload(tarball) => uploaded?,
        };

        let pod = kaniko::pod(
            self.stack.config(),
            self.stack.namespace(),
            &self.stage,
            &self.id,
            &object_path,
        );
        debug!("The Pod resource:\n {:?}\n", pod);

        let api: Api<Pod> = Api::namespaced(self.stack.k8s().clone(), self.stack.namespace());
        let post_params = PostParams::default();
        let created = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            created = api.create(&post_params, &pod) => created.map_err(Error::KubeError)?,
        };
        info!("Created build Pod: {}", created.name_any());

        self.stack.events().log("building the image in-cluster");
        self.watch(&api, token).await
    }

    /// Consume watch events until the pod reaches a terminal phase.
    async fn watch(&self, api: &Api<Pod>, token: &CancellationToken) -> Result<()> {
        let selector =
            up_resources::selector(&[("up-build-id", self.id.as_str()), ("up-process", "build")]);
        let params = WatchParams::default().labels(&selector);

        let mut stream = api.watch(&params, "0").await.map_err(Error::KubeError)?.boxed();

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                event = stream.try_next() => event.map_err(Error::KubeError)?,
            };

            // A closed stream preserves the pod for postmortem.
            let Some(event) = event else {
                return Err(Error::WatchClosed);
            };

            match event {
                WatchEvent::Added(pod) | WatchEvent::Modified(pod) => match phase(&pod) {
                    Some("Succeeded") => {
                        info!("Build Pod {} succeeded", pod.name_any());
                        self.delete(api, &pod.name_any()).await;
                        return Ok(());
                    }
                    Some("Failed") => {
                        self.delete(api, &pod.name_any()).await;
                        return Err(Error::BuildFailed);
                    }
                    _ => {}
                },
                WatchEvent::Error(err) => return Err(Error::WatchError(err)),
                _ => {}
            }
        }
    }

    async fn delete(&self, api: &Api<Pod>, name: &str) {
        if let Err(err) = api.delete(name, &DeleteParams::default()).await {
            error!("Failed to delete build Pod {}: {}", name, err);
        }
    }
}

fn phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|status| status.phase.as_deref())
}

#[cfg(test)]
mod tests {
    use up_common::config::{RegistryConfig, StorageConfig, UpConfig};
    use up_common::event::Events;
    use up_common::storage::Storage;
    use up_resources::stack::{namespace_name, Stack};

    use super::*;

    async fn stack() -> Option<Stack> {
        // Only run against a reachable cluster configuration.
        let k8s = kube::Client::try_default().await.ok()?;

        let mut config = UpConfig { name: "hello".into(), ..Default::default() };
        config.kubernetes.storage = StorageConfig {
            endpoint: "s3.example".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            bucket: "up-builds".into(),
            ..Default::default()
        };
        config.kubernetes.registry =
            RegistryConfig { url: "r.io".into(), image: "hello".into(), ..Default::default() };

        let storage = Storage::connect(&config.kubernetes.storage).await.ok()?;
        let (events, _receiver) = Events::channel();

        Some(Stack::new(namespace_name("hello", "prod"), config, events, k8s, storage))
    }

    #[tokio::test]
    async fn builds_compute_image_and_object_key() {
        let Some(stack) = stack().await else {
            return;
        };

        let build = Build::new("prod", stack);
        assert_eq!(build.image(), format!("r.io/hello:{}", build.id));
        assert_eq!(build.object_key(), format!("up-hello-prod/build-{}.tar.gz", build.id));
    }

    #[tokio::test]
    async fn build_ids_are_unique_and_sortable() {
        let Some(stack) = stack().await else {
            return;
        };

        let first = Build::new("prod", stack.clone());
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = Build::new("prod", stack);

        assert_ne!(first.id, second.id);
        assert!(first.id < second.id);
    }

    #[test]
    fn phase_reads_the_pod_status() {
        let mut pod = Pod::default();
        assert_eq!(phase(&pod), None);

        pod.status = Some(k8s_openapi::api::core::v1::PodStatus {
            phase: Some("Succeeded".into()),
            ..Default::default()
        });
        assert_eq!(phase(&pod), Some("Succeeded"));
    }
}
