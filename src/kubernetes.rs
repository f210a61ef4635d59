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

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;
use up_builder::Build;
use up_common::config::UpConfig;
use up_common::event::Events;
use up_common::kubeconfig;
use up_common::storage::Storage;
use up_resources::deployer::{DeployInfo, Deployer};
use up_resources::service;
use up_resources::stack::{namespace_name, Stack};

use crate::platform::{Error, Platform, Result};

/// The Kubernetes deployment target: builds happen in-cluster via
/// kaniko, workloads roll out behind a stable ClusterIP service.
pub struct Kubernetes {
    config: UpConfig,
    events: Events,
    stage: String,

    stack: Option<Stack>,
    build: Option<Build>,
}

impl Kubernetes {
    pub fn new(config: UpConfig, events: Events) -> Self {
        Self { config, events, stage: String::new(), stack: None, build: None }
    }

    fn stack(&self) -> Result<&Stack> {
        self.stack.as_ref().ok_or(Error::Uninitialized)
    }
}

#[async_trait]
impl Platform for Kubernetes {
    async fn init(&mut self, stage: &str) -> Result<()> {
        self.stage = stage.to_string();

        let k8s = kubeconfig::client(&self.config.kubernetes).await.map_err(Error::LoadKubeconfig)?;
        let storage = Storage::connect(&self.config.kubernetes.storage)
            .await
            .map_err(Error::InitializeStorage)?;

        let name = namespace_name(&self.config.name, stage);
        info!("Using namespace {}", name);

        self.stack =
            Some(Stack::new(name, self.config.clone(), self.events.clone(), k8s, storage));

        Ok(())
    }

    async fn build(&mut self, token: &CancellationToken) -> Result<()> {
        let start = Instant::now();

        let stack = self.stack()?.clone();
        stack.create().await.map_err(Error::CreateStack)?;

        let mut build = Build::new(&self.stage, stack);
        build.run(Path::new("."), token).await.map_err(Error::BuildRun)?;

        self.events.emit(
            "platform.build.zip",
            json!({
                "files": build.stats.files_added,
                "size_uncompressed": build.stats.size_uncompressed,
                "size_compressed": build.tarball_size,
                "duration": start.elapsed().as_millis() as u64,
            }),
        );

        self.build = Some(build);
        Ok(())
    }

    async fn deploy(&mut self, info: DeployInfo, token: &CancellationToken) -> Result<()> {
        let start = Instant::now();

        let stack = self.stack()?.clone();
        let build = self.build.as_ref().ok_or(Error::MissingBuild)?;

        let deployer = Deployer::new(stack, &build.id, build.image(), info.clone());
        deployer.deploy(token).await.map_err(Error::DeploymentDeploy)?;

        self.events.emit(
            "platform.deploy.complete",
            json!({
                "commit": info.commit,
                "stage": info.stage,
                "version": build.id,
                "duration": start.elapsed().as_millis() as u64,
            }),
        );

        let url = self.url("", &info.stage).await?;
        self.events.emit("platform.deploy.url", json!({ "url": url }));

        Ok(())
    }

    async fn url(&self, _region: &str, _stage: &str) -> Result<String> {
        let stack = self.stack()?;

        service::cluster_ip(stack.k8s(), stack.namespace(), &stack.config().name)
            .await
            .map_err(Error::FetchingUrl)
    }
}
