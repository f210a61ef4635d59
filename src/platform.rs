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

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use up_resources::deployer::DeployInfo;

#[derive(Error, Debug)]
pub enum Error {
    #[error("load kubeconfig: {0}")]
    LoadKubeconfig(#[source] up_common::kubeconfig::Error),

    #[error("initialize storage: {0}")]
    InitializeStorage(up_common::storage::Error),

    #[error("create stack: {0}")]
    CreateStack(#[source] up_resources::error::Error),

    #[error("build run: {0}")]
    BuildRun(#[source] up_builder::errors::Error),

    #[error("deployment deploy: {0}")]
    DeploymentDeploy(#[source] up_resources::error::Error),

    #[error("fetching url: {0}")]
    FetchingUrl(#[source] up_resources::error::Error),

    #[error("platform is not initialized, run init first")]
    Uninitialized,

    #[error("no build available, run the build first")]
    MissingBuild,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A deployment target. The token is honoured at every suspension
/// point; cancellation returns promptly without cleaning up partial
/// cluster state.
#[async_trait]
pub trait Platform {
    /// Prepare clients and the project stack for a stage.
    async fn init(&mut self, stage: &str) -> Result<()>;

    /// Package the source and produce an image inside the cluster.
    async fn build(&mut self, token: &CancellationToken) -> Result<()>;

    /// Roll out the built image as a workload and service.
    async fn deploy(&mut self, info: DeployInfo, token: &CancellationToken) -> Result<()>;

    /// Address of the deployed service.
    async fn url(&self, region: &str, stage: &str) -> Result<String>;
}
