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

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::error::Result;
use super::stack::Stack;
use super::{deployment, service};

/// What a deploy records about itself.
#[derive(Clone, Debug)]
pub struct DeployInfo {
    pub commit: String,
    pub stage: String,
}

/// Points the workload and service of a project stage at a completed
/// build. Idempotent: re-running with the same build converges to the
/// same pair.
pub struct Deployer {
    stack: Stack,
    build_id: String,
    image: String,
    info: DeployInfo,
}

impl Deployer {
    pub fn new(stack: Stack, build_id: impl Into<String>, image: impl Into<String>, info: DeployInfo) -> Self {
        Self { stack, build_id: build_id.into(), image: image.into(), info }
    }

    /// Apply the workload, wait for this revision to become available,
    /// then apply the stable service.
    pub async fn deploy(&self, token: &CancellationToken) -> Result<()> {
        let config = self.stack.config();
        let namespace = self.stack.namespace();
        let k8s = self.stack.k8s();

        info!("Deploying {} to {}", self.image, namespace);

        let resource =
            deployment::new(config, &self.info.stage, &self.build_id, &self.image, &self.info.commit);
        deployment::apply(k8s, namespace, resource).await?;

        deployment::wait_available(k8s, namespace, &self.build_id, token).await?;

        service::apply(k8s, namespace, config, &self.info.stage).await?;

        Ok(())
    }
}
