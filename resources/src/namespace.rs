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

use k8s_openapi::api::core::v1::Namespace;
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use super::error::{Error, Result};

/// Create the namespace if absent. An existing namespace is reused.
pub async fn create(client: &Client, name: &str) -> Result<()> {
    let api: Api<Namespace> = Api::all(client.clone());

    let resource = Namespace {
        metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
        ..Default::default()
    };
    debug!("The Namespace resource:\n {:?}\n", resource);

    match api.create(&PostParams::default(), &resource).await {
        Ok(namespace) => {
            info!("Created namespace: {}", namespace.name_any());
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 409 => {
            debug!("The namespace {} already exists", name);
            Ok(())
        }
        Err(err) => Err(Error::KubeError(err)),
    }
}
