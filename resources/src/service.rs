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

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::PostParams;
use kube::core::ObjectMeta;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};
use up_common::config::UpConfig;

use super::error::{Error, Result};
use super::labels;

/// The stable service fronting the deployed workload, mapping port 80
/// to the proxy's 8080.
pub fn new(config: &UpConfig, stage: &str) -> Service {
    let labels = labels(&config.name, stage, "deploy");

    Service {
        metadata: ObjectMeta {
            name: Some(config.name.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".into()),
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                name: Some("up-proxy".into()),
                port: 80,
                target_port: Some(IntOrString::Int(8080)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Carry the current cluster IP and resource version over to the
/// desired object, keeping the address stable across re-applies.
pub fn retain(resource: &mut Service, current: &Service) {
    if let Some(ip) = current.spec.as_ref().and_then(|spec| spec.cluster_ip.clone()) {
        if let Some(spec) = resource.spec.as_mut() {
            spec.cluster_ip = Some(ip);
        }
    }

    resource.metadata.resource_version = current.metadata.resource_version.clone();
}

/// Create the service if absent, replace it otherwise.
pub async fn apply(client: &Client, namespace: &str, config: &UpConfig, stage: &str) -> Result<Service> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let name = config.name.clone();

    let mut resource = new(config, stage);
    debug!("The Service resource:\n {:?}\n", resource);

    match api.get_opt(&name).await.map_err(Error::KubeError)? {
        Some(current) => {
            retain(&mut resource, &current);
            let service = api
                .replace(&name, &PostParams::default(), &resource)
                .await
                .map_err(Error::KubeError)?;

            info!("Updated Service: {}", service.name_any());
            Ok(service)
        }
        None => {
            let service =
                api.create(&PostParams::default(), &resource).await.map_err(Error::KubeError)?;

            info!("Created Service: {}", service.name_any());
            Ok(service)
        }
    }
}

/// Cluster IP of the project's service.
pub async fn cluster_ip(client: &Client, namespace: &str, name: &str) -> Result<String> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = api.get(name).await.map_err(Error::KubeError)?;

    service
        .spec
        .and_then(|spec| spec.cluster_ip)
        .ok_or(Error::MissingObjectKey(".spec.clusterIP"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UpConfig {
        UpConfig { name: "hello".into(), ..Default::default() }
    }

    #[test]
    fn service_maps_the_proxy_port() {
        let service = new(&config(), "prod");

        assert_eq!(service.metadata.name.as_deref(), Some("hello"));

        let spec = service.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(spec.selector.as_ref().unwrap()["up-process"], "deploy");

        let port = &spec.ports.unwrap()[0];
        assert_eq!(port.name.as_deref(), Some("up-proxy"));
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(8080)));
    }

    #[test]
    fn retain_preserves_the_cluster_ip() {
        let mut current = new(&config(), "prod");
        current.spec.as_mut().unwrap().cluster_ip = Some("10.0.0.7".into());
        current.metadata.resource_version = Some("42".into());

        let mut desired = new(&config(), "prod");
        retain(&mut desired, &current);

        assert_eq!(desired.spec.unwrap().cluster_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(desired.metadata.resource_version.as_deref(), Some("42"));
    }

    #[test]
    fn retain_leaves_a_fresh_service_unpinned() {
        let current = new(&config(), "prod");
        let mut desired = new(&config(), "prod");
        retain(&mut desired, &current);

        assert!(desired.spec.unwrap().cluster_ip.is_none());
        assert!(desired.metadata.resource_version.is_none());
    }
}
