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

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, Pod, PodSpec, SecretVolumeSource, Volume, VolumeMount,
};
use kube::core::ObjectMeta;
use up_common::config::UpConfig;

use super::secret::DOCKER_REGISTRY_SECRET;
use super::{args, labels};

const DEFAULT_KANIKO_IMAGE: &str = "gcr.io/kaniko-project/executor:latest";
const DEFAULT_MC_IMAGE: &str = "minio/mc";

pub fn pod_name(project: &str, build_id: &str) -> String {
    format!("kaniko-{}-{}", project, build_id)
}

/// The in-cluster builder pod: an init container fetches and unpacks the
/// build context from the object store, then kaniko builds and pushes
/// the image.
pub fn pod(
    config: &UpConfig,
    namespace: &str,
    stage: &str,
    build_id: &str,
    object_path: &str,
) -> Pod {
    let mut labels = labels(&config.name, stage, "build");
    labels.insert("up-build-id".into(), build_id.into());

    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name(&config.name, build_id)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".into()),
            init_containers: Some(vec![download_context(config, object_path)]),
            containers: vec![container(config, build_id)],
            volumes: Some(vec![docker_config_volume(), context_volume()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Init container: configure `mc` against the stack's storage endpoint,
/// copy the tarball to the shared volume, extract it.
fn download_context(config: &UpConfig, object_path: &str) -> Container {
    let storage = &config.kubernetes.storage;

    let configure = format!(
        "mc config host add minio {}://{} {} {}",
        storage.scheme(),
        storage.host(),
        storage.access_key,
        storage.secret_key,
    );
    let download = format!("mc cp minio/{} /build/context.tar.gz", object_path);
    let extract = "mkdir /build/context && cd /build/context && tar xf ../context.tar.gz";

    Container {
        name: "download-context".into(),
        image: Some(DEFAULT_MC_IMAGE.into()),
        command: Some(vec!["/bin/sh".into()]),
        args: Some(vec!["-c".into(), format!("{} && {} && {}", configure, download, extract)]),
        volume_mounts: Some(vec![context_mount()]),
        ..Default::default()
    }
}

fn container(config: &UpConfig, build_id: &str) -> Container {
    let registry = &config.kubernetes.registry;
    let destination = format!("{}/{}:{}", registry.url, registry.image, build_id);

    let arguments = args(&[
        ("cache", "true"),
        ("dockerfile", "Dockerfile.up"),
        ("context", "dir:///build/context"),
        ("destination", &destination),
    ]);

    Container {
        name: "kaniko".into(),
        image: Some(DEFAULT_KANIKO_IMAGE.into()),
        args: Some(arguments),
        env: Some(vec![EnvVar {
            name: "AWS_SDK_LOAD_CONFIG".into(),
            value: Some("1".into()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![docker_config_mount(), context_mount()]),
        ..Default::default()
    }
}

#[inline]
fn docker_config_mount() -> VolumeMount {
    VolumeMount {
        name: "docker-config".into(),
        mount_path: "/kaniko/.docker/".into(),
        read_only: Some(true),
        ..Default::default()
    }
}

#[inline]
fn context_mount() -> VolumeMount {
    VolumeMount { name: "context".into(), mount_path: "/build/".into(), ..Default::default() }
}

#[inline]
fn docker_config_volume() -> Volume {
    Volume {
        name: "docker-config".into(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(DOCKER_REGISTRY_SECRET.into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[inline]
fn context_volume() -> Volume {
    Volume {
        name: "context".into(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use up_common::config::{RegistryConfig, StorageConfig};

    use super::*;

    fn config() -> UpConfig {
        let mut config = UpConfig { name: "hello".into(), ..Default::default() };
        config.kubernetes.storage = StorageConfig {
            endpoint: "s3.example".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            secure: true,
            bucket: "up-builds".into(),
            location: "us-east-1".into(),
        };
        config.kubernetes.registry =
            RegistryConfig { url: "r.io".into(), image: "hello".into(), ..Default::default() };
        config
    }

    #[test]
    fn pod_is_labelled_for_the_build_watch() {
        let pod = pod(&config(), "up-hello-prod", "prod", "abc123", "up-builds/up-hello-prod/build-abc123.tar.gz");

        assert_eq!(pod.metadata.name.as_deref(), Some("kaniko-hello-abc123"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("up-hello-prod"));

        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels["up-project"], "hello");
        assert_eq!(labels["up-stage"], "prod");
        assert_eq!(labels["up-build-id"], "abc123");
        assert_eq!(labels["up-process"], "build");

        assert_eq!(pod.spec.as_ref().unwrap().restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn init_container_fetches_the_context() {
        let pod = pod(&config(), "up-hello-prod", "prod", "abc123", "up-builds/up-hello-prod/build-abc123.tar.gz");
        let spec = pod.spec.unwrap();

        let init = &spec.init_containers.unwrap()[0];
        assert_eq!(init.name, "download-context");
        assert_eq!(init.image.as_deref(), Some("minio/mc"));

        let script = &init.args.as_ref().unwrap()[1];
        assert!(script.contains("mc config host add minio https://s3.example key secret"));
        assert!(script.contains("mc cp minio/up-builds/up-hello-prod/build-abc123.tar.gz"));
        assert!(script.contains("tar xf ../context.tar.gz"));
    }

    #[test]
    fn kaniko_pushes_to_the_computed_destination() {
        let pod = pod(&config(), "up-hello-prod", "prod", "abc123", "up-builds/up-hello-prod/build-abc123.tar.gz");
        let spec = pod.spec.unwrap();

        let kaniko = &spec.containers[0];
        assert_eq!(kaniko.image.as_deref(), Some("gcr.io/kaniko-project/executor:latest"));

        let arguments = kaniko.args.as_ref().unwrap();
        assert!(arguments.contains(&"--cache=true".to_string()));
        assert!(arguments.contains(&"--dockerfile=Dockerfile.up".to_string()));
        assert!(arguments.contains(&"--context=dir:///build/context".to_string()));
        assert!(arguments.contains(&"--destination=r.io/hello:abc123".to_string()));
    }

    #[test]
    fn registry_secret_is_mounted_read_only() {
        let pod = pod(&config(), "up-hello-prod", "prod", "abc123", "up-builds/up-hello-prod/build-abc123.tar.gz");
        let spec = pod.spec.unwrap();

        let mounts = spec.containers[0].volume_mounts.as_ref().unwrap();
        let docker = mounts.iter().find(|mount| mount.name == "docker-config").unwrap();
        assert_eq!(docker.mount_path, "/kaniko/.docker/");
        assert_eq!(docker.read_only, Some(true));

        let volumes = spec.volumes.unwrap();
        let secret = volumes.iter().find(|volume| volume.name == "docker-config").unwrap();
        assert_eq!(
            secret.secret.as_ref().unwrap().secret_name.as_deref(),
            Some(DOCKER_REGISTRY_SECRET)
        );
        assert!(volumes.iter().any(|volume| volume.empty_dir.is_some()));
    }
}
