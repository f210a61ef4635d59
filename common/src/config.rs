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

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::kubeconfig;

#[derive(Error, Debug)]
pub enum Error {
    #[error("reading config: {0}")]
    Io(#[source] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}: is required")]
    Required(&'static str),

    #[error(".name: must contain only lowercase letters, digits, and dashes")]
    InvalidName,

    #[error(".kubernetes.kube_config: {0}")]
    KubeConfig(#[source] kubeconfig::Error),

    #[error(".kubernetes.kube_context not found")]
    ContextNotFound,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The project configuration, read from `up.json` in the project root.
/// Unknown fields are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub platform: String,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default)]
    pub kube_config: String,

    #[serde(default)]
    pub kube_context: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

/// The S3-compatible object store receiving build contexts.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub location: String,
}

impl StorageConfig {
    /// Endpoint host without the `http://` / `https://` prefix the
    /// config file may carry.
    pub fn host(&self) -> &str {
        self.endpoint.trim_start_matches("http://").trim_start_matches("https://")
    }

    #[inline]
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }
}

/// The container registry receiving built images.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

/// Runtime overrides applied after defaults and before validation. Each
/// field replaces only its namesake.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub kube_config: Option<String>,
    pub kube_context: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_access_key: Option<String>,
    pub storage_secret_key: Option<String>,
    pub storage_secure: Option<bool>,
    pub storage_bucket: Option<String>,
    pub storage_location: Option<String>,
    pub registry_url: Option<String>,
    pub registry_image: Option<String>,
    pub registry_username: Option<String>,
    pub registry_email: Option<String>,
    pub registry_password: Option<String>,
}

impl UpConfig {
    /// Read, default, and validate the configuration in one step.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.defaults();
        config.validate()?;
        Ok(config)
    }

    /// Parse the configuration file without defaulting or validating.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(Error::Io)?;
        serde_json::from_str(&data).map_err(Error::Parse)
    }

    /// Apply environment overrides, then fall back to `~/.kube/config`
    /// for the credential document.
    pub fn defaults(&mut self) {
        let kubernetes = &mut self.kubernetes;

        apply_env(&mut kubernetes.kube_config, "KUBE_CONFIG");
        if kubernetes.kube_config.is_empty() {
            kubernetes.kube_config = "~/.kube/config".to_string();
        }

        apply_env(&mut kubernetes.registry.url, "DOCKER_REGISTRY_URL");
        apply_env(&mut kubernetes.registry.image, "DOCKER_REGISTRY_IMAGE");
        apply_env(&mut kubernetes.registry.username, "DOCKER_REGISTRY_USERNAME");
        apply_env(&mut kubernetes.registry.email, "DOCKER_REGISTRY_EMAIL");
        apply_env(&mut kubernetes.registry.password, "DOCKER_REGISTRY_PASSWORD");
    }

    /// Apply runtime overrides, each field to its namesake.
    pub fn override_with(&mut self, overrides: &Overrides) {
        let kubernetes = &mut self.kubernetes;

        apply(&mut kubernetes.kube_config, &overrides.kube_config);
        apply(&mut kubernetes.kube_context, &overrides.kube_context);

        apply(&mut kubernetes.storage.endpoint, &overrides.storage_endpoint);
        apply(&mut kubernetes.storage.access_key, &overrides.storage_access_key);
        apply(&mut kubernetes.storage.secret_key, &overrides.storage_secret_key);
        apply(&mut kubernetes.storage.bucket, &overrides.storage_bucket);
        apply(&mut kubernetes.storage.location, &overrides.storage_location);
        if let Some(secure) = overrides.storage_secure {
            kubernetes.storage.secure = secure;
        }

        apply(&mut kubernetes.registry.url, &overrides.registry_url);
        apply(&mut kubernetes.registry.image, &overrides.registry_image);
        apply(&mut kubernetes.registry.username, &overrides.registry_username);
        apply(&mut kubernetes.registry.email, &overrides.registry_email);
        apply(&mut kubernetes.registry.password, &overrides.registry_password);
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Required(".name"));
        }

        if !self.name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(Error::InvalidName);
        }

        let kubernetes = &self.kubernetes;
        required(&kubernetes.kube_config, ".kubernetes.kube_config")?;
        required(&kubernetes.kube_context, ".kubernetes.kube_context")?;

        let config = kubeconfig::load(&kubernetes.kube_config).map_err(Error::KubeConfig)?;
        if !config.contexts.iter().any(|context| context.name == kubernetes.kube_context) {
            return Err(Error::ContextNotFound);
        }

        required(&kubernetes.storage.endpoint, ".kubernetes.storage.endpoint")?;
        required(&kubernetes.storage.access_key, ".kubernetes.storage.access_key")?;
        required(&kubernetes.storage.secret_key, ".kubernetes.storage.secret_key")?;
        required(&kubernetes.storage.bucket, ".kubernetes.storage.bucket")?;

        required(&kubernetes.registry.url, ".kubernetes.registry.url")?;
        required(&kubernetes.registry.image, ".kubernetes.registry.image")?;

        Ok(())
    }
}

fn required(value: &str, path: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Required(path));
    }
    Ok(())
}

fn apply(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

fn apply_env(field: &mut String, name: &str) {
    if let Ok(value) = env::var(name) {
        if !value.is_empty() {
            *field = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const KUBECONFIG: &str = "\
apiVersion: v1
kind: Config
clusters: []
users: []
contexts:
  - name: ctx1
    context:
      cluster: cluster1
      user: user1
current-context: ctx1
";

    fn kubeconfig_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();
        file
    }

    fn valid(kube_config: &str) -> UpConfig {
        let mut config = UpConfig {
            name: "hello".into(),
            platform: "kubernetes".into(),
            ..Default::default()
        };
        config.kubernetes.kube_config = kube_config.into();
        config.kubernetes.kube_context = "ctx1".into();
        config.kubernetes.storage = StorageConfig {
            endpoint: "s3.example".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            secure: true,
            bucket: "up-builds".into(),
            location: "us-east-1".into(),
        };
        config.kubernetes.registry = RegistryConfig {
            url: "r.io".into(),
            image: "hello".into(),
            ..Default::default()
        };
        config
    }

    #[test]
    fn load_reads_defaults_and_validates() {
        let kubeconfig = kubeconfig_file();
        let config = valid(kubeconfig.path().to_str().unwrap());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = format!(
            r#"{{"name":"hello","platform":"kubernetes","kubernetes":{{
                "kube_config":"{}","kube_context":"ctx1",
                "storage":{{"endpoint":"s3.example","access_key":"key","secret_key":"secret",
                            "secure":true,"bucket":"up-builds","location":"us-east-1"}},
                "registry":{{"url":"r.io","image":"hello"}}}}}}"#,
            config.kubernetes.kube_config,
        );
        file.write_all(json.as_bytes()).unwrap();

        let loaded = UpConfig::load(file.path()).unwrap();
        assert_eq!(loaded.name, "hello");
        assert_eq!(loaded.kubernetes.registry.image, "hello");
        assert!(loaded.kubernetes.storage.secure);
    }

    #[test]
    fn read_ignores_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"name":"hello","lambda":{"memory":512}}"#).unwrap();

        let config = UpConfig::read(file.path()).unwrap();
        assert_eq!(config.name, "hello");
        assert!(config.kubernetes.kube_config.is_empty());
    }

    #[test]
    fn defaults_fall_back_to_home_kubeconfig() {
        let mut config = UpConfig::default();
        config.defaults();
        assert_eq!(config.kubernetes.kube_config, "~/.kube/config");
    }

    #[test]
    fn defaults_apply_registry_environment() {
        env::set_var("DOCKER_REGISTRY_EMAIL", "env@example.com");
        env::set_var("DOCKER_REGISTRY_PASSWORD", "");

        let mut config = UpConfig::default();
        config.kubernetes.registry.password = "kept".into();
        config.defaults();

        assert_eq!(config.kubernetes.registry.email, "env@example.com");
        // Empty variables never replace configured values.
        assert_eq!(config.kubernetes.registry.password, "kept");

        env::remove_var("DOCKER_REGISTRY_EMAIL");
        env::remove_var("DOCKER_REGISTRY_PASSWORD");
    }

    #[test]
    fn overrides_assign_namesakes_only() {
        let mut config = UpConfig::default();
        config.kubernetes.storage.bucket = "configured".into();

        config.override_with(&Overrides {
            storage_secure: Some(true),
            ..Default::default()
        });

        assert!(config.kubernetes.storage.secure);
        assert_eq!(config.kubernetes.storage.bucket, "configured");
    }

    #[test]
    fn validate_accepts_a_complete_config() {
        let file = kubeconfig_file();
        let config = valid(file.path().to_str().unwrap());
        config.validate().unwrap();
    }

    #[test]
    fn validate_reports_dotted_paths() {
        let file = kubeconfig_file();
        let mut config = valid(file.path().to_str().unwrap());
        config.kubernetes.storage.bucket.clear();

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), ".kubernetes.storage.bucket: is required");
    }

    #[test]
    fn validate_rejects_an_unknown_context() {
        let file = kubeconfig_file();
        let mut config = valid(file.path().to_str().unwrap());
        config.kubernetes.kube_context = "nope".into();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::ContextNotFound));
    }

    #[test]
    fn validate_rejects_an_invalid_name() {
        let file = kubeconfig_file();
        let mut config = valid(file.path().to_str().unwrap());
        config.name = "Hello World".into();

        assert!(matches!(config.validate().unwrap_err(), Error::InvalidName));
    }

    #[test]
    fn storage_host_strips_the_scheme() {
        let storage = StorageConfig {
            endpoint: "https://s3.example:9000".into(),
            ..Default::default()
        };
        assert_eq!(storage.host(), "s3.example:9000");
        assert_eq!(storage.scheme(), "http");
    }
}
