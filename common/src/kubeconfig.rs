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

use std::path::PathBuf;

use directories::UserDirs;
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use thiserror::Error;

use crate::config::KubernetesConfig;

#[derive(Error, Debug)]
pub enum Error {
    #[error("load kubeconfig: {0}")]
    Load(#[source] KubeconfigError),

    #[error("configure client: {0}")]
    Configure(#[source] KubeconfigError),

    #[error("initialize client: {0}")]
    Client(#[source] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Expand a leading tilde against the invoking user's home directory.
pub fn expand(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(dirs) = UserDirs::new() {
            let rest = path.trim_start_matches('~').trim_start_matches('/');
            return dirs.home_dir().join(rest);
        }
    }

    PathBuf::from(path)
}

/// Parse the cluster credential document at `path`.
pub fn load(path: &str) -> Result<Kubeconfig> {
    Kubeconfig::read_from(expand(path)).map_err(Error::Load)
}

/// Build a cluster client for the configured credential document and
/// context.
pub async fn client(config: &KubernetesConfig) -> Result<kube::Client> {
    let kubeconfig = load(&config.kube_config)?;

    let options = KubeConfigOptions {
        context: Some(config.kube_context.clone()),
        ..Default::default()
    };
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(Error::Configure)?;

    kube::Client::try_from(config).map_err(Error::Client)
}
