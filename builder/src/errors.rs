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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Io Error: {0}")]
    IoError(#[source] std::io::Error),

    #[error("Walk Error: {0}")]
    WalkError(#[source] walkdir::Error),

    #[error("Ignore Error: {0}")]
    IgnoreError(#[source] ignore::Error),

    #[error("Storage Error: {0}")]
    StorageError(up_common::storage::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Watch Error: {0}")]
    WatchError(kube::core::ErrorResponse),

    #[error("watch closed before the build reached a terminal phase")]
    WatchClosed,

    #[error("build failed")]
    BuildFailed,

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
