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

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Error, Result};

pub const PROXY_FILE: &str = "up-proxy";
pub const DOCKERFILE: &str = "Dockerfile.up";

/// The request proxy shipped inside every produced image.
static UP_PROXY: &[u8] = include_bytes!("../assets/up-proxy");

const RUNTIME_DOCKERFILE: &str = "FROM gliderlabs/herokuish:latest

ADD . /app
WORKDIR /app

RUN herokuish buildpack build

CMD [\"/app/up-proxy\"]
";

/// Scoped decoration of the project directory: the proxy binary and the
/// runtime Dockerfile are written before packaging and removed when the
/// handle drops, on every exit path.
pub struct Decoration {
    dir: PathBuf,
}

impl Decoration {
    pub fn apply(dir: &Path) -> Result<Self> {
        let decoration = Self { dir: dir.to_path_buf() };

        let proxy = dir.join(PROXY_FILE);
        fs::write(&proxy, UP_PROXY).map_err(Error::IoError)?;
        executable(&proxy)?;

        fs::write(dir.join(DOCKERFILE), RUNTIME_DOCKERFILE).map_err(Error::IoError)?;

        debug!("decorated {}", dir.display());
        Ok(decoration)
    }
}

impl Drop for Decoration {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.dir.join(PROXY_FILE));
        let _ = fs::remove_file(self.dir.join(DOCKERFILE));
        debug!("restored {}", self.dir.display());
    }
}

#[cfg(unix)]
fn executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777)).map_err(Error::IoError)
}

#[cfg(not(unix))]
fn executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();

        let decoration = Decoration::apply(dir.path()).unwrap();

        assert!(dir.path().join(PROXY_FILE).exists());
        let dockerfile = fs::read_to_string(dir.path().join(DOCKERFILE)).unwrap();
        assert!(dockerfile.contains("FROM gliderlabs/herokuish:latest"));
        assert!(dockerfile.contains("CMD [\"/app/up-proxy\"]"));

        drop(decoration);
    }

    #[cfg(unix)]
    #[test]
    fn the_proxy_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let _decoration = Decoration::apply(dir.path()).unwrap();

        let mode = fs::metadata(dir.path().join(PROXY_FILE)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }

    #[test]
    fn drop_removes_the_decoration() {
        let dir = tempfile::tempdir().unwrap();

        {
            let _decoration = Decoration::apply(dir.path()).unwrap();
            assert!(dir.path().join(PROXY_FILE).exists());
        }

        assert!(!dir.path().join(PROXY_FILE).exists());
        assert!(!dir.path().join(DOCKERFILE).exists());
    }

    #[test]
    fn decoration_is_removed_even_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let result = std::panic::catch_unwind(move || {
            let _decoration = Decoration::apply(&path).unwrap();
            panic!("packaging exploded");
        });
        assert!(result.is_err());

        assert!(!dir.path().join(PROXY_FILE).exists());
        assert!(!dir.path().join(DOCKERFILE).exists());
    }
}
