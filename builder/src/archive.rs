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

use std::fs::{self, File, Metadata};
use std::path::Path;
use std::time::UNIX_EPOCH;

use flate2::write::GzEncoder;
use flate2::Compression;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{Error, Result};

const IGNORE_FILE: &str = ".upignore";

/// Per-entry statistics emitted by the packager.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub files_added: u64,
    pub files_filtered: u64,
    pub dirs_filtered: u64,
    pub size_uncompressed: u64,
}

/// Walk `dir` and produce a gzipped tar of every includable file,
/// deterministic for a given tree.
pub fn build(dir: &Path) -> Result<(Vec<u8>, Stats)> {
    let matcher = matcher(dir)?;
    let mut stats = Stats::default();

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);

    let mut walker = WalkDir::new(dir).follow_links(true).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(Error::WalkError)?;
        if entry.path() == dir {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let is_dir = entry.file_type().is_dir();

        if let Match::Ignore(_) = matcher.matched(rel, is_dir) {
            if is_dir {
                // Prune the whole subtree.
                stats.dirs_filtered += 1;
                walker.skip_current_dir();
            } else {
                stats.files_filtered += 1;
            }
            continue;
        }

        if is_dir {
            continue;
        }

        let metadata = entry.metadata().map_err(Error::WalkError)?;
        stats.files_added += 1;
        stats.size_uncompressed += metadata.len();

        append(&mut archive, entry.path(), &entry_name(rel), &metadata)?;
    }

    let encoder = archive.into_inner().map_err(Error::IoError)?;
    let tarball = encoder.finish().map_err(Error::IoError)?;

    debug!(
        "packaged {} files, filtered {} files and {} dirs",
        stats.files_added, stats.files_filtered, stats.dirs_filtered
    );

    Ok((tarball, stats))
}

/// Layered ignore rules, later patterns overriding earlier ones: deny
/// dotfiles, re-allow vendored dependency trees, the user's ignore
/// file, re-allow well-known entrypoints and manifests, deny the
/// tool's own artifacts.
fn matcher(dir: &Path) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(dir);

    line(&mut builder, ".*")?;

    line(&mut builder, "!node_modules/")?;
    line(&mut builder, "!node_modules/**")?;
    line(&mut builder, "!.pypath/")?;
    line(&mut builder, "!.pypath/**")?;

    for pattern in ignore_file(dir)?.lines() {
        if !pattern.trim().is_empty() {
            line(&mut builder, pattern)?;
        }
    }

    for allow in ["main", "server", "_proxy.js", "byline.js", "up.json", "pom.xml", "build.gradle", "project.clj"] {
        line(&mut builder, &format!("!{allow}"))?;
    }

    line(&mut builder, "up")?;
    line(&mut builder, "gin-bin")?;

    builder.build().map_err(Error::IgnoreError)
}

/// A missing ignore file is equivalent to an empty one.
fn ignore_file(dir: &Path) -> Result<String> {
    match fs::read_to_string(dir.join(IGNORE_FILE)) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(Error::IoError(err)),
    }
}

fn line<'a>(builder: &'a mut GitignoreBuilder, pattern: &str) -> Result<&'a mut GitignoreBuilder> {
    builder.add_line(None, pattern).map_err(Error::IgnoreError)
}

/// Entry paths always use forward slashes, regardless of platform.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy().replace('\\', "/"))
        .collect::<Vec<_>>()
        .join("/")
}

fn append(
    archive: &mut tar::Builder<GzEncoder<Vec<u8>>>,
    path: &Path,
    name: &str,
    metadata: &Metadata,
) -> Result<()> {
    let mut file = File::open(path).map_err(Error::IoError)?;

    let mut header = tar::Header::new_gnu();
    header.set_size(metadata.len());
    header.set_mode(mode(metadata) | 0o555);
    header.set_mtime(mtime(metadata));

    archive.append_data(&mut header, name, &mut file).map_err(Error::IoError)
}

#[cfg(unix)]
fn mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode(_metadata: &Metadata) -> u32 {
    0o644
}

fn mtime(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_secs())
        .unwrap_or(0)
}
