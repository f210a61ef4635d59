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

use std::collections::BTreeMap;

pub mod deployer;
pub mod deployment;
pub mod error;
pub mod kaniko;
pub mod namespace;
pub mod secret;
pub mod service;
pub mod stack;

/// Equality labels shared by every resource of a project stage.
pub fn labels(project: &str, stage: &str, process: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("up-project".into(), project.into()),
        ("up-stage".into(), stage.into()),
        ("up-process".into(), process.into()),
    ])
}

/// Render equality predicates as a label selector for list/watch
/// queries.
pub fn selector(predicates: &[(&str, &str)]) -> String {
    predicates.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join(",")
}

/// Returns a list of arguments in two-dash style.
#[inline]
pub fn args(args: &[(&str, &str)]) -> Vec<String> {
    args.iter().map(|(key, value)| format!("--{}={}", key, value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_carry_the_process() {
        let labels = labels("hello", "prod", "build");
        assert_eq!(labels["up-project"], "hello");
        assert_eq!(labels["up-stage"], "prod");
        assert_eq!(labels["up-process"], "build");
    }

    #[test]
    fn selector_joins_equality_predicates() {
        let selector = selector(&[("up-build-id", "abc"), ("up-process", "build")]);
        assert_eq!(selector, "up-build-id=abc,up-process=build");
    }

    #[test]
    fn args_are_two_dash() {
        assert_eq!(args(&[("cache", "true")]), vec!["--cache=true"]);
    }
}
