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

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;
use up::kubernetes::Kubernetes;
use up::platform::Platform;
use up_common::config::{Overrides, UpConfig};
use up_common::event::{Event, Events};
use up_resources::deployer::DeployInfo;

#[derive(Parser)]
#[command(name = "up", about = "Deploy your application to Kubernetes")]
struct Cli {
    /// Stage to operate on.
    #[arg(short, long, env = "UP_STAGE", default_value = "production")]
    stage: String,

    /// Path to the project configuration file.
    #[arg(short, long, default_value = "up.json")]
    config: PathBuf,

    /// Cluster credential document, overriding the configuration.
    #[arg(long)]
    kube_config: Option<String>,

    /// Context within the credential document.
    #[arg(long)]
    kube_context: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Package the source and build the image in-cluster.
    Build,

    /// Build, then roll out the workload and service.
    Deploy {
        /// Commit identifier recorded on the deployment.
        #[arg(long, default_value = "")]
        commit: String,
    },

    /// Print the deployed service address.
    Url,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // This returns an error if the `.env` file doesn't exist, but that's not what we want
    // since a project is not required to carry one.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = UpConfig::read(&cli.config)?;
    config.defaults();
    config.override_with(&Overrides {
        kube_config: cli.kube_config.clone(),
        kube_context: cli.kube_context.clone(),
        ..Default::default()
    });
    config.validate()?;

    let (events, mut receiver) = Events::channel();
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            render(event);
        }
    });

    // Ctrl-C cancels the pipeline at the next suspension point. Partial
    // cluster state is reclaimed by the next run's idempotent re-apply.
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    let mut platform = Kubernetes::new(config, events);
    platform.init(&cli.stage).await?;

    match cli.command {
        Command::Build => platform.build(&token).await?,
        Command::Deploy { commit } => {
            platform.build(&token).await?;
            platform.deploy(DeployInfo { commit, stage: cli.stage.clone() }, &token).await?;
        }
        Command::Url => println!("{}", platform.url("", &cli.stage).await?),
    }

    Ok(())
}

fn render(event: Event) {
    match event.name.as_str() {
        "log" => info!("{}", event.fields["message"].as_str().unwrap_or_default()),
        "platform.build.zip" => info!(
            "built {} files, {} bytes ({} compressed) in {}ms",
            event.fields["files"],
            event.fields["size_uncompressed"],
            event.fields["size_compressed"],
            event.fields["duration"],
        ),
        "platform.deploy.complete" => info!(
            "deployed version {} to {} in {}ms",
            event.fields["version"], event.fields["stage"], event.fields["duration"],
        ),
        "platform.deploy.url" => {
            info!("available at http://{}", event.fields["url"].as_str().unwrap_or_default())
        }
        _ => {}
    }
}
