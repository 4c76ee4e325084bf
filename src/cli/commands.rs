// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::talos::{
    ApplyCommand, BootstrapCommand, GenCommand, HealthCommand, ReadCommand, ResetCommand,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "talos-forge",
    version,
    about = "Declarative Talos node provisioning",
    long_about = "Synthesizes Talos machine configuration from a TOML declaration and drives node lifecycle over the machine API"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Generate secrets, machine configs, talosconfig and kubeconfig
    Gen(GenCommand),

    /// Apply machine configs to nodes (first apply installs, later applies update)
    Apply(ApplyCommand),

    /// Bootstrap etcd on the control-plane node
    Bootstrap(BootstrapCommand),

    /// Read live machine config and report drift from the declaration
    Read(ReadCommand),

    /// Reset nodes back to maintenance mode
    Reset(ResetCommand),

    /// Wait for Kubernetes nodes to become ready
    Health(HealthCommand),
}

impl Commands {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Gen(cmd) => cmd.execute().await,
            Commands::Apply(cmd) => cmd.execute().await,
            Commands::Bootstrap(cmd) => cmd.execute().await,
            Commands::Read(cmd) => cmd.execute().await,
            Commands::Reset(cmd) => cmd.execute().await,
            Commands::Health(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let args = CliArgs::try_parse_from([
            "talos-forge",
            "apply",
            "-f",
            "demo.toml",
            "-n",
            "cp-1",
            "-Dlifecycle.ready-deadline=60",
        ])
        .unwrap();
        match args.command {
            Commands::Apply(cmd) => {
                assert_eq!(cmd.args.config_file, "demo.toml");
                assert_eq!(cmd.nodes, vec!["cp-1".to_string()]);
                assert_eq!(cmd.args.properties, vec!["lifecycle.ready-deadline=60".to_string()]);
                assert!(!cmd.no_bootstrap);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_reset_requires_target() {
        assert!(CliArgs::try_parse_from(["talos-forge", "reset"]).is_err());
        assert!(CliArgs::try_parse_from(["talos-forge", "reset", "--all"]).is_ok());
    }
}
