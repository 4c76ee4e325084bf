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

use super::display::TableRenderer;
use super::state::StateStore;
use crate::domain::config::{
    apply_dynamic_overrides, generate_base, parse_dynamic_configs, MachineConfig, NodeDeclaration,
    NodeSpec,
};
use crate::domain::node::{NodeLifecycleManager, NodeLifecycleRecord, ReadMode, Reconciler};
use crate::domain::secrets::{kubeconfig, talosconfig, SecretsBundle, SystemClock};
use crate::domain::synthesis::Synthesizer;
use crate::infrastructure::constants::{
    DEFAULT_HEALTH_DEADLINE_SECS, DEFAULT_KUBECONFIG_FILE, DEFAULT_STATE_DIR,
    DEFAULT_TALOSCONFIG_FILE, HEALTH_POLL_INTERVAL_SECS,
};
use crate::infrastructure::kubernetes::{wait_for_ready_nodes, KubeNodeClientImpl};
use crate::infrastructure::talos::NodeConnectorImpl;
use clap::Parser;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options shared by every command.
#[derive(Parser, Debug, Clone)]
pub struct DeclarationArgs {
    /// Path to the cluster declaration (TOML)
    #[arg(long, short = 'f', value_name = "PATH", default_value = "cluster.toml")]
    pub config_file: String,

    /// Directory holding secrets, generated configs and node records
    #[arg(long, value_name = "DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: String,

    /// Dynamic configuration properties to override the declaration (-D key=value)
    ///
    /// Cluster: cluster.name, cluster.endpoint, cluster.talos-version
    /// Lifecycle (seconds): lifecycle.dial-timeout, lifecycle.retry-interval,
    ///   lifecycle.ready-deadline, lifecycle.rpc-timeout, lifecycle.reset-grace
    /// Test VMs: lifecycle.hypervisor-socket
    /// Install: install.image (every node)
    /// Per node: nodes.<name>.provisioning-address, nodes.<name>.runtime-address,
    ///   nodes.<name>.apply-mode, nodes.<name>.bootstrap,
    ///   nodes.<name>.install.disk, nodes.<name>.install.image
    ///
    /// Example: -Dnodes.cp-1.apply-mode=reboot -Dlifecycle.ready-deadline=300
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

impl DeclarationArgs {
    fn load(&self) -> anyhow::Result<NodeDeclaration> {
        let mut decl = NodeDeclaration::from(&self.config_file)?;
        if !self.properties.is_empty() {
            let configs = parse_dynamic_configs(&self.properties)?;
            apply_dynamic_overrides(&configs, &mut decl)?;
        }
        decl.validate()?;
        Ok(decl)
    }

    fn store(&self) -> StateStore {
        StateStore::new(&self.state_dir)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct GenCommand {
    #[command(flatten)]
    pub args: DeclarationArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyCommand {
    #[command(flatten)]
    pub args: DeclarationArgs,

    /// Only these nodes (default: all declared nodes)
    #[arg(long = "node", short = 'n')]
    pub nodes: Vec<String>,

    /// Do not bootstrap even if a node declares bootstrap = true
    #[arg(long)]
    pub no_bootstrap: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct BootstrapCommand {
    #[command(flatten)]
    pub args: DeclarationArgs,

    /// Node to bootstrap (default: the node declaring bootstrap = true)
    #[arg(long, short = 'n')]
    pub node: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ReadCommand {
    #[command(flatten)]
    pub args: DeclarationArgs,

    #[arg(long = "node", short = 'n')]
    pub nodes: Vec<String>,

    /// Do not contact nodes; report declared state only
    #[arg(long)]
    pub skip_live: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ResetCommand {
    #[command(flatten)]
    pub args: DeclarationArgs,

    /// Nodes to reset
    #[arg(long = "node", short = 'n', required_unless_present = "all")]
    pub nodes: Vec<String>,

    /// Reset every declared node
    #[arg(long)]
    pub all: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthCommand {
    #[command(flatten)]
    pub args: DeclarationArgs,

    /// Expected ready nodes (default: number of declared nodes)
    #[arg(long)]
    pub expected: Option<usize>,

    /// Seconds to wait for the nodes to become ready
    #[arg(long, default_value_t = DEFAULT_HEALTH_DEADLINE_SECS)]
    pub timeout: u64,

    /// Kubernetes context to use from the generated kubeconfig
    #[arg(long)]
    pub context: Option<String>,
}

/// Cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling in-flight operations");
            child.cancel();
        }
    });
    token
}

fn synthesize_node(
    decl: &NodeDeclaration,
    bundle: &SecretsBundle,
    node: &NodeSpec,
) -> anyhow::Result<MachineConfig> {
    let base = generate_base(bundle, node.machine_type, &decl.cluster.endpoint)?;
    let synthesizer = Synthesizer::new(decl.contract()?);
    synthesizer
        .synthesize(&base, &decl.effective_facets(node))
        .map_err(|e| anyhow::anyhow!("Node '{}': {}", node.name, e))
}

fn write_client_configs(
    store: &StateStore,
    decl: &NodeDeclaration,
    bundle: &SecretsBundle,
) -> anyhow::Result<()> {
    let endpoints: Vec<String> = decl
        .nodes
        .iter()
        .filter(|n| n.machine_type.is_control_plane())
        .map(|n| n.runtime_address().to_string())
        .collect();
    let nodes: Vec<String> = decl
        .nodes
        .iter()
        .map(|n| n.runtime_address().to_string())
        .collect();

    if endpoints.is_empty() {
        println!("ℹ️  No control-plane nodes declared, skipping talosconfig");
    } else {
        let config = talosconfig(bundle, &decl.cluster.name, &endpoints, &nodes)?;
        let path = store.write(DEFAULT_TALOSCONFIG_FILE, &config.to_yaml()?)?;
        println!("✓ Wrote {}", path.display());
    }

    let kube = kubeconfig(bundle, &decl.cluster.name, &decl.cluster.endpoint, &SystemClock)?;
    let path = store.write(DEFAULT_KUBECONFIG_FILE, &kube)?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}

fn connector_for(decl: &NodeDeclaration) -> Arc<NodeConnectorImpl> {
    let options = decl.lifecycle.options();
    Arc::new(NodeConnectorImpl::new(
        options.dial_options(),
        options.rpc_timeout,
    ))
}

impl GenCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decl = self.args.load()?;
        let store = self.args.store();
        let bundle = store.load_or_generate_secrets(&decl.cluster.name, decl.contract()?)?;

        for node in &decl.nodes {
            let doc = synthesize_node(&decl, &bundle, node)?;
            let path = store.write(
                Path::new("configs").join(format!("{}.yaml", node.name)),
                &doc.to_yaml()?,
            )?;
            println!("✓ Wrote {} ({})", path.display(), node.machine_type.as_str());
        }
        write_client_configs(&store, &decl, &bundle)?;
        Ok(())
    }
}

impl ApplyCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decl = self.args.load()?;
        let store = self.args.store();
        let bundle = store.load_or_generate_secrets(&decl.cluster.name, decl.contract()?)?;
        let manager = NodeLifecycleManager::new(connector_for(&decl), decl.lifecycle.options());
        let cancel = interrupt_token();

        let mut jobs = Vec::new();
        for node in decl.select(&self.nodes)? {
            let doc = synthesize_node(&decl, &bundle, node)?;
            let record = store.load_record(node, bundle.clone())?;
            let bootstrap = node.bootstrap && !self.no_bootstrap;
            jobs.push(apply_one(&manager, record, doc, node, bootstrap, &cancel));
        }

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (record, result) in join_all(jobs).await {
            match result {
                Ok(()) => store.save_record(&record)?,
                Err(e) => failures.push(format!("{}: {}", record.node_name, e)),
            }
            records.push(record);
        }

        println!("{}", TableRenderer::new().render_nodes(&decl.cluster.name, &records));
        if !failures.is_empty() {
            anyhow::bail!("Apply failed on {} node(s):\n  {}", failures.len(), failures.join("\n  "));
        }
        write_client_configs(&store, &decl, &bundle)?;
        Ok(())
    }
}

async fn apply_one(
    manager: &NodeLifecycleManager,
    mut record: NodeLifecycleRecord,
    doc: MachineConfig,
    node: &NodeSpec,
    bootstrap: bool,
    cancel: &CancellationToken,
) -> (NodeLifecycleRecord, crate::Result<()>) {
    let result = manager
        .provision(&mut record, &doc, node.apply_mode, bootstrap, cancel)
        .await
        .map(|_| ());
    (record, result)
}

impl BootstrapCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decl = self.args.load()?;
        let store = self.args.store();
        let bundle = store.load_secrets()?;

        let node = match &self.node {
            Some(name) => decl.node(name)?,
            None => decl
                .nodes
                .iter()
                .find(|n| n.bootstrap)
                .ok_or_else(|| anyhow::anyhow!("No node declares bootstrap = true (use --node)"))?,
        };

        let manager = NodeLifecycleManager::new(connector_for(&decl), decl.lifecycle.options());
        let mut record = store.load_record(node, bundle)?;
        let issued = manager.bootstrap(&mut record, &interrupt_token()).await?;
        store.save_record(&record)?;

        if issued {
            println!("Cluster {} bootstrapped on {}", decl.cluster.name, node.name);
        } else {
            println!("Node {} was already bootstrapped", node.name);
        }
        Ok(())
    }
}

impl ReadCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decl = self.args.load()?;
        let store = self.args.store();
        let bundle = store.load_secrets()?;
        let reconciler = Reconciler::new(connector_for(&decl));
        let mode = if self.skip_live {
            ReadMode::Skip
        } else {
            ReadMode::Live
        };
        let cancel = interrupt_token();
        let renderer = TableRenderer::new();

        let mut drifted = 0usize;
        for node in decl.select(&self.nodes)? {
            let record = store.load_record(node, bundle.clone())?;
            let report = reconciler
                .drift(&record, &decl.effective_facets(node), mode, &cancel)
                .await?;
            if !report.is_clean() {
                drifted += 1;
            }
            println!("{}", renderer.render_drift(&node.name, &report));
        }

        if drifted > 0 {
            anyhow::bail!("{} node(s) drifted from the declaration", drifted);
        }
        Ok(())
    }
}

impl ResetCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decl = self.args.load()?;
        let store = self.args.store();
        let bundle = store.load_secrets()?;
        let manager = NodeLifecycleManager::new(connector_for(&decl), decl.lifecycle.options());
        let cancel = interrupt_token();

        let selected = if self.all {
            decl.select(&[])?
        } else {
            decl.select(&self.nodes)?
        };

        let mut jobs = Vec::new();
        for node in selected {
            let record = store.load_record(node, bundle.clone())?;
            jobs.push(reset_one(&manager, record, &cancel));
        }

        let mut failures = Vec::new();
        let mut records = Vec::new();
        for (record, result) in join_all(jobs).await {
            match result {
                Ok(()) => store.save_record(&record)?,
                Err(e) => failures.push(format!("{}: {}", record.node_name, e)),
            }
            records.push(record);
        }

        println!("{}", TableRenderer::new().render_nodes(&decl.cluster.name, &records));
        if !failures.is_empty() {
            anyhow::bail!("Reset failed on {} node(s):\n  {}", failures.len(), failures.join("\n  "));
        }
        Ok(())
    }
}

async fn reset_one(
    manager: &NodeLifecycleManager,
    mut record: NodeLifecycleRecord,
    cancel: &CancellationToken,
) -> (NodeLifecycleRecord, crate::Result<()>) {
    let result = manager.reset(&mut record, cancel).await;
    (record, result)
}

impl HealthCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let decl = self.args.load()?;
        let store = self.args.store();
        let kubeconfig = store.read(DEFAULT_KUBECONFIG_FILE)?;
        let client = KubeNodeClientImpl::from_kubeconfig_yaml(&kubeconfig, self.context.clone())
            .await?;

        let expected = self.expected.unwrap_or(decl.nodes.len());
        let ready = wait_for_ready_nodes(
            &client,
            expected,
            Duration::from_secs(self.timeout),
            Duration::from_secs(HEALTH_POLL_INTERVAL_SECS),
            &interrupt_token(),
        )
        .await?;

        println!("{}", TableRenderer::new().render_ready_nodes(&ready, expected));
        Ok(())
    }
}
