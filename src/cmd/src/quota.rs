use std::sync::Arc;

use clap::{Parser, ValueEnum};
use nimbusd_topology::{
    file::FileTopologyProvider,
    instances::InstancesManager,
    types::{PoolQuotaMap, Subnet},
};
use tabled::{Table, Tabled};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Parser)]
pub struct QuotaCmd {
    #[arg(long = "topology-file", help = "Path to the topology document")]
    pub topology_file: String,

    #[arg(
        value_enum,
        long,
        default_value = "plain",
        help = "Output format"
    )]
    pub output: Output,
}

#[derive(Debug, Clone, Parser, ValueEnum)]
pub enum Output {
    Plain,
    Json,
}

#[derive(Debug, Tabled)]
struct QuotaRow {
    #[tabled(rename = "Subnet")]
    subnet: String,
    #[tabled(rename = "CIDR")]
    cidr: String,
    #[tabled(rename = "Virtual Network")]
    virtual_network: String,
    #[tabled(rename = "Available IPs")]
    available_ips: i128,
}

pub fn run(cmd: QuotaCmd) -> anyhow::Result<()> {
    let manager = InstancesManager::new(Arc::new(FileTopologyProvider::new(&cmd.topology_file)));
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(manager.resync(&CancellationToken::new()))?;

    let quota = manager.get_pool_quota();
    match cmd.output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&quota)?),
        Output::Plain => println!("{}", render(&manager.get_subnets(), &quota)),
    }
    Ok(())
}

fn render(subnets: &[Subnet], quota: &PoolQuotaMap) -> String {
    let rows: Vec<QuotaRow> = subnets
        .iter()
        .filter_map(|subnet| {
            quota.get(&subnet.id).map(|q| QuotaRow {
                subnet: subnet.id.clone(),
                cidr: subnet.cidr.to_string(),
                virtual_network: subnet.virtual_network_id.clone(),
                available_ips: q.available_ips,
            })
        })
        .collect();
    Table::new(rows).to_string()
}
