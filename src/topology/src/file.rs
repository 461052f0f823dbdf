use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    provider::{Error, TopologyProvider, TopologySnapshot},
    types::{Instance, InstanceMap, Subnet, VirtualNetwork},
};

/// Topology document as exported from a cloud account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDocument {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub virtual_networks: Vec<VirtualNetwork>,
}

impl TopologyDocument {
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        serde_yaml::from_str(contents).map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Provider backed by a YAML document on disk.
///
/// The file is read again on every call, so an external process may rewrite it between
/// resyncs. A resync parses the file once, so its lists always come from one version of the
/// document.
#[derive(Debug, Clone)]
pub struct FileTopologyProvider {
    path: PathBuf,
}

impl FileTopologyProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn load(&self) -> Result<TopologyDocument, Error> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        TopologyDocument::from_yaml(&contents)
    }
}

#[async_trait]
impl TopologyProvider for FileTopologyProvider {
    async fn list_instances(&self) -> Result<InstanceMap, Error> {
        Ok(TopologySnapshot::from(self.load().await?).instances)
    }

    async fn list_subnets(&self) -> Result<Vec<Subnet>, Error> {
        Ok(self.load().await?.subnets)
    }

    async fn list_virtual_networks(&self) -> Result<Vec<VirtualNetwork>, Error> {
        Ok(self.load().await?.virtual_networks)
    }

    async fn snapshot(&self) -> Result<TopologySnapshot, Error> {
        Ok(self.load().await?.into())
    }
}

impl From<TopologyDocument> for TopologySnapshot {
    fn from(doc: TopologyDocument) -> Self {
        TopologySnapshot {
            instances: doc
                .instances
                .into_iter()
                .map(|instance| (instance.id.clone(), instance))
                .collect(),
            subnets: doc.subnets,
            virtual_networks: doc.virtual_networks,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc};

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{instances::InstancesManager, types::ProvisioningState};

    const TOPOLOGY: &str = r"instances:
- id: i-1
  interfaces:
    intf-1:
      id: intf-1
      securityGroup: sg1
      state: succeeded
      addresses:
      - ip: 1.1.1.1
        subnet: subnet-1
        state: succeeded
      - ip: 1.1.1.2
        subnet: subnet-1
        state: pending
subnets:
- id: subnet-1
  cidr: 1.1.0.0/16
  virtualNetworkId: vpc-1
  tags:
    tag1: tag1
virtualNetworks:
- id: vpc-1
  primaryCidr: 1.0.0.0/8
";

    #[tokio::test]
    async fn works_file_topology_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOPOLOGY.as_bytes()).unwrap();

        let provider = FileTopologyProvider::new(file.path());
        let instances = provider.list_instances().await.unwrap();
        let intf = &instances["i-1"].interfaces["intf-1"];
        assert_eq!(intf.security_group, "sg1");
        assert_eq!(intf.addresses.len(), 2);
        assert_eq!(intf.addresses[1].state, ProvisioningState::Pending);

        let subnets = provider.list_subnets().await.unwrap();
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0].cidr, "1.1.0.0/16".parse().unwrap());
        assert_eq!(subnets[0].tags["tag1"], "tag1");

        let vnets = provider.list_virtual_networks().await.unwrap();
        assert_eq!(vnets[0].primary_cidr, Some("1.0.0.0/8".parse().unwrap()));
        assert!(vnets[0].cidrs.is_empty());
    }

    #[tokio::test]
    async fn works_file_topology_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOPOLOGY.as_bytes()).unwrap();
        let provider = FileTopologyProvider::new(file.path());

        let snapshot = provider.snapshot().await.unwrap();
        assert_eq!(snapshot.instances["i-1"].interfaces.len(), 1);
        assert_eq!(snapshot.subnets[0].id, "subnet-1");
        assert_eq!(snapshot.virtual_networks[0].id, "vpc-1");

        // a rewrite between resyncs is picked up as a whole
        std::fs::write(
            file.path(),
            "subnets:\n- id: subnet-2\n  cidr: 2.2.0.0/16\n  virtualNetworkId: vpc-2\n",
        )
        .unwrap();
        let snapshot = provider.snapshot().await.unwrap();
        assert!(snapshot.instances.is_empty());
        assert_eq!(snapshot.subnets.len(), 1);
        assert_eq!(snapshot.subnets[0].id, "subnet-2");
        assert!(snapshot.virtual_networks.is_empty());
    }

    #[tokio::test]
    async fn fails_file_topology_provider() {
        let provider = FileTopologyProvider::new("/nonexistent/topology.yaml");
        assert!(matches!(
            provider.list_subnets().await,
            Err(Error::StdIo(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"subnets:\n- id: subnet-1\n  cidr: not-a-cidr\n").unwrap();
        let provider = FileTopologyProvider::new(file.path());
        assert!(matches!(provider.list_subnets().await, Err(Error::Parse(_))));
    }

    #[tokio::test]
    async fn works_demo_topology() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/topology.yaml");
        let mngr = InstancesManager::new(Arc::new(FileTopologyProvider::new(path)));
        mngr.resync(&CancellationToken::new()).await.unwrap();

        let quota = mngr.get_pool_quota();
        assert_eq!(quota["subnet-1"].available_ips, 65536 - 4);
        assert_eq!(quota["subnet-2"].available_ips, 65536 - 2);
        assert!(mngr.pool_exists("subnet-2"));
        assert_eq!(mngr.get_virtual_networks().len(), 2);
    }
}
