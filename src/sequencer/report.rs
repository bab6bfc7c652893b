//! What a completed bootstrap produced, for printing or machine consumption.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub channel_id: String,
    pub channel_tx_id: String,
    pub chaincodes: Vec<DeployedChaincode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedChaincode {
    pub name: String,
    pub version: String,
    /// Hex SHA-256 of the installed package.
    pub package_hash: String,
    pub install_tx_id: String,
    /// Peers the package was installed on.
    pub install_targets: Vec<String>,
    pub instantiate_tx_id: String,
    /// Private-data collection names, in file order.
    pub collections: Vec<String>,
}
