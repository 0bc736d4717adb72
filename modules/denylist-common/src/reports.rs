//! Report datasets written to artifact storage.
//!
//! Every dataset is column-oriented: parallel arrays, one element per sample.
//! The API reads these back verbatim.

use serde::{Deserialize, Serialize};

/// Artifact names under `issues/{issue}/entries/{address}/`.
pub const DISTANCE_VS_RSSI: &str = "distance_vs_rssi";
pub const WITNESSED_MAKERS: &str = "witnessed_makers";
pub const HOTSPOT_DETAILS: &str = "hotspot_details";
pub const WITNESS_GRAPH: &str = "witness_graph";
pub const RSSI_VS_SNR: &str = "rssi_vs_snr";

pub const ENTRY_DATASETS: [&str; 5] = [
    DISTANCE_VS_RSSI,
    WITNESSED_MAKERS,
    HOTSPOT_DETAILS,
    WITNESS_GRAPH,
    RSSI_VS_SNR,
];

/// Object key of the issue-level artifact.
pub fn issue_details_key(issue: i64) -> String {
    format!("issues/{issue}/issue_details")
}

/// Object key of a per-entry dataset.
pub fn entry_dataset_key(issue: i64, address: &str, dataset: &str) -> String {
    format!("issues/{issue}/entries/{address}/{dataset}")
}

/// Witness distance (meters) against received signal strength.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceVsRssi {
    pub distance_m: Vec<f64>,
    pub rssi: Vec<Option<i32>>,
}

/// Makers of the transmitters this hotspot witnessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessedMakers {
    pub maker: Vec<Option<String>>,
    pub n_witnessed: Vec<i64>,
    pub as_of_block: i64,
}

/// Point-in-time metadata for a hotspot from the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotDetails {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub first_block: Option<i64>,
    pub last_block: Option<i64>,
    pub reward_scale: Option<f64>,
    pub elevation: Option<i32>,
    pub gain: Option<i32>,
    pub nonce: Option<i64>,
    pub maker: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub location: Option<String>,
    pub as_of_block: Option<i64>,
}

/// Two-hop witness edges starting from the reported hotspot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessGraph {
    pub transmitter_address: Vec<String>,
    pub witness_address: Vec<String>,
    pub hop: Vec<i32>,
    pub maker: Vec<Option<String>>,
    pub owner: Vec<Option<String>>,
    pub location: Vec<Option<String>>,
    pub first_block: Vec<Option<i64>>,
}

impl WitnessGraph {
    pub fn len(&self) -> usize {
        self.transmitter_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transmitter_address.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RssiVsSnr {
    pub rssi: Vec<Option<i32>>,
    pub snr: Vec<Option<f64>>,
}

/// The five datasets computed for one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryReport {
    pub distance_vs_rssi: DistanceVsRssi,
    pub witnessed_makers: WitnessedMakers,
    pub hotspot_details: HotspotDetails,
    pub witness_graph: WitnessGraph,
    pub rssi_vs_snr: RssiVsSnr,
}

impl EntryReport {
    /// `(dataset name, JSON body)` pairs in storage order.
    pub fn datasets(&self) -> serde_json::Result<Vec<(&'static str, serde_json::Value)>> {
        Ok(vec![
            (DISTANCE_VS_RSSI, serde_json::to_value(&self.distance_vs_rssi)?),
            (WITNESSED_MAKERS, serde_json::to_value(&self.witnessed_makers)?),
            (HOTSPOT_DETAILS, serde_json::to_value(&self.hotspot_details)?),
            (WITNESS_GRAPH, serde_json::to_value(&self.witness_graph)?),
            (RSSI_VS_SNR, serde_json::to_value(&self.rssi_vs_snr)?),
        ])
    }
}
