// Chart data derived from stored report artifacts.

use std::collections::HashSet;

use serde::Serialize;

use denylist_common::{DistanceVsRssi, WitnessGraph};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeData {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeData {
    pub source: String,
    pub target: String,
}

/// Graph element in the node/edge list format graph widgets consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Element {
    Node { data: NodeData, classes: &'static str },
    Edge { data: EdgeData },
}

/// Unique nodes (transmitters first, then witnesses) followed by one edge
/// per witness row. A node takes the hop of the first row it appears in:
/// first-hop nodes are `red`, the rest `green`.
pub fn witness_graph_elements(graph: &WitnessGraph) -> Vec<Element> {
    let mut seen = HashSet::new();
    let mut elements = Vec::new();

    let endpoints = graph
        .transmitter_address
        .iter()
        .zip(&graph.hop)
        .chain(graph.witness_address.iter().zip(&graph.hop));
    for (address, hop) in endpoints {
        if seen.insert(address.as_str()) {
            elements.push(Element::Node {
                data: NodeData {
                    id: address.clone(),
                },
                classes: if *hop == 1 { "red" } else { "green" },
            });
        }
    }

    elements.extend(
        graph
            .transmitter_address
            .iter()
            .zip(&graph.witness_address)
            .map(|(source, target)| Element::Edge {
                data: EdgeData {
                    source: source.clone(),
                    target: target.clone(),
                },
            }),
    );
    elements
}

/// Squared Pearson correlation of distance against RSSI, rounded to three
/// places. Samples without an RSSI are dropped; `None` when fewer than two
/// samples remain or either series is constant.
pub fn distance_rssi_r_squared(data: &DistanceVsRssi) -> Option<f64> {
    let points: Vec<(f64, f64)> = data
        .distance_m
        .iter()
        .zip(&data.rssi)
        .filter_map(|(d, r)| r.map(|r| (*d, f64::from(r))))
        .collect();
    r_squared(&points)
}

pub fn r_squared(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r2 = (sxy * sxy) / (sxx * syy);
    Some((r2 * 1000.0).round() / 1000.0)
}
