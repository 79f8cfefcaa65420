// src/stats/tiers.rs
//
// Node hardware tiers and the network capacity derived from the node inventory

use std::collections::{BTreeMap, HashMap};

use super::types::{NodeRecord, TierCapacity, TierHardware};
use super::{round2, DISK_GB_PER_TB, RAM_GB_PER_TB};

/// Fixed per-node hardware allotment for each known tier.
///
/// Tier names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: BTreeMap<String, TierHardware>,
}

impl TierTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TierHardware)>,
        S: AsRef<str>,
    {
        Self {
            tiers: entries
                .into_iter()
                .map(|(name, hardware)| (name.as_ref().trim().to_ascii_uppercase(), hardware))
                .collect(),
        }
    }

    /// Flux node tiers
    pub fn flux() -> Self {
        Self::new([
            ("CUMULUS", TierHardware { cpu: 2.0, ram_gb: 8.0, hdd_gb: 220.0 }),
            ("NIMBUS", TierHardware { cpu: 4.0, ram_gb: 32.0, hdd_gb: 440.0 }),
            ("STRATUS", TierHardware { cpu: 8.0, ram_gb: 64.0, hdd_gb: 880.0 }),
        ])
    }

    /// Canonical tier name and hardware for a free-form tier label
    pub fn lookup(&self, tier: &str) -> Option<(&str, &TierHardware)> {
        let key = tier.trim().to_ascii_uppercase();
        self.tiers
            .get_key_value(&key)
            .map(|(name, hardware)| (name.as_str(), hardware))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::flux()
    }
}

/// Node-to-tier mapping plus per-tier and network-wide capacity.
///
/// Depends only on the node inventory and the tier table.
#[derive(Debug, Clone, Default)]
pub struct TierModel {
    node_tier_by_address: HashMap<String, String>,
    capacity: BTreeMap<String, TierCapacity>,
    network_total: TierCapacity,
}

impl TierModel {
    pub fn build(nodes: &[NodeRecord], table: &TierTable) -> Self {
        let mut node_tier_by_address = HashMap::new();
        let mut node_counts: BTreeMap<&str, u64> = table.names().map(|name| (name, 0)).collect();

        for node in nodes {
            if node.ip_address.is_empty() {
                continue;
            }
            let Some((tier, _)) = table.lookup(&node.tier) else {
                continue;
            };
            // Several nodes may share a host behind different ports; each one
            // adds capacity, the last one seen owns the address
            *node_counts.entry(tier).or_default() += 1;
            node_tier_by_address.insert(node.ip_address.clone(), tier.to_string());
        }

        let mut capacity = BTreeMap::new();
        let mut total = TierCapacity::default();
        for (tier, count) in node_counts {
            let Some((_, hardware)) = table.lookup(tier) else {
                continue;
            };
            let n = count as f64;
            let tier_capacity = capacity_of(count, n * hardware.cpu, n * hardware.ram_gb, n * hardware.hdd_gb);

            total.nodes += tier_capacity.nodes;
            total.cpu += tier_capacity.cpu;
            total.ram_gb += tier_capacity.ram_gb;
            total.hdd_gb += tier_capacity.hdd_gb;

            capacity.insert(tier.to_string(), tier_capacity);
        }

        Self {
            node_tier_by_address,
            capacity,
            network_total: capacity_of(total.nodes, total.cpu, total.ram_gb, total.hdd_gb),
        }
    }

    pub fn tier_of(&self, address: &str) -> Option<&str> {
        self.node_tier_by_address.get(address).map(String::as_str)
    }

    pub fn capacity(&self) -> &BTreeMap<String, TierCapacity> {
        &self.capacity
    }

    pub fn network_total(&self) -> &TierCapacity {
        &self.network_total
    }
}

fn capacity_of(nodes: u64, cpu: f64, ram_gb: f64, hdd_gb: f64) -> TierCapacity {
    TierCapacity {
        nodes,
        cpu: round2(cpu),
        ram_gb: round2(ram_gb),
        ram_tb: round2(ram_gb / RAM_GB_PER_TB),
        hdd_gb: round2(hdd_gb),
        hdd_tb: round2(hdd_gb / DISK_GB_PER_TB),
    }
}
