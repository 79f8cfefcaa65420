use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// One compose component of an application spec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceComponent {
    pub cpu: f64,
    pub ram_mb: f64,
    pub hdd_gb: f64,
    pub secrets: String,
}

/// A deployed application specification after normalization.
///
/// Every field has a default so a record missing fields is still usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationRecord {
    pub name: String,
    pub owner: String,
    pub instances: u64,
    pub contacts: Vec<String>,
    pub secrets: String,
    pub static_ip: bool,
    /// Top-level resources, used only when `components` is empty
    pub cpu: f64,
    pub ram_mb: f64,
    pub hdd_gb: f64,
    pub components: Vec<ResourceComponent>,
    /// Host addresses currently running an instance, `None` when the feed omits them
    pub node_assignments: Option<Vec<String>>,
}

/// A physical node from the node feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    /// Host part of the node address, port stripped
    pub ip_address: String,
    pub tier: String,
}

/// One running instance placement from the location feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationRecord {
    pub name: String,
    pub ip_address: String,
}

/// Everything a single aggregation pass consumes
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub apps: Vec<ApplicationRecord>,
    pub nodes: Vec<NodeRecord>,
    pub locations: Option<Vec<LocationRecord>>,
}

/// Per-instance resource demand of an application
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceDemand {
    pub cpu: f64,
    pub ram_mb: f64,
    pub hdd_gb: f64,
}

/// Hardware of a single node in a tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierHardware {
    pub cpu: f64,
    pub ram_gb: f64,
    pub hdd_gb: f64,
}

/// Network-wide capacity of one tier (or of all tiers)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierCapacity {
    pub nodes: u64,
    pub cpu: f64,
    pub ram_gb: f64,
    pub ram_tb: f64,
    pub hdd_gb: f64,
    pub hdd_tb: f64,
}

/// Resources consumed by placed instances on one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierUsage {
    pub instances: u64,
    pub cpu: f64,
    pub ram_gb: f64,
    pub hdd_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCount {
    pub name: String,
    pub deployments: u64,
}

/// The consolidated statistics report.
///
/// Serialized flat, so it can be handed to the dashboard as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_apps: u64,
    pub marketplace_apps: u64,
    pub custom_apps: u64,
    pub unique_owners: u64,
    pub marketplace_pct: f64,
    pub custom_pct: f64,

    pub total_instances: u64,
    pub company_deployments: u64,
    pub company_instances: u64,

    pub total_with_contacts: u64,
    pub total_contact_pct: f64,
    pub marketplace_with_contacts: u64,
    pub marketplace_contact_pct: f64,
    pub custom_with_contacts: u64,
    pub custom_contact_pct: f64,

    pub total_with_secrets: u64,
    pub total_secrets_pct: f64,
    pub marketplace_with_secrets: u64,
    pub marketplace_secrets_pct: f64,
    pub custom_with_secrets: u64,
    pub custom_secrets_pct: f64,

    pub total_with_staticip: u64,
    pub total_staticip_pct: f64,
    pub marketplace_with_staticip: u64,
    pub marketplace_staticip_pct: f64,
    pub custom_with_staticip: u64,
    pub custom_staticip_pct: f64,

    pub total_cpu: f64,
    pub total_ram_gb: f64,
    pub total_hdd_gb: f64,
    pub total_hdd_tb: f64,

    pub tier_capacity: BTreeMap<String, TierCapacity>,
    pub network_total_nodes: u64,
    pub network_total_cpu: f64,
    pub network_total_ram_gb: f64,
    pub network_total_ram_tb: f64,
    pub network_total_hdd_gb: f64,
    pub network_total_hdd_tb: f64,

    pub tier_usage: BTreeMap<String, TierUsage>,
    pub cpu_util_pct: f64,
    pub ram_util_pct: f64,
    pub hdd_util_pct: f64,

    pub top_marketplace_apps: Vec<TemplateCount>,
}

/// A persisted report and the time it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub report: AggregateReport,
    /// Milliseconds since the Unix epoch
    pub last_updated: i64,
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Apps: {} total, {} marketplace ({:.2}%), {} custom ({:.2}%), {} owners",
            self.total_apps,
            self.marketplace_apps,
            self.marketplace_pct,
            self.custom_apps,
            self.custom_pct,
            self.unique_owners
        )?;
        writeln!(
            f,
            "Instances: {} (company: {} deployments, {} instances)",
            self.total_instances, self.company_deployments, self.company_instances
        )?;
        writeln!(
            f,
            "Resources: {:.2} vCPU, {:.2} GB RAM, {:.2} TB SSD",
            self.total_cpu, self.total_ram_gb, self.total_hdd_tb
        )?;
        writeln!(
            f,
            "Network: {} nodes, {:.2} vCPU, {:.2} TB RAM, {:.2} TB SSD",
            self.network_total_nodes,
            self.network_total_cpu,
            self.network_total_ram_tb,
            self.network_total_hdd_tb
        )?;
        write!(
            f,
            "Utilization: CPU {:.2}%, RAM {:.2}%, SSD {:.2}%",
            self.cpu_util_pct, self.ram_util_pct, self.hdd_util_pct
        )?;
        for (rank, template) in self.top_marketplace_apps.iter().enumerate() {
            write!(f, "\n  #{} {} ({})", rank + 1, template.name, template.deployments)?;
        }
        Ok(())
    }
}
