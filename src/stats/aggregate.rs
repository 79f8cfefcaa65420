// src/stats/aggregate.rs
//
// Single pass over the classified applications producing the report

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::classify::{classify, ClassifiedApp};
use super::tiers::TierModel;
use super::types::{AggregateReport, Snapshot, TemplateCount, TierUsage};
use super::{percentage, round2, StatsSettings, DISK_GB_PER_TB, RAM_MB_PER_GB};

/// Number of marketplace templates kept in the ranking
pub const TOP_TEMPLATES: usize = 5;

/// Pure aggregation over a snapshot, configured at construction
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    settings: StatsSettings,
}

#[derive(Debug, Default)]
struct FlagCounter {
    total: u64,
    marketplace: u64,
    custom: u64,
}

impl FlagCounter {
    fn record(&mut self, flag: bool, marketplace: bool) {
        if !flag {
            return;
        }
        self.total += 1;
        if marketplace {
            self.marketplace += 1;
        } else {
            self.custom += 1;
        }
    }
}

#[derive(Debug, Default)]
struct TierUsageAccumulator {
    instances: u64,
    cpu: f64,
    ram_mb: f64,
    hdd_gb: f64,
}

/// Template counts kept in first-seen order so ties rank by appearance
#[derive(Debug, Default)]
struct TemplateCounter<'a> {
    order: Vec<(&'a str, u64)>,
    index: HashMap<&'a str, usize>,
}

impl<'a> TemplateCounter<'a> {
    fn record(&mut self, template: &'a str) {
        match self.index.get(template) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(template, self.order.len());
                self.order.push((template, 1));
            }
        }
    }

    fn top(mut self, limit: usize) -> Vec<TemplateCount> {
        // sort_by is stable
        self.order.sort_by(|a, b| b.1.cmp(&a.1));
        self.order
            .into_iter()
            .take(limit)
            .map(|(name, deployments)| TemplateCount {
                name: name.to_string(),
                deployments,
            })
            .collect()
    }
}

impl Aggregator {
    pub fn new(settings: StatsSettings) -> Self {
        Self { settings }
    }

    pub fn aggregate(&self, snapshot: &Snapshot) -> AggregateReport {
        let tier_model = TierModel::build(&snapshot.nodes, &self.settings.tiers);

        let mut placements: HashMap<&str, Vec<&str>> = HashMap::new();
        for location in snapshot.locations.iter().flatten() {
            if !location.name.is_empty() && !location.ip_address.is_empty() {
                placements
                    .entry(location.name.as_str())
                    .or_default()
                    .push(location.ip_address.as_str());
            }
        }

        let mut report = AggregateReport::default();
        let mut owners: HashSet<&str> = HashSet::new();
        let mut contacts = FlagCounter::default();
        let mut secrets = FlagCounter::default();
        let mut static_ip = FlagCounter::default();
        let mut templates = TemplateCounter::default();
        let (mut cpu, mut ram_mb, mut hdd_gb) = (0.0, 0.0, 0.0);
        let mut usage: BTreeMap<&str, TierUsageAccumulator> = self
            .settings
            .tiers
            .names()
            .map(|name| (name, TierUsageAccumulator::default()))
            .collect();

        for record in &snapshot.apps {
            let app: ClassifiedApp<'_> = classify(record, &self.settings.target_owner);
            let marketplace = app.is_marketplace();

            report.total_apps += 1;
            report.total_instances = report.total_instances.saturating_add(record.instances);
            if !record.owner.is_empty() {
                owners.insert(record.owner.as_str());
            }
            if app.is_company_owned {
                report.company_deployments += 1;
                report.company_instances = report.company_instances.saturating_add(record.instances);
            }

            match app.template {
                Some(template) => {
                    report.marketplace_apps += 1;
                    templates.record(template);
                }
                None => report.custom_apps += 1,
            }

            contacts.record(app.has_contacts, marketplace);
            secrets.record(app.has_secrets, marketplace);
            static_ip.record(app.has_static_ip, marketplace);

            let instances = record.instances as f64;
            cpu += app.per_instance.cpu * instances;
            ram_mb += app.per_instance.ram_mb * instances;
            hdd_gb += app.per_instance.hdd_gb * instances;

            // Each assignment is one running instance, regardless of `instances`
            let assigned: Vec<&str> = match &record.node_assignments {
                Some(nodes) if !nodes.is_empty() => nodes.iter().map(String::as_str).collect(),
                _ => placements.get(record.name.as_str()).cloned().unwrap_or_default(),
            };
            for address in assigned {
                let Some(tier) = tier_model.tier_of(address) else {
                    continue;
                };
                if let Some(acc) = usage.get_mut(tier) {
                    acc.instances += 1;
                    acc.cpu += app.per_instance.cpu;
                    acc.ram_mb += app.per_instance.ram_mb;
                    acc.hdd_gb += app.per_instance.hdd_gb;
                }
            }
        }

        let total = report.total_apps as f64;
        let marketplace_total = report.marketplace_apps as f64;
        let custom_total = report.custom_apps as f64;

        report.unique_owners = owners.len() as u64;
        report.marketplace_pct = percentage(marketplace_total, total);
        report.custom_pct = percentage(custom_total, total);

        report.total_with_contacts = contacts.total;
        report.total_contact_pct = percentage(contacts.total as f64, total);
        report.marketplace_with_contacts = contacts.marketplace;
        report.marketplace_contact_pct = percentage(contacts.marketplace as f64, marketplace_total);
        report.custom_with_contacts = contacts.custom;
        report.custom_contact_pct = percentage(contacts.custom as f64, custom_total);

        report.total_with_secrets = secrets.total;
        report.total_secrets_pct = percentage(secrets.total as f64, total);
        report.marketplace_with_secrets = secrets.marketplace;
        report.marketplace_secrets_pct = percentage(secrets.marketplace as f64, marketplace_total);
        report.custom_with_secrets = secrets.custom;
        report.custom_secrets_pct = percentage(secrets.custom as f64, custom_total);

        report.total_with_staticip = static_ip.total;
        report.total_staticip_pct = percentage(static_ip.total as f64, total);
        report.marketplace_with_staticip = static_ip.marketplace;
        report.marketplace_staticip_pct = percentage(static_ip.marketplace as f64, marketplace_total);
        report.custom_with_staticip = static_ip.custom;
        report.custom_staticip_pct = percentage(static_ip.custom as f64, custom_total);

        let ram_gb = ram_mb / RAM_MB_PER_GB;
        report.total_cpu = round2(cpu);
        report.total_ram_gb = round2(ram_gb);
        report.total_hdd_gb = round2(hdd_gb);
        report.total_hdd_tb = round2(hdd_gb / DISK_GB_PER_TB);

        let network = tier_model.network_total();
        report.network_total_nodes = network.nodes;
        report.network_total_cpu = network.cpu;
        report.network_total_ram_gb = network.ram_gb;
        report.network_total_ram_tb = network.ram_tb;
        report.network_total_hdd_gb = network.hdd_gb;
        report.network_total_hdd_tb = network.hdd_tb;
        report.cpu_util_pct = percentage(cpu, network.cpu);
        report.ram_util_pct = percentage(ram_gb, network.ram_gb);
        report.hdd_util_pct = percentage(hdd_gb, network.hdd_gb);
        report.tier_capacity = tier_model.capacity().clone();

        report.tier_usage = usage
            .into_iter()
            .map(|(tier, acc)| {
                let tier_usage = TierUsage {
                    instances: acc.instances,
                    cpu: round2(acc.cpu),
                    ram_gb: round2(acc.ram_mb / RAM_MB_PER_GB),
                    hdd_gb: round2(acc.hdd_gb),
                };
                (tier.to_string(), tier_usage)
            })
            .collect();

        report.top_marketplace_apps = templates.top(TOP_TEMPLATES);

        debug!(
            "Aggregated {} apps ({} marketplace) over {} nodes",
            report.total_apps, report.marketplace_apps, report.network_total_nodes
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::normalize::{normalize_apps, normalize_nodes};
    use crate::stats::types::{LocationRecord, NodeRecord};
    use serde_json::json;

    fn snapshot(apps: serde_json::Value, nodes: serde_json::Value) -> Snapshot {
        let apps = apps.as_array().cloned().unwrap_or_default();
        let nodes = nodes.as_array().cloned().unwrap_or_default();
        Snapshot {
            apps: normalize_apps(&apps),
            nodes: normalize_nodes(&nodes),
            locations: None,
        }
    }

    fn owner_settings(owner: &str) -> StatsSettings {
        StatsSettings {
            target_owner: owner.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_marketplace_app() {
        let input = snapshot(
            json!([{"name": "website1700000000", "instances": 2, "cpu": 1, "ram": 1024, "hdd": 10}]),
            json!([]),
        );
        let report = Aggregator::default().aggregate(&input);

        assert_eq!(report.total_apps, 1);
        assert_eq!(report.marketplace_apps, 1);
        assert_eq!(report.custom_apps, 0);
        assert_eq!(report.total_instances, 2);
        assert_eq!(report.total_cpu, 2.0);
        assert_eq!(report.total_ram_gb, 2.0);
        assert_eq!(report.total_hdd_gb, 20.0);
        assert_eq!(report.total_hdd_tb, 0.02);
        assert_eq!(
            report.top_marketplace_apps,
            vec![TemplateCount { name: "website".to_string(), deployments: 1 }]
        );
        assert_eq!(report.marketplace_pct, 100.0);
        assert_eq!(report.custom_pct, 0.0);
        assert_eq!(report.cpu_util_pct, 0.0);
    }

    #[test]
    fn test_company_owned_custom_app() {
        let input = snapshot(json!([{"name": "myapp", "instances": 1, "owner": "OWNER_X"}]), json!([]));
        let report = Aggregator::new(owner_settings("OWNER_X")).aggregate(&input);

        assert_eq!(report.company_deployments, 1);
        assert_eq!(report.company_instances, 1);
        assert_eq!(report.marketplace_apps, 0);
        assert_eq!(report.custom_apps, 1);
        assert_eq!(report.unique_owners, 1);
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let report = Aggregator::default().aggregate(&Snapshot::default());

        assert_eq!(report.total_apps, 0);
        assert_eq!(report.marketplace_pct, 0.0);
        assert_eq!(report.custom_pct, 0.0);
        assert_eq!(report.total_contact_pct, 0.0);
        assert_eq!(report.marketplace_secrets_pct, 0.0);
        assert_eq!(report.custom_staticip_pct, 0.0);
        assert_eq!(report.cpu_util_pct, 0.0);
        assert_eq!(report.ram_util_pct, 0.0);
        assert_eq!(report.hdd_util_pct, 0.0);
        assert_eq!(report.network_total_cpu, 0.0);
        assert!(report.top_marketplace_apps.is_empty());
        for usage in report.tier_usage.values() {
            assert_eq!(*usage, TierUsage::default());
        }
        for capacity in report.tier_capacity.values() {
            assert_eq!(capacity.nodes, 0);
        }
    }

    #[test]
    fn test_tier_usage_counts_assignments() {
        let input = snapshot(
            json!([{"name": "pinned", "instances": 7, "cpu": 1, "ram": 2048, "hdd": 30,
                    "nodeAssignments": ["10.0.0.1"]}]),
            json!([{"ip": "10.0.0.1", "tier": "CUMULUS"}]),
        );
        let report = Aggregator::default().aggregate(&input);

        let cumulus = &report.tier_usage["CUMULUS"];
        assert_eq!(cumulus.instances, 1);
        assert_eq!(cumulus.cpu, 1.0);
        assert_eq!(cumulus.ram_gb, 2.0);
        assert_eq!(cumulus.hdd_gb, 30.0);
        assert_eq!(report.tier_usage["NIMBUS"].instances, 0);

        // Totals still use the declared instance count
        assert_eq!(report.total_cpu, 7.0);
        assert_eq!(report.network_total_cpu, 2.0);
        assert_eq!(report.cpu_util_pct, 350.0);
    }

    #[test]
    fn test_unresolvable_assignments_are_skipped() {
        let input = snapshot(
            json!([{"name": "ghost", "instances": 1, "cpu": 1,
                    "nodes": ["10.9.9.9", "10.0.0.1:16127"]}]),
            json!([{"ip": "10.0.0.1:16127", "tier": "stratus"}]),
        );
        let report = Aggregator::default().aggregate(&input);
        let total: u64 = report.tier_usage.values().map(|u| u.instances).sum();
        assert_eq!(total, 1);
        assert_eq!(report.tier_usage["STRATUS"].instances, 1);
    }

    #[test]
    fn test_location_feed_fills_missing_assignments() {
        let mut input = snapshot(
            json!([
                {"name": "located", "instances": 3, "cpu": 2},
                {"name": "explicit", "instances": 1, "cpu": 1, "nodes": ["10.0.0.2"]}
            ]),
            json!([
                {"ip": "10.0.0.1", "tier": "NIMBUS"},
                {"ip": "10.0.0.2", "tier": "CUMULUS"}
            ]),
        );
        input.locations = Some(vec![
            LocationRecord { name: "located".to_string(), ip_address: "10.0.0.1".to_string() },
            LocationRecord { name: "located".to_string(), ip_address: "10.0.0.2".to_string() },
            LocationRecord { name: "explicit".to_string(), ip_address: "10.0.0.1".to_string() },
        ]);
        let report = Aggregator::default().aggregate(&input);

        assert_eq!(report.tier_usage["NIMBUS"].instances, 1);
        assert_eq!(report.tier_usage["NIMBUS"].cpu, 2.0);
        assert_eq!(report.tier_usage["CUMULUS"].instances, 2);
        assert_eq!(report.tier_usage["CUMULUS"].cpu, 3.0);
    }

    #[test]
    fn test_flag_breakdowns() {
        let input = snapshot(
            json!([
                {"name": "market1700000001", "contacts": ["a"], "staticip": true},
                {"name": "market1700000002"},
                {"name": "custom-a", "contacts": ["b"], "secrets": "x"},
                {"name": "custom-b", "compose": [{"secrets": "y"}]},
                {"name": "custom-c"}
            ]),
            json!([]),
        );
        let report = Aggregator::default().aggregate(&input);

        assert_eq!(report.total_with_contacts, 2);
        assert_eq!(report.total_contact_pct, 40.0);
        assert_eq!(report.marketplace_with_contacts, 1);
        assert_eq!(report.marketplace_contact_pct, 50.0);
        assert_eq!(report.custom_with_contacts, 1);
        assert_eq!(report.custom_contact_pct, 33.33);

        assert_eq!(report.total_with_secrets, 2);
        assert_eq!(report.marketplace_with_secrets, 0);
        assert_eq!(report.custom_with_secrets, 2);
        assert_eq!(report.custom_secrets_pct, 66.67);

        assert_eq!(report.total_with_staticip, 1);
        assert_eq!(report.marketplace_staticip_pct, 50.0);
        assert_eq!(report.custom_staticip_pct, 0.0);

        assert_eq!(report.marketplace_pct, 40.0);
        assert_eq!(report.custom_pct, 60.0);
    }

    #[test]
    fn test_top_templates_ranking_and_ties() {
        let names = [
            "beta1700000001", "alpha1700000002", "gamma1700000003",
            "alpha1700000004", "delta1700000005", "eps1700000006",
            "zeta1700000007", "gamma1700000008", "custom",
        ];
        let apps: Vec<serde_json::Value> = names.iter().map(|n| json!({ "name": n })).collect();
        let input = Snapshot {
            apps: normalize_apps(&apps),
            ..Default::default()
        };
        let report = Aggregator::default().aggregate(&input);

        let ranked: Vec<(&str, u64)> = report
            .top_marketplace_apps
            .iter()
            .map(|t| (t.name.as_str(), t.deployments))
            .collect();
        assert_eq!(
            ranked,
            vec![("alpha", 2), ("gamma", 2), ("beta", 1), ("delta", 1), ("eps", 1)]
        );
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let apps: Vec<serde_json::Value> = (0..7)
            .map(|i| {
                if i % 3 == 0 {
                    json!({ "name": format!("tmpl{}", 1_700_000_000u64 + i) })
                } else {
                    json!({ "name": format!("custom{}", i) })
                }
            })
            .collect();
        let input = Snapshot { apps: normalize_apps(&apps), ..Default::default() };
        let report = Aggregator::default().aggregate(&input);

        assert_eq!(report.marketplace_apps + report.custom_apps, report.total_apps);
        assert!((report.marketplace_pct + report.custom_pct - 100.0).abs() <= 0.01);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let input = snapshot(
            json!([
                {"name": "web1700000000", "owner": "a", "instances": 3, "cpu": 0.5, "ram": 500, "hdd": 5,
                 "nodes": ["10.0.0.1", "10.0.0.2"]},
                {"name": "db", "owner": "b", "instances": 1,
                 "compose": [{"cpu": 2, "ram": 4000, "hdd": 100}, {"cpu": 1, "ram": 1000, "hdd": 1}]}
            ]),
            json!([
                {"ip": "10.0.0.1", "tier": "CUMULUS"},
                {"ip": "10.0.0.2", "tier": "STRATUS"},
                {"ip": "10.0.0.3", "tier": "NIMBUS"}
            ]),
        );
        let aggregator = Aggregator::default();
        let first = serde_json::to_vec(&aggregator.aggregate(&input)).unwrap();
        let second = serde_json::to_vec(&aggregator.aggregate(&input)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_huge_instance_counts_saturate() {
        let input = snapshot(
            json!([
                {"name": "huge", "owner": "OWNER_X", "instances": 18446744073709551615u64},
                {"name": "small", "owner": "OWNER_X", "instances": 1}
            ]),
            json!([]),
        );
        let report = Aggregator::new(owner_settings("OWNER_X")).aggregate(&input);

        assert_eq!(report.total_apps, 2);
        assert_eq!(report.total_instances, u64::MAX);
        assert_eq!(report.company_instances, u64::MAX);
    }

    #[test]
    fn test_nodes_without_tier_do_not_count() {
        let input = Snapshot {
            nodes: vec![NodeRecord { ip_address: "10.0.0.1".to_string(), tier: "unknown".to_string() }],
            ..Default::default()
        };
        let report = Aggregator::default().aggregate(&input);
        assert_eq!(report.network_total_nodes, 0);
    }
}
