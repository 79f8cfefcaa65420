// src/stats/classify.rs
//
// Per-application derived facts: marketplace vs custom, resource demand,
// and the contact/secret/static-IP flags

use super::types::{ApplicationRecord, ResourceDemand};

/// Marketplace launches append a deployment timestamp of at least this many digits
pub const MIN_TIMESTAMP_DIGITS: usize = 10;

/// Facts the aggregator needs about one application
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedApp<'a> {
    /// Template base name, present only for marketplace apps
    pub template: Option<&'a str>,
    pub per_instance: ResourceDemand,
    pub has_contacts: bool,
    pub has_secrets: bool,
    pub has_static_ip: bool,
    pub is_company_owned: bool,
}

impl ClassifiedApp<'_> {
    pub fn is_marketplace(&self) -> bool {
        self.template.is_some()
    }
}

pub fn classify<'a>(app: &'a ApplicationRecord, target_owner: &str) -> ClassifiedApp<'a> {
    ClassifiedApp {
        template: template_base(&app.name),
        per_instance: per_instance_demand(app),
        has_contacts: !app.contacts.is_empty(),
        has_secrets: !resolved_secrets(app).trim().is_empty(),
        has_static_ip: app.static_ip,
        is_company_owned: !target_owner.is_empty() && app.owner == target_owner,
    }
}

/// Strips the trailing timestamp from a marketplace app name.
///
/// Returns `None` when the name does not end in a run of at least
/// [`MIN_TIMESTAMP_DIGITS`] ASCII digits, i.e. the app is custom.
/// A single trailing newline after the digits is tolerated.
pub fn template_base(name: &str) -> Option<&str> {
    let name = name.strip_suffix('\n').unwrap_or(name);
    let digits = name.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits >= MIN_TIMESTAMP_DIGITS {
        Some(&name[..name.len() - digits])
    } else {
        None
    }
}

/// Sum of all compose components, or the top-level triple when there are none
pub fn per_instance_demand(app: &ApplicationRecord) -> ResourceDemand {
    if app.components.is_empty() {
        return ResourceDemand {
            cpu: app.cpu,
            ram_mb: app.ram_mb,
            hdd_gb: app.hdd_gb,
        };
    }

    app.components
        .iter()
        .fold(ResourceDemand::default(), |acc, component| ResourceDemand {
            cpu: acc.cpu + component.cpu,
            ram_mb: acc.ram_mb + component.ram_mb,
            hdd_gb: acc.hdd_gb + component.hdd_gb,
        })
}

/// Top-level secrets, falling back to the first component's
fn resolved_secrets(app: &ApplicationRecord) -> &str {
    if !app.secrets.trim().is_empty() {
        return &app.secrets;
    }
    app.components
        .first()
        .map(|component| component.secrets.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::types::ResourceComponent;

    fn app(name: &str) -> ApplicationRecord {
        ApplicationRecord {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_template_base() {
        assert_eq!(template_base("website1700000000"), Some("website"));
        assert_eq!(template_base("wordpress17000000001234"), Some("wordpress"));
        assert_eq!(template_base("kadena2024"), None);
        assert_eq!(template_base("app123456789"), None);
        assert_eq!(template_base("1234567890"), Some(""));
        assert_eq!(template_base(""), None);
        assert_eq!(template_base("node1700000000x"), None);
        assert_eq!(template_base("website1700000000\n"), Some("website"));
        assert_eq!(template_base("website1700000000\n\n"), None);
        // Only ASCII digits form a timestamp
        assert_eq!(template_base("app١٧٠٠٠٠٠٠٠٠"), None);
    }

    #[test]
    fn test_marketplace_classification() {
        assert!(classify(&app("website1700000000"), "").is_marketplace());
        assert!(!classify(&app("myapp"), "").is_marketplace());
    }

    #[test]
    fn test_demand_sums_components() {
        let mut record = app("stack");
        record.cpu = 100.0;
        record.components = vec![
            ResourceComponent { cpu: 1.0, ram_mb: 1024.0, hdd_gb: 10.0, ..Default::default() },
            ResourceComponent { cpu: 0.5, ram_mb: 512.0, hdd_gb: 5.0, ..Default::default() },
        ];
        let demand = per_instance_demand(&record);
        assert_eq!(demand, ResourceDemand { cpu: 1.5, ram_mb: 1536.0, hdd_gb: 15.0 });
    }

    #[test]
    fn test_demand_falls_back_to_top_level() {
        let mut record = app("single");
        record.cpu = 2.0;
        record.ram_mb = 4096.0;
        record.hdd_gb = 40.0;
        let demand = per_instance_demand(&record);
        assert_eq!(demand, ResourceDemand { cpu: 2.0, ram_mb: 4096.0, hdd_gb: 40.0 });
    }

    #[test]
    fn test_secrets_resolution() {
        let mut record = app("s");
        assert!(!classify(&record, "").has_secrets);

        record.secrets = "   ".to_string();
        assert!(!classify(&record, "").has_secrets);

        record.components = vec![ResourceComponent {
            secrets: "-----BEGIN PGP MESSAGE-----".to_string(),
            ..Default::default()
        }];
        assert!(classify(&record, "").has_secrets);

        record.components[0].secrets.clear();
        record.secrets = "top".to_string();
        assert!(classify(&record, "").has_secrets);
    }

    #[test]
    fn test_flags_and_ownership() {
        let mut record = app("flags");
        record.owner = "OWNER_X".to_string();
        record.contacts = vec!["ops@example.com".to_string()];
        record.static_ip = true;

        let classified = classify(&record, "OWNER_X");
        assert!(classified.has_contacts);
        assert!(classified.has_static_ip);
        assert!(classified.is_company_owned);

        assert!(!classify(&record, "OWNER_Y").is_company_owned);
        assert!(!classify(&app("anon"), "").is_company_owned);
    }
}
