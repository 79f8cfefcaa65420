// src/stats/normalize.rs
//
// Coerces raw feed entries into typed records. Malformed entries are dropped,
// missing or mistyped fields fall back to their defaults.

use log::debug;
use serde_json::{Map, Value};

use super::types::{ApplicationRecord, LocationRecord, NodeRecord, ResourceComponent};

type Object = Map<String, Value>;

/// Keep only the entries that are JSON objects
pub fn mapping_records(raw: &[Value]) -> Vec<&Object> {
    let records: Vec<&Object> = raw.iter().filter_map(Value::as_object).collect();
    if records.len() != raw.len() {
        debug!("Dropped {} non-object feed entries", raw.len() - records.len());
    }
    records
}

pub fn normalize_apps(raw: &[Value]) -> Vec<ApplicationRecord> {
    mapping_records(raw).into_iter().map(normalize_app).collect()
}

pub fn normalize_nodes(raw: &[Value]) -> Vec<NodeRecord> {
    mapping_records(raw)
        .into_iter()
        .map(|obj| NodeRecord {
            ip_address: field(obj, &["ip", "ipAddress", "ip_address"])
                .map(|v| host_part(&as_string(v)))
                .unwrap_or_default(),
            tier: field(obj, &["tier"])
                .map(|v| as_string(v).trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn normalize_locations(raw: &[Value]) -> Vec<LocationRecord> {
    mapping_records(raw)
        .into_iter()
        .map(|obj| LocationRecord {
            name: field(obj, &["name"]).map(as_string).unwrap_or_default(),
            ip_address: field(obj, &["ip", "ipAddress", "ip_address"])
                .map(|v| host_part(&as_string(v)))
                .unwrap_or_default(),
        })
        .collect()
}

fn normalize_app(obj: &Object) -> ApplicationRecord {
    let components = field(obj, &["compose", "resourceComponents"])
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_object)
                .map(|component| ResourceComponent {
                    cpu: number_field(component, &["cpu"]),
                    ram_mb: number_field(component, &["ram", "ramMB"]),
                    hdd_gb: number_field(component, &["hdd", "hddGB"]),
                    secrets: field(component, &["secrets"]).map(as_string).unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let contacts = field(obj, &["contacts"])
        .and_then(Value::as_array)
        .map(|list| list.iter().filter(|v| !v.is_null()).map(as_string).collect())
        .unwrap_or_default();

    let node_assignments = field(obj, &["nodes", "nodeAssignments"])
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|v| host_part(&as_string(v)))
                .filter(|host| !host.is_empty())
                .collect()
        });

    ApplicationRecord {
        name: field(obj, &["name"]).map(as_string).unwrap_or_default(),
        owner: field(obj, &["owner"]).map(as_string).unwrap_or_default(),
        instances: field(obj, &["instances"]).map(as_count).unwrap_or(0),
        contacts,
        secrets: field(obj, &["secrets"]).map(as_string).unwrap_or_default(),
        static_ip: field(obj, &["staticip", "staticIp"]).map(as_flag).unwrap_or(false),
        cpu: number_field(obj, &["cpu"]),
        ram_mb: number_field(obj, &["ram", "ramMB"]),
        hdd_gb: number_field(obj, &["hdd", "hddGB"]),
        components,
        node_assignments,
    }
}

/// Host part of an address: "1.2.3.4:16127" -> "1.2.3.4", "[::1]:80" -> "::1"
pub fn host_part(address: &str) -> String {
    let address = address.trim();
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default().to_string();
    }
    match address.split_once(':') {
        Some((host, port)) if !port.contains(':') => host.to_string(),
        _ => address.to_string(),
    }
}

/// First non-null value among the given keys
fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn number_field(obj: &Object, keys: &[&str]) -> f64 {
    field(obj, keys).map(as_number).unwrap_or(0.0)
}

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Non-negative finite number, zero when the value does not coerce
fn as_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}

fn as_count(value: &Value) -> u64 {
    as_number(value).floor() as u64
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
        }
        _ => false,
    }
}
