//! Enrichment - asset names, severity labels and alert notifications
//!
//! Tables are immutable once built; every worker owns its own clone.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use contracts::{AlertAttributes, AlertConfig, AlertContext, AlertNotification};

use crate::error::DispatcherError;

/// Label for severities outside the table
pub const DEFAULT_SEVERITY_LABEL: &str = "informational";

/// IP address -> asset name
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    entries: HashMap<IpAddr, String>,
}

impl AssetTable {
    /// Build from the textual `[assets]` table
    ///
    /// # Errors
    /// A key that is not an IP address.
    pub fn from_config(assets: &BTreeMap<String, String>) -> Result<Self, DispatcherError> {
        let entries = assets
            .iter()
            .map(|(key, name)| {
                key.parse::<IpAddr>()
                    .map(|ip| (ip, name.clone()))
                    .map_err(|e| DispatcherError::InvalidAsset {
                        key: key.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { entries })
    }

    pub fn insert(&mut self, ip: IpAddr, name: impl Into<String>) {
        self.entries.insert(ip, name.into());
    }

    pub fn get(&self, ip: &IpAddr) -> Option<&str> {
        self.entries.get(ip).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source in the table, else destination in the table, else the
    /// destination address itself
    pub fn resolve(&self, src_ip: &IpAddr, dest_ip: &IpAddr) -> String {
        self.get(src_ip)
            .or_else(|| self.get(dest_ip))
            .map(str::to_string)
            .unwrap_or_else(|| dest_ip.to_string())
    }
}

impl FromIterator<(IpAddr, String)> for AssetTable {
    fn from_iter<T: IntoIterator<Item = (IpAddr, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Numeric severity -> label
#[derive(Debug, Clone)]
pub struct SeverityTable {
    labels: HashMap<i64, String>,
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self {
            labels: HashMap::from([(1, "major".to_string()), (2, "minor".to_string())]),
        }
    }
}

impl SeverityTable {
    /// Label for `severity`, `informational` if unknown
    pub fn resolve(&self, severity: i64) -> &str {
        self.labels
            .get(&severity)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SEVERITY_LABEL)
    }
}

/// Static part of every notification
#[derive(Debug, Clone)]
pub struct AlertTemplate {
    pub environment: String,
    pub group: String,
    pub origin: String,
    pub event_type: String,
    pub region: String,
    pub timeout: u32,
}

impl Default for AlertTemplate {
    fn default() -> Self {
        Self::from(&AlertConfig::default())
    }
}

impl From<&AlertConfig> for AlertTemplate {
    fn from(config: &AlertConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            group: config.group.clone(),
            origin: config.origin.clone(),
            event_type: config.event_type.clone(),
            region: config.region.clone(),
            timeout: config.timeout,
        }
    }
}

/// Per-worker enrichment state
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    assets: AssetTable,
    severities: SeverityTable,
    template: AlertTemplate,
}

impl Enricher {
    pub fn new(assets: AssetTable, template: AlertTemplate) -> Self {
        Self {
            assets,
            severities: SeverityTable::default(),
            template,
        }
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn resolve_asset(&self, src_ip: &IpAddr, dest_ip: &IpAddr) -> String {
        self.assets.resolve(src_ip, dest_ip)
    }

    pub fn resolve_severity(&self, severity: i64) -> &str {
        self.severities.resolve(severity)
    }

    /// Notification for one alerting event
    pub fn build_notification(&self, ctx: &AlertContext<'_>) -> AlertNotification {
        let resource = self.resolve_asset(&ctx.src_ip, &ctx.dest_ip);
        AlertNotification {
            attributes: AlertAttributes {
                region: self.template.region.clone(),
            },
            environment: self.template.environment.clone(),
            event: ctx.alert.signature.clone(),
            group: self.template.group.clone(),
            origin: self.template.origin.clone(),
            service: vec![resource.clone()],
            resource,
            severity: self.resolve_severity(ctx.alert.severity).to_string(),
            text: format!("Alert from {} to {}", ctx.src_ip, ctx.dest_ip),
            event_type: self.template.event_type.clone(),
            value: ctx.alert.severity.to_string(),
            timeout: self.template.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{default_assets, AlertInfo};
    use serde_json::Map;

    fn enricher() -> Enricher {
        let assets = AssetTable::from_config(&default_assets()).unwrap();
        Enricher::new(assets, AlertTemplate::default())
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn alert(signature: &str, severity: i64) -> AlertInfo {
        AlertInfo {
            signature: signature.to_string(),
            severity,
            fields: Map::new(),
        }
    }

    #[test]
    fn test_asset_from_source() {
        let e = enricher();
        assert_eq!(e.resolve_asset(&ip("192.168.144.10"), &ip("8.8.8.8")), "minion");
    }

    #[test]
    fn test_asset_falls_back_to_destination() {
        let e = enricher();
        assert_eq!(e.resolve_asset(&ip("8.8.8.8"), &ip("192.168.144.5")), "pihole");
    }

    #[test]
    fn test_asset_falls_back_to_destination_text() {
        let e = enricher();
        assert_eq!(e.resolve_asset(&ip("10.0.0.1"), &ip("10.0.0.2")), "10.0.0.2");
        assert_eq!(e.resolve_asset(&ip("10.0.0.1"), &ip("::1")), "::1");
    }

    #[test]
    fn test_source_wins_over_destination() {
        let e = enricher();
        assert_eq!(
            e.resolve_asset(&ip("192.168.144.15"), &ip("192.168.144.5")),
            "shadow"
        );
    }

    #[test]
    fn test_severity_labels() {
        let e = enricher();
        assert_eq!(e.resolve_severity(1), "major");
        assert_eq!(e.resolve_severity(2), "minor");
        for other in [0, -1, 3, 99] {
            assert_eq!(e.resolve_severity(other), "informational");
        }
    }

    #[test]
    fn test_invalid_asset_key() {
        let assets = BTreeMap::from([("not-an-ip".to_string(), "x".to_string())]);
        let err = AssetTable::from_config(&assets).unwrap_err();
        assert!(matches!(err, DispatcherError::InvalidAsset { .. }));
    }

    #[test]
    fn test_build_notification() {
        let e = enricher();
        let info = alert("ET SCAN", 1);
        let ctx = AlertContext {
            src_ip: ip("192.168.144.10"),
            dest_ip: ip("8.8.8.8"),
            alert: &info,
        };

        let n = e.build_notification(&ctx);
        assert_eq!(n.resource, "minion");
        assert_eq!(n.service, vec!["minion".to_string()]);
        assert_eq!(n.severity, "major");
        assert_eq!(n.value, "1");
        assert_eq!(n.event, "ET SCAN");
        assert_eq!(n.text, "Alert from 192.168.144.10 to 8.8.8.8");
        assert_eq!(n.environment, "Production");
        assert_eq!(n.timeout, 300);
        assert_eq!(n.group, "");
        assert_eq!(n.attributes.region, "");
    }

    #[test]
    fn test_missing_severity_is_informational_zero() {
        let e = enricher();
        let info = alert("X", 0);
        let ctx = AlertContext {
            src_ip: ip("10.0.0.1"),
            dest_ip: ip("10.0.0.2"),
            alert: &info,
        };
        let n = e.build_notification(&ctx);
        assert_eq!(n.severity, "informational");
        assert_eq!(n.value, "0");
        assert_eq!(n.resource, "10.0.0.2");
    }

    #[test]
    fn test_template_from_config() {
        let config = AlertConfig {
            group: "ids".to_string(),
            region: "eu".to_string(),
            event_type: "suricataAlert".to_string(),
            ..AlertConfig::default()
        };
        let e = Enricher::new(AssetTable::default(), AlertTemplate::from(&config));
        let info = alert("X", 2);
        let ctx = AlertContext {
            src_ip: ip("10.0.0.1"),
            dest_ip: ip("10.0.0.2"),
            alert: &info,
        };
        let n = e.build_notification(&ctx);
        assert_eq!(n.group, "ids");
        assert_eq!(n.attributes.region, "eu");
        assert_eq!(n.event_type, "suricataAlert");
    }
}
