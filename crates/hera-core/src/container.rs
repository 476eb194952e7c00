//! Normalized view of a runtime container or swarm service.

use std::collections::HashMap;

use crate::config::LabelConfig;

/// Length of the abbreviated container id used in log lines.
const SHORT_ID_LEN: usize = 12;

/// Metadata captured from a single runtime inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    /// Full runtime identifier; the tunnel registry key.
    pub id: String,
    /// Hostname the container answers to inside its network.
    pub internal_hostname: String,
    pub labels: HashMap<String, String>,
}

/// The tunnel-relevant labels of an opted-in container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelLabels {
    /// Desired public hostname.
    pub hostname: String,
    /// Upstream port on the container.
    pub port: String,
    /// Explicit certificate file name, bypassing root-domain matching.
    pub certificate: Option<String>,
}

impl ContainerDescriptor {
    pub fn new(
        id: impl Into<String>,
        internal_hostname: impl Into<String>,
        labels: HashMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            internal_hostname: internal_hostname.into(),
            labels,
        }
    }

    /// Abbreviated id for log output.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Extract the tunnel labels.
    ///
    /// Returns `None` when either required label is absent or blank: the
    /// container has not opted in.
    pub fn tunnel_labels(&self, names: &LabelConfig) -> Option<TunnelLabels> {
        let hostname = self.label(&names.hostname)?;
        let port = self.label(&names.port)?;
        Some(TunnelLabels {
            hostname: hostname.to_string(),
            port: port.to_string(),
            certificate: self.label(&names.certificate).map(str::to_string),
        })
    }

    fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Abbreviate a runtime id to its first twelve characters.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(labels: &[(&str, &str)]) -> ContainerDescriptor {
        ContainerDescriptor::new(
            "f56540dbf360a1b2c3d4",
            "app1",
            labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn requires_both_labels() {
        let names = LabelConfig::default();

        assert!(descriptor(&[]).tunnel_labels(&names).is_none());
        assert!(
            descriptor(&[("hera.hostname", "site.tld")])
                .tunnel_labels(&names)
                .is_none()
        );
        assert!(
            descriptor(&[("hera.port", "80")])
                .tunnel_labels(&names)
                .is_none()
        );

        let labels = descriptor(&[("hera.hostname", "site.tld"), ("hera.port", "80")])
            .tunnel_labels(&names);
        assert_eq!(
            labels,
            Some(TunnelLabels {
                hostname: "site.tld".to_string(),
                port: "80".to_string(),
                certificate: None,
            })
        );
    }

    #[test]
    fn blank_label_counts_as_missing() {
        let names = LabelConfig::default();
        let d = descriptor(&[("hera.hostname", "  "), ("hera.port", "80")]);
        assert!(d.tunnel_labels(&names).is_none());
    }

    #[test]
    fn picks_up_certificate_override() {
        let names = LabelConfig::default();
        let d = descriptor(&[
            ("hera.hostname", "site.tld"),
            ("hera.port", "80"),
            ("hera.certificate", "custom.pem"),
        ]);
        let labels = d.tunnel_labels(&names);
        assert_eq!(
            labels.and_then(|l| l.certificate).as_deref(),
            Some("custom.pem")
        );
    }

    #[test]
    fn honours_custom_label_names() {
        let names = LabelConfig {
            hostname: "tunnel.host".to_string(),
            port: "tunnel.port".to_string(),
            certificate: "tunnel.cert".to_string(),
        };
        let d = descriptor(&[("tunnel.host", "site.tld"), ("tunnel.port", "8080")]);
        assert!(d.tunnel_labels(&names).is_some());
        assert!(d.tunnel_labels(&LabelConfig::default()).is_none());
    }

    #[test]
    fn short_id_truncates() {
        assert_eq!(descriptor(&[]).short_id(), "f56540dbf360");
        assert_eq!(short_id("abc"), "abc");
    }
}
