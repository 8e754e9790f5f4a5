use crate::error::{ConvoyError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ImageRef / ServiceSpec / IngressSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngressSpec {
    pub host: String,
    #[serde(default = "default_ingress_path")]
    pub path: String,
}

fn default_ingress_path() -> String {
    "/".to_string()
}

// ---------------------------------------------------------------------------
// UnitManifest
// ---------------------------------------------------------------------------

/// Declarative deployment manifest for one deployable unit, in chart-values
/// shape: `image.repository`, `image.tag`, `replicaCount`, `service.port`,
/// `ingress.host`, `ingress.path`. The tag field is the sole field the
/// build executor mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnitManifest {
    pub image: ImageRef,
    #[serde(default = "default_replica_count")]
    pub replica_count: u32,
    pub service: ServiceSpec,
    pub ingress: IngressSpec,
}

fn default_replica_count() -> u32 {
    1
}

impl UnitManifest {
    pub fn new(
        repository: impl Into<String>,
        tag: impl Into<String>,
        port: u16,
        host: impl Into<String>,
    ) -> Self {
        Self {
            image: ImageRef {
                repository: repository.into(),
                tag: tag.into(),
            },
            replica_count: default_replica_count(),
            service: ServiceSpec { port },
            ingress: IngressSpec {
                host: host.into(),
                path: default_ingress_path(),
            },
        }
    }

    /// Return a copy with `image.tag` substituted. Everything else is
    /// carried over verbatim so a build never clobbers operator edits to
    /// replicas or exposure.
    pub fn with_image_tag(&self, tag: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.image.tag = tag.into();
        next
    }

    pub fn validate(&self, unit: &str) -> Result<()> {
        let fail = |reason: &str| {
            Err(ConvoyError::InvalidManifest {
                unit: unit.to_string(),
                reason: reason.to_string(),
            })
        };
        if self.image.repository.trim().is_empty() {
            return fail("image.repository must not be empty");
        }
        if self.replica_count == 0 {
            return fail("replicaCount must be at least 1");
        }
        if self.service.port == 0 {
            return fail("service.port must not be 0");
        }
        if self.ingress.host.trim().is_empty() {
            return fail("ingress.host must not be empty");
        }
        if !self.ingress.path.starts_with('/') {
            return fail("ingress.path must start with '/'");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> UnitManifest {
        UnitManifest::new("registry.example.com/quote-app", "v1", 5000, "quotes.example.com")
    }

    #[test]
    fn yaml_matches_chart_values_shape() {
        let yaml = serde_yaml::to_string(&manifest()).unwrap();
        assert!(yaml.contains("replicaCount: 1"));
        assert!(yaml.contains("repository: registry.example.com/quote-app"));
        assert!(yaml.contains("tag: v1"));
        assert!(yaml.contains("port: 5000"));
        assert!(yaml.contains("host: quotes.example.com"));
        assert!(yaml.contains("path: /"));
    }

    #[test]
    fn parses_chart_values_document() {
        let yaml = "\
image:
  repository: registry.example.com/quote-app
  tag: abc123
replicaCount: 3
service:
  port: 5000
ingress:
  host: quotes.example.com
  path: /
";
        let m: UnitManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(m.image.tag, "abc123");
        assert_eq!(m.replica_count, 3);
        assert_eq!(m.service.port, 5000);
    }

    #[test]
    fn replica_count_defaults_to_one() {
        let yaml = "\
image:
  repository: r
  tag: t
service:
  port: 80
ingress:
  host: h.example.com
";
        let m: UnitManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(m.replica_count, 1);
        assert_eq!(m.ingress.path, "/");
    }

    #[test]
    fn with_image_tag_only_touches_tag() {
        let mut m = manifest();
        m.replica_count = 4;
        let next = m.with_image_tag("abc123");
        assert_eq!(next.image.tag, "abc123");
        assert_eq!(next.replica_count, 4);
        assert_eq!(next.image.repository, m.image.repository);
        assert_eq!(next.ingress, m.ingress);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut m = manifest();
        m.replica_count = 0;
        assert!(m.validate("quote-app").is_err());

        let mut m = manifest();
        m.ingress.path = "no-slash".to_string();
        assert!(m.validate("quote-app").is_err());

        let mut m = manifest();
        m.service.port = 0;
        assert!(m.validate("quote-app").is_err());

        assert!(manifest().validate("quote-app").is_ok());
    }

    #[test]
    fn unknown_fields_rejected() {
        let yaml = "\
image:
  repository: r
  tag: t
replicacount: 2
service:
  port: 80
ingress:
  host: h
";
        assert!(serde_yaml::from_str::<UnitManifest>(yaml).is_err());
    }
}
