use std::fmt;

/// Default root under which all voldock records live
pub const DEFAULT_PREFIX: &str = "/voldock";

/// Key encoder for the store's logical layout:
///
/// - `{prefix}/global-config`
/// - `{prefix}/policies/{policy}`
/// - `{prefix}/volumes/{tenant}/{volume}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEncoder {
    prefix: String,
}

impl Default for KeyEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeyEncoder {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the global configuration record
    pub fn global_key(&self) -> String {
        format!("{}/global-config", self.prefix)
    }

    /// Container prefix for all policies
    pub fn policies_prefix(&self) -> String {
        format!("{}/policies/", self.prefix)
    }

    /// Key of a single policy
    pub fn policy_key(&self, name: &str) -> String {
        format!("{}{}", self.policies_prefix(), name)
    }

    /// Container prefix for a tenant's volumes
    pub fn volumes_prefix(&self, tenant: &str) -> String {
        format!("{}/volumes/{}/", self.prefix, tenant)
    }

    /// Key of a single volume
    pub fn volume_key(&self, tenant: &str, volume: &str) -> String {
        format!("{}{}", self.volumes_prefix(tenant), volume)
    }

    /// Strip a container prefix from a key, returning the child name.
    ///
    /// Returns `None` for keys outside the container or nested deeper
    /// than one level.
    pub fn child_name<'a>(container: &str, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(container)?;
        if rest.is_empty() || rest.contains('/') {
            return None;
        }
        Some(rest)
    }
}

/// Record kinds stored under the key layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Global,
    Policy,
    Volume,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Global => "global-config",
            RecordKind::Policy => "policy",
            RecordKind::Volume => "volume",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keys() {
        let enc = KeyEncoder::default();
        assert_eq!(enc.global_key(), "/voldock/global-config");
        assert_eq!(enc.policy_key("basic"), "/voldock/policies/basic");
        assert_eq!(enc.volume_key("basic", "data"), "/voldock/volumes/basic/data");
        assert_eq!(enc.volumes_prefix("basic"), "/voldock/volumes/basic/");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let enc = KeyEncoder::new("/custom/");
        assert_eq!(enc.policy_key("p"), "/custom/policies/p");
    }

    #[test]
    fn test_child_name() {
        let enc = KeyEncoder::default();
        let container = enc.policies_prefix();
        assert_eq!(
            KeyEncoder::child_name(&container, "/voldock/policies/basic"),
            Some("basic")
        );
        assert_eq!(KeyEncoder::child_name(&container, "/voldock/policies/"), None);
        assert_eq!(
            KeyEncoder::child_name(&container, "/voldock/volumes/basic/data"),
            None
        );
    }

    #[test]
    fn test_tenant_prefixes_do_not_overlap() {
        let enc = KeyEncoder::default();
        let key = enc.volume_key("ab", "x");
        assert!(!key.starts_with(&enc.volumes_prefix("a")));
    }
}
