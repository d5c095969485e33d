//! Resource kinds.

use crate::core::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Root of a resource tree; the only kind that heartbeats.
    Node,
    Device,
    Source,
    Flow,
    Sender,
    Receiver,
}

impl ResourceKind {
    /// Every kind, root first.
    pub const ALL: [ResourceKind; 6] = [
        Self::Node,
        Self::Device,
        Self::Source,
        Self::Flow,
        Self::Sender,
        Self::Receiver,
    ];

    /// Singular lowercase name, as stored in `resource_type` metadata.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Device => "device",
            Self::Source => "source",
            Self::Flow => "flow",
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }

    /// Body field other resources use to reference one of this kind.
    pub const fn reference_field(self) -> &'static str {
        match self {
            Self::Node => "node_id",
            Self::Device => "device_id",
            Self::Source => "source_id",
            Self::Flow => "flow_id",
            Self::Sender => "sender_id",
            Self::Receiver => "receiver_id",
        }
    }

    /// Check if this kind is the root of a tree.
    pub const fn is_root(self) -> bool {
        matches!(self, Self::Node)
    }

    /// Parse a kind from an API path segment.
    ///
    /// Accepts both the singular and the plural collection name
    /// (`"device"` and `"devices"`).
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        let singular = segment.strip_suffix('s').unwrap_or(segment);
        Self::ALL.into_iter().find(|kind| kind.as_str() == singular)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path_segment(s)
            .ok_or_else(|| RegistryError::invalid(format!("unknown resource type: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_singular_and_plural() {
        assert_eq!("node".parse::<ResourceKind>().unwrap(), ResourceKind::Node);
        assert_eq!(
            ResourceKind::from_path_segment("receivers"),
            Some(ResourceKind::Receiver)
        );
        assert_eq!(
            ResourceKind::from_path_segment("sources"),
            Some(ResourceKind::Source)
        );
        assert!("widgets".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn reference_fields_follow_kind_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.reference_field(), format!("{}_id", kind));
        }
    }
}
