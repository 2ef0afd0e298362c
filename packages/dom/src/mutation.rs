//! Mutation journal
//!
//! The document reports mutations of its *connected* tree (everything below
//! [`Document::body`](crate::Document::body)), the way a `MutationObserver`
//! on the body would. Building detached subtrees (parsing, cloning,
//! updating a template instance before it is attached) is not observable.

use crate::node::NodeId;
use serde::Serialize;
use std::ops::Sub;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData {
        target: NodeId,
    },
    Attribute {
        target: NodeId,
        name: String,
    },
    Property {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::CharacterData { target }
            | MutationRecord::Attribute { target, .. }
            | MutationRecord::Property { target, .. } => *target,
        }
    }
}

/// Running counters; `created` and `discarded` count every node, the others
/// only connected mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationStats {
    pub created: u64,
    pub discarded: u64,
    pub inserted: u64,
    pub removed: u64,
    pub text_writes: u64,
    pub attribute_writes: u64,
    pub property_writes: u64,
}

impl MutationStats {
    /// Number of connected writes of any kind
    pub fn writes(&self) -> u64 {
        self.inserted + self.removed + self.text_writes + self.attribute_writes + self.property_writes
    }
}

impl Sub for MutationStats {
    type Output = MutationStats;

    fn sub(self, earlier: MutationStats) -> MutationStats {
        MutationStats {
            created: self.created - earlier.created,
            discarded: self.discarded - earlier.discarded,
            inserted: self.inserted - earlier.inserted,
            removed: self.removed - earlier.removed,
            text_writes: self.text_writes - earlier.text_writes,
            attribute_writes: self.attribute_writes - earlier.attribute_writes,
            property_writes: self.property_writes - earlier.property_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_delta() {
        let before = MutationStats {
            created: 2,
            inserted: 1,
            ..Default::default()
        };
        let after = MutationStats {
            created: 5,
            inserted: 1,
            text_writes: 3,
            ..Default::default()
        };

        let delta = after - before;
        assert_eq!(delta.created, 3);
        assert_eq!(delta.inserted, 0);
        assert_eq!(delta.writes(), 3);
    }

    #[test]
    fn test_record_serializes_tagged() {
        let record = MutationRecord::CharacterData {
            target: NodeId::new(1, 0),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "characterData");
    }
}
