use crate::util::error::SerializationError;
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("membership update for group {update} received by group {local}")]
    GroupMismatch { local: u32, update: u32 },
    #[error("topology of group {group} changed: local={local} update={update}")]
    TopologyMismatch {
        group: u32,
        local: String,
        update: String,
    },
    #[error("position {position} is not a member of group {group}")]
    PositionMissing { group: u32, position: u32 },
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Address of one replica: the group it serves, the group generation the
/// sender believes in, and the replica's slot inside the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub group_id: u32,
    pub generation: u32,
    pub position: u32,
}

impl NodeIdentity {
    pub fn same_replica(&self, other: &NodeIdentity) -> bool {
        self.group_id == other.group_id && self.position == other.position
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}:{}]", self.group_id, self.generation, self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSlot {
    pub position: u32,
    pub node_id: u32,
    pub disk_id: u32,
}

/// A generation-stamped picture of the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipView {
    pub group_id: u32,
    pub generation: u32,
    pub members: Vec<MemberSlot>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl MembershipView {
    /// Digest of the group layout, independent of generation and member
    /// order.
    pub fn topology_digest(&self) -> Result<String, MembershipError> {
        let mut entries = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let payload = serde_json::json!({
                "group": self.group_id,
                "position": member.position,
                "node": member.node_id,
                "disk": member.disk_id,
            });
            entries.push(serde_json::to_string(&payload).map_err(SerializationError::from)?);
        }
        if entries.is_empty() {
            return Ok("0x0".into());
        }
        entries.sort();
        Ok(format!(
            "0x{}",
            hex::encode(Sha256::digest(entries.join("|").as_bytes()))
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCheck {
    Match,
    /// Same replica, different generation.
    GenerationMismatch { local: u32, requested: u32 },
    Foreign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Applied { previous: u32, current: u32 },
    Stale { local: u32, offered: u32 },
}

/// This node's view of its own group.
#[derive(Debug, Clone)]
pub struct Membership {
    identity: NodeIdentity,
    view: MembershipView,
    digest: String,
}

impl Membership {
    pub fn new(position: u32, view: MembershipView) -> Result<Self, MembershipError> {
        if !view.members.iter().any(|member| member.position == position) {
            return Err(MembershipError::PositionMissing {
                group: view.group_id,
                position,
            });
        }
        let digest = view.topology_digest()?;
        Ok(Self {
            identity: NodeIdentity {
                group_id: view.group_id,
                generation: view.generation,
                position,
            },
            view,
            digest,
        })
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    pub fn view(&self) -> &MembershipView {
        &self.view
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn check_target(&self, target: &NodeIdentity) -> TargetCheck {
        if !self.identity.same_replica(target) {
            TargetCheck::Foreign
        } else if self.identity.generation != target.generation {
            TargetCheck::GenerationMismatch {
                local: self.identity.generation,
                requested: target.generation,
            }
        } else {
            TargetCheck::Match
        }
    }

    /// Whether a request from `scope` may touch this replica.
    pub fn permits(&self, scope: Option<&str>, allow_unscoped: bool) -> bool {
        match (self.view.scope.as_deref(), scope) {
            (None, _) => true,
            (Some(_), None) => allow_unscoped,
            (Some(expected), Some(actual)) => expected == actual,
        }
    }

    /// Adopts `view` when it is newer. A foreign group or a changed layout
    /// means the caller and this node disagree about the world and is an
    /// error the node cannot recover from.
    pub fn apply(&mut self, view: &MembershipView) -> Result<MembershipChange, MembershipError> {
        if view.group_id != self.identity.group_id {
            return Err(MembershipError::GroupMismatch {
                local: self.identity.group_id,
                update: view.group_id,
            });
        }
        let digest = view.topology_digest()?;
        if digest != self.digest {
            return Err(MembershipError::TopologyMismatch {
                group: view.group_id,
                local: self.digest.clone(),
                update: digest,
            });
        }
        if view.generation <= self.identity.generation {
            return Ok(MembershipChange::Stale {
                local: self.identity.generation,
                offered: view.generation,
            });
        }
        let previous = self.identity.generation;
        self.identity.generation = view.generation;
        self.view = view.clone();
        info!(
            "event=membership_applied group={} previous_generation={} generation={} digest={}",
            view.group_id, previous, view.generation, self.digest
        );
        Ok(MembershipChange::Applied {
            previous,
            current: view.generation,
        })
    }
}
