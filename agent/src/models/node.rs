//! Overlay network node model

use serde::{Deserialize, Serialize};

/// A node joined to the private overlay network.
///
/// Nodes are created by onboarding and never mutated.
// TODO: node removal should return the freed IP to the pool; the allocator
// already derives the free list from the node set, so removal only needs a
// delete-and-persist operation here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnNode {
    /// Unique node name
    pub name: String,

    /// Unique private IP inside the overlay subnet
    pub ip: String,
}
