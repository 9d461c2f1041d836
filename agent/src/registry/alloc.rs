//! Identifier allocation
//!
//! Two shapes of unique resource are allocated here: short opaque IDs drawn
//! from a random alphanumeric space large enough that collisions are
//! practically impossible, and private overlay IPs drawn from a pool of 253
//! addresses where collisions are expected once the pool fills up. Both
//! allocators are bounded and fail explicitly instead of retrying forever.

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::errors::AgentError;
use crate::models::node::VpnNode;

/// Length of generated project IDs
pub const PROJECT_ID_LEN: usize = 10;

/// Attempt bound for random-space allocation. The ID space makes even one
/// retry unlikely; the bound is a backstop against a broken `is_taken`.
const MAX_ID_ATTEMPTS: usize = 16;

/// Overlay subnet prefix for node IPs
pub const VPN_SUBNET_PREFIX: &str = "192.168.202.";

/// Lowest assignable host octet (.1 is the service node itself)
pub const VPN_HOST_MIN: u8 = 2;

/// Highest assignable host octet
pub const VPN_HOST_MAX: u8 = 254;

/// Generate a random fixed-length alphanumeric ID
pub fn short_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Draw candidates until one is free, bounded by `max_attempts`
pub fn allocate_unique(
    mut generate: impl FnMut() -> String,
    is_taken: impl Fn(&str) -> bool,
    max_attempts: usize,
) -> Result<String, AgentError> {
    for _ in 0..max_attempts {
        let candidate = generate();
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(AgentError::Allocation(format!(
        "No free identifier found after {} attempts",
        max_attempts
    )))
}

/// Allocate a fresh project ID not rejected by `is_taken`
pub fn allocate_project_id(is_taken: impl Fn(&str) -> bool) -> Result<String, AgentError> {
    allocate_unique(|| short_id(PROJECT_ID_LEN), is_taken, MAX_ID_ATTEMPTS)
}

/// Allocate a free private IP from the overlay pool.
///
/// Enumerates the free portion of the pool and picks one at random, so
/// allocation terminates even when the pool is nearly or fully exhausted.
pub fn allocate_private_ip(nodes: &[VpnNode]) -> Result<String, AgentError> {
    let free: Vec<String> = (VPN_HOST_MIN..=VPN_HOST_MAX)
        .map(|host| format!("{}{}", VPN_SUBNET_PREFIX, host))
        .filter(|candidate| !nodes.iter().any(|node| &node.ip == candidate))
        .collect();

    if free.is_empty() {
        return Err(AgentError::Allocation(format!(
            "The VPN address pool {}{}-{}{} is exhausted",
            VPN_SUBNET_PREFIX, VPN_HOST_MIN, VPN_SUBNET_PREFIX, VPN_HOST_MAX
        )));
    }

    let pick = rand::rng().random_range(0..free.len());
    Ok(free[pick].clone())
}
