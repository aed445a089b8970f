//! Structured logging functions for directory audit events

use tracing::{info, warn};

/// Log a session bound to its target host
pub fn log_session_resolved(identity: &str, host_id: i64, target: &str) {
    info!(
        identity = %identity,
        host_id = host_id,
        target = %target,
        "Session resolved to target host"
    );
}

/// Log a session refused because no target matched
pub fn log_session_refused(identity: &str, reason: &str) {
    warn!(
        identity = %identity,
        reason = %reason,
        "Session target resolution refused"
    );
}

/// Log a membership written to a group
pub fn log_membership_added(group: &str, member_kind: &str, member: &str) {
    info!(
        group = %group,
        member_kind = %member_kind,
        member = %member,
        "Group membership added"
    );
}

/// Log a host whose credential reference no longer resolves
pub fn log_dangling_credential(host: &str, key_id: i64) {
    warn!(
        host = %host,
        key_id = key_id,
        "Host references a key that no longer exists"
    );
}
