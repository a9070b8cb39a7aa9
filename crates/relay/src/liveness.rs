use chrono::{DateTime, Duration, Utc};

/// How long a heartbeat keeps a student counted as connected.
pub const HEARTBEAT_TTL: Duration = Duration::seconds(60);

/// The single definition of "connected": a heartbeat younger than
/// [`HEARTBEAT_TTL`] whose report said the terminal was connected.
/// Evaluated on read; nothing ages the state in the background.
pub fn is_connected(
    last_heartbeat: Option<DateTime<Utc>>,
    last_reported_connected: Option<bool>,
    now: DateTime<Utc>,
) -> bool {
    match (last_heartbeat, last_reported_connected) {
        (Some(beat), Some(true)) => now - beat < HEARTBEAT_TTL,
        _ => false,
    }
}
