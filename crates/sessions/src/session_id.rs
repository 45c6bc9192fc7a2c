//! Session id minting.
//!
//! Ids are derived, not random: `<namespace>-<user_id>-<YYYYMMDD-HHMMSS>`,
//! optionally followed by `-<n>` when a same-second predecessor exists.
//! They stay human-auditable and can be re-derived from the inputs.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Second-granularity creation timestamp embedded in every id.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Mint the id for a session created at `created_at`.  `seq` is the
/// 1-based same-second sequence number; the first session carries no suffix.
pub fn mint_session_id(
    namespace: &str,
    user_id: &str,
    created_at: DateTime<Utc>,
    seq: u32,
) -> String {
    let base = format!(
        "{namespace}-{user_id}-{}",
        created_at.format(TIMESTAMP_FORMAT)
    );
    if seq <= 1 {
        base
    } else {
        format!("{base}-{seq}")
    }
}

/// Recover the creation timestamp from an id minted for `namespace` and
/// `user_id`.  Returns `None` for ids minted elsewhere.
pub fn creation_timestamp(
    session_id: &str,
    namespace: &str,
    user_id: &str,
) -> Option<NaiveDateTime> {
    let prefix = format!("{namespace}-{user_id}-");
    let rest = session_id.strip_prefix(&prefix)?;
    // YYYYMMDD-HHMMSS is 15 chars; anything after is the sequence suffix.
    let stamp = rest.get(..15)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}
