//! Conversation session tracking for monkai-trace.
//!
//! Maps an end-user identity to a session id that stays stable while the
//! user keeps interacting and rolls over after a period of inactivity.
//! Two managers are provided: an in-process one and a two-tier one that
//! consults a server-side authority before falling back to local state.

pub mod clock;
pub mod lifecycle;
pub mod manager;
pub mod resolver;
pub mod session_id;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::{ResetReason, Resolution, SessionLifecycle};
pub use manager::{spawn_sweeper, PersistentSessionManager, SessionManager, SessionSource};
pub use resolver::{RemoteSessionResolver, ResolvedSession, SessionLookup};
pub use session_id::{creation_timestamp, mint_session_id};
pub use store::{SessionEntry, SessionInfo, SessionStore};
