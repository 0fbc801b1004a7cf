//! # Dialer
//!
//! The throttled dialing side of the engine: per-campaign execution state
//! ([`CampaignExecution`]) and call placement ([`CallDispatcher`]).
//!
//! Throttling is two separate gates that must both open before a dial:
//! the concurrency cap (in-flight calls per campaign) and the rate spacing
//! (minimum gap between consecutive dials, floored by the engine-wide
//! minimum). Contacts dial in FIFO order; retried contacts rejoin at the
//! back of the queue.

pub mod context;
pub mod placement;

pub use context::{CampaignExecution, QueuedContact};
pub use placement::{CallDispatcher, CallInitiator, PlacementError, PlacementRequest};
