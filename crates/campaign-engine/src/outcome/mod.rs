//! # Outcome Ingestion
//!
//! Consumes asynchronous call-status events from the call provider and
//! folds terminal outcomes back into campaign state: the call record, the
//! matching contact, and exactly one pairing of campaign counters.
//!
//! Ingestion is idempotent per call id: duplicate deliveries of a terminal
//! event are acknowledged but change nothing, because the store's terminal
//! latch admits only the first one.

pub mod classifier;
pub mod ingestion;

pub use classifier::{classify_outcome, CallOutcome, CallStatusEvent};
pub use ingestion::OutcomeIngestion;
