//! Outbreak alerting pipeline
//!
//! Pure derivation policy plus the fan-out service that turns an alert into
//! durable notifications, ledger entries, and live pushes.

pub mod deriver;
mod fanout;

pub use deriver::{derive, AlertDraft};
pub use fanout::{push_resolution, resolve_cohort, FanoutService};
