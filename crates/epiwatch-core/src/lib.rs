//! # EpiWatch
//!
//! Disease-outbreak alerting service.
//!
//! EpiWatch ingests outbreak reports from hospitals, derives stakeholder
//! alerts from severe ones, fans the alerts out to role-based cohorts, and
//! pushes them live to connected users over WebSocket.
//!
//! ## Architecture
//!
//! - **Models**: Outbreaks, alerts with an embedded read-state ledger,
//!   notifications, and role projections
//! - **Alerting**: Severity-gated alert derivation plus the notification
//!   fan-out pipeline
//! - **Realtime**: Presence registry and live push channel
//! - **Storage**: PostgreSQL for outbreaks, alerts, the ledger, and
//!   notifications
//! - **API**: REST API behind an authenticating gateway
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply migrations, then start the service
//! epiwatch db migrate
//! epiwatch serve
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod realtime;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::FanoutService;
    pub use crate::api::{AppState, AuthContext};
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::realtime::PresenceRegistry;
}
