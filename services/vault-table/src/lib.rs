//! Async side of Time Vault: the shared [`Session`], round handles with their
//! bonus vault probe, the round scheduler and the axum transport.

pub mod api;
pub mod audit;
pub mod balance;
pub mod config;
pub mod events;
pub mod round;
pub mod scheduler;
pub mod session;

pub use api::Api;
pub use audit::{AuditSink, JsonlAuditLog};
pub use config::VaultTableConfig;
pub use round::{Round, RoundError};
pub use scheduler::SchedulerConfig;
pub use session::{Session, SessionError};
