//! # repsol-sync - Repsol Luz y Gas account synchronization core
//!
//! Keeps a typed, cached view of a Repsol Luz y Gas customer account
//! (contracts, consumption, invoices, virtual battery) for a home-automation
//! host, on top of the provider's private web API.
//!
//! ## Architecture
//!
//! - `auth`: login lifecycle and per-request signature headers
//! - `api`: one bounded HTTP attempt per upstream resource
//! - `normalize`: raw payloads into the canonical `model`
//! - `classify`: failures into the four outward error kinds
//! - `coordinator`: single-flight refresh cycle, snapshot cache, scheduler
//! - `setup`: credential validation for the setup flow
//! - `config`, `logging`, `error`: ambient plumbing

pub mod api;
pub mod auth;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod setup;

// Re-export commonly used types
pub use api::{AccountApi, ApiClient, HttpAccountApi};
pub use auth::AuthSession;
pub use classify::{ErrorKind, Operation, classify};
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorState, RefreshError, RefreshEvent, Scheduler};
pub use error::{Result, SyncError};
pub use model::{ContractBundle, Credentials};
