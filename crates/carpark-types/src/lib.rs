//! Carpark Types - Shared domain types
//!
//! This crate contains domain types used across the carpark engine:
//! - Identifiers for slots, vehicles, and transactions
//! - Slot, session, transaction, and subscription status enums
//! - Fee and subscription quote types

pub mod fees;
pub mod ids;
pub mod session;
pub mod slot;
pub mod subscription;
pub mod transaction;
pub mod vehicle;

pub use fees::*;
pub use ids::*;
pub use session::*;
pub use slot::*;
pub use subscription::*;
pub use transaction::*;
pub use vehicle::*;
