//! Carpark Store - Persistence layer
//!
//! Repository traits over the four engine entities (slots, sessions,
//! transactions, subscriptions) plus two implementations: a SQLx Postgres
//! backend and a dashmap in-memory backend for tests and embedded use.
//!
//! Every mutation that the engine relies on for correctness is exposed as an
//! atomic conditional operation (claim-first-available, transition-if-pending,
//! insert-if-absent) so no caller ever does read-then-write against shared
//! state.
//!
//! # Example
//!
//! ```rust,ignore
//! use carpark_store::{create_pool, PgStore};
//!
//! let pool = create_pool("postgres://localhost/carpark").await?;
//! let store = PgStore::new(pool);
//! let slot = store.slots.find_by_id(&"C001".into()).await?;
//! ```

pub mod error;
pub mod mem;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{StoreError, StoreResult};
pub use mem::MemStore;
pub use models::*;
pub use pg::PgStore;
pub use pool::{create_pool, DbPool};
pub use repo::*;
