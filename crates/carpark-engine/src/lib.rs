//! Carpark Engine - Parking session and billing logic
//!
//! Check-in/checkout over a slot inventory, flat casual fees, monthly
//! subscriptions with tiered duration discounts, an idempotent expiring
//! payment state machine, and a background maintenance sweeper. Persistence
//! goes through the `carpark-store` repository traits, so the engine runs
//! unchanged over Postgres or the in-memory store.

pub mod clock;
pub mod config;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod idgen;
pub mod service;
pub mod sessions;
pub mod slots;
pub mod subscriptions;
pub mod sweeper;
pub mod transactions;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, FeeSchedule};
pub use error::{EngineError, EngineResult};
pub use fees::FeeCalculator;
pub use gateway::{ApproveAllGateway, ChargeOutcome, NoopNotifier, Notifier, PaymentGateway};
pub use idgen::IdProvider;
pub use service::ParkingService;
pub use sessions::{CheckoutOutcome, SessionManager};
pub use slots::SlotRegistry;
pub use subscriptions::{RegisterSubscription, SubscriptionReceipt, SubscriptionService};
pub use sweeper::MaintenanceSweeper;
pub use transactions::{OpenTransaction, TransactionMachine};
