//! Payment requests: storage, memo matching and the lifecycle engine.

pub mod engine;
pub mod matcher;
pub mod models;
pub mod store;

pub use engine::{CreateRequest, ProcessPayment, RequestEngine};
pub use models::{PaymentRequest, RequestStatus, SettlementResult};
pub use store::{InMemoryRequestStore, RequestStore};
