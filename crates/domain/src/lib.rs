//! Domain layer for the order-fulfillment core.
//!
//! Orders, payments and shipments are aggregates: commands validate against
//! current state and return events, and state is only ever changed by
//! applying those events. [`CommandHandler`] persists the events through an
//! [`AggregateRepository`] with an optimistic version check.

pub mod aggregate;
pub mod command;
pub mod error;
pub mod note;
pub mod order;
pub mod payment;
pub mod repository;
pub mod shipment;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
pub use note::Note;
pub use repository::{AggregateRepository, RecordedEvent};
