//! `storefront-core`: domain building blocks shared by every storefront module.
//!
//! Pure domain primitives only: identifiers, money, the aggregate contract and
//! the domain error model. Nothing in here performs IO.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod validate;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use money::{Discount, Money};
