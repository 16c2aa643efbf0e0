//! Orders domain module (event-sourced).
//!
//! Shipping addresses and placed orders. An order is an immutable record of
//! what a cart held at checkout time, plus the payment details reported by
//! the payment gateway.

pub mod address;
pub mod order;

pub use address::{
    Address, AddressCommand, AddressCreated, AddressDeleted, AddressDetails, AddressEvent,
    AddressId, AddressUpdated, CreateAddress, DeleteAddress, UpdateAddress,
};
pub use order::{
    Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderPlaced, OrderStatus, Payment,
    PlaceOrder,
};
