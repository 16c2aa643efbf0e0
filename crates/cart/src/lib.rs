//! Shopping cart domain module (event-sourced).
//!
//! Line items snapshot a product's special price and discount when they are
//! added, re-quantified or re-priced. The cart total is always the sum of the
//! line subtotals; it is computed, never stored.

pub mod cart;

pub use cart::{
    AddItem, Cart, CartCheckedOut, CartCommand, CartCreated, CartEvent, CartId, CartLine,
    ChangeQuantity, CheckOut, CreateCart, ItemAdded, ItemRemoved, LinesRestored, PricingRefreshed,
    QuantityChanged, RefreshPricing, RemoveItem, RestoreLines,
};
