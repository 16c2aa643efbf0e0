use serde::{Deserialize, Serialize};

use storefront_core::{Discount, DomainError, DomainResult, Money};

use crate::product::ProductId;

/// Point-in-time view of a product's pricing and stock.
///
/// Carts and orders never read the catalog themselves; the application layer
/// loads the product and hands them one of these inside the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub discount: Discount,
    pub special_price: Money,
    pub available: u32,
}

impl ProductSnapshot {
    /// Fail with `InvalidState` unless `quantity` units can be taken from stock.
    pub fn ensure_available(&self, quantity: u32) -> DomainResult<()> {
        if self.available == 0 {
            return Err(DomainError::invalid_state(format!(
                "{} is out of stock",
                self.name
            )));
        }
        if self.available < quantity {
            return Err(DomainError::invalid_state(format!(
                "only {} of {} in stock",
                self.available, self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::AggregateId;

    fn snapshot(available: u32) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(AggregateId::new()),
            name: "Lamp".to_string(),
            price: Money::from_minor(10_000),
            discount: Discount::NONE,
            special_price: Money::from_minor(10_000),
            available,
        }
    }

    #[test]
    fn zero_stock_is_out_of_stock() {
        match snapshot(0).ensure_available(1).unwrap_err() {
            DomainError::InvalidState(msg) if msg.contains("out of stock") => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_stock_reports_what_is_left() {
        match snapshot(5).ensure_available(10).unwrap_err() {
            DomainError::InvalidState(msg) if msg.contains("only 5") => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(snapshot(5).ensure_available(5).is_ok());
    }
}
