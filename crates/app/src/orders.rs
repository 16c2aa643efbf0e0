//! Order placement: cart to order, reserving stock along the way.

use chrono::Utc;

use storefront_auth::{Permission, Principal};
use storefront_cart::{Cart, CartCommand, CartId, CartLine, CheckOut, RestoreLines};
use storefront_catalog::{Product, ProductCommand, ReleaseStock, ReserveStock};
use storefront_core::{AggregateId, AggregateRoot};
use storefront_infra::projections::OrderReadModel;
use storefront_orders::{Address, AddressId, Order, OrderCommand, OrderId, OrderLine, Payment, PlaceOrder};

use crate::errors::AppError;
use crate::services::Storefront;

impl Storefront {
    /// Turn the principal's cart into an order.
    ///
    /// The cart is checked out first, against the exact version that was
    /// read, so two placements from one cart cannot both go through. Stock
    /// is then reserved line by line. If a reservation or the order itself
    /// fails, everything reserved so far is released and the lines go back
    /// into the cart before the error is returned.
    pub fn place_order(
        &self,
        principal: &Principal,
        address_id: AddressId,
        payment: Payment,
    ) -> Result<Order, AppError> {
        self.require(principal, &Permission::ORDERS_PLACE)?;

        let cart = self.load_own_cart(principal)?;
        let cart_id = cart.id_typed();
        if cart.is_empty() {
            return Err(AppError::InvalidState("cannot place an order from an empty cart".into()));
        }

        let address = self.load::<Address>(address_id.0)?;
        if !address.is_live() || address.owner() != Some(principal.user_id) {
            return Err(AppError::not_found(format!("address {address_id}")));
        }
        payment.validate()?;

        let order_id = OrderId::new(AggregateId::new());
        let lines: Vec<OrderLine> = cart
            .lines()
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                discount: line.discount,
                unit_price: line.unit_price,
            })
            .collect();

        self.execute_at::<Cart>(
            cart_id.0,
            cart.version(),
            CartCommand::CheckOut(CheckOut {
                cart_id,
                order_id: order_id.0,
                occurred_at: Utc::now(),
            }),
        )?;

        let mut reserved: Vec<&OrderLine> = Vec::with_capacity(lines.len());
        for line in &lines {
            let reservation = self.execute::<Product>(
                line.product_id.0,
                ProductCommand::ReserveStock(ReserveStock {
                    product_id: line.product_id,
                    order_id: order_id.0,
                    quantity: line.quantity,
                    occurred_at: Utc::now(),
                }),
            );
            if let Err(e) = reservation {
                self.release_reserved(order_id, &reserved);
                self.restore_cart(cart_id, order_id, cart.lines());
                return Err(e);
            }
            reserved.push(line);
        }

        let placed = self.execute::<Order>(
            order_id.0,
            OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                owner: principal.user_id,
                address_id,
                lines: lines.clone(),
                payment,
                occurred_at: Utc::now(),
            }),
        );
        let order = match placed {
            Ok(order) => order,
            Err(e) => {
                self.release_reserved(order_id, &reserved);
                self.restore_cart(cart_id, order_id, cart.lines());
                return Err(e);
            }
        };

        tracing::info!(
            %order_id,
            %cart_id,
            lines = order.lines().len(),
            total = %order.total(),
            "order placed"
        );
        Ok(order)
    }

    fn release_reserved(&self, order_id: OrderId, reserved: &[&OrderLine]) {
        for line in reserved.iter().rev() {
            let released = self.execute::<Product>(
                line.product_id.0,
                ProductCommand::ReleaseStock(ReleaseStock {
                    product_id: line.product_id,
                    order_id: order_id.0,
                    quantity: line.quantity,
                    occurred_at: Utc::now(),
                }),
            );
            match released {
                Ok(_) => tracing::warn!(
                    %order_id,
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    "reservation released after failed order"
                ),
                Err(e) => tracing::error!(
                    %order_id,
                    product_id = %line.product_id,
                    error = %e,
                    "failed to release reservation"
                ),
            }
        }
    }

    fn restore_cart(&self, cart_id: CartId, order_id: OrderId, lines: &[CartLine]) {
        let restored = self.execute::<Cart>(
            cart_id.0,
            CartCommand::RestoreLines(RestoreLines {
                cart_id,
                order_id: order_id.0,
                lines: lines.to_vec(),
                occurred_at: Utc::now(),
            }),
        );
        match restored {
            Ok(cart) => tracing::warn!(
                %order_id,
                %cart_id,
                lines = cart.lines().len(),
                "cart restored after failed order"
            ),
            Err(e) => tracing::error!(%order_id, %cart_id, error = %e, "failed to restore cart"),
        }
    }

    pub fn my_orders(&self, principal: &Principal) -> Result<Vec<OrderReadModel>, AppError> {
        self.require(principal, &Permission::ORDERS_PLACE)?;
        Ok(self.orders.by_owner(principal.user_id))
    }

    pub fn order(&self, principal: &Principal, order_id: OrderId) -> Result<OrderReadModel, AppError> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::not_found(format!("order {order_id}")))?;
        self.require_owner(principal, order.owner, &Permission::ORDERS_ANY)?;
        Ok(order)
    }
}
