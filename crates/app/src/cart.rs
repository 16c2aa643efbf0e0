//! Cart workflow: pricing snapshots and quantity bookkeeping for cart lines.

use chrono::Utc;

use storefront_auth::{Permission, Principal};
use storefront_cart::{
    AddItem, Cart, CartCommand, CartId, ChangeQuantity, CreateCart, RefreshPricing, RemoveItem,
};
use storefront_catalog::{Product, ProductId};
use storefront_infra::projections::CartReadModel;

use crate::errors::AppError;
use crate::services::Storefront;

/// Cart operations addressed by cart id.
///
/// Each call loads the current product, hands its snapshot to the cart and
/// returns the cart as committed. Authorization is the caller's job; the
/// principal-facing wrappers live on [`Storefront`].
#[derive(Debug, Clone, Copy)]
pub struct CartWorkflow<'a> {
    app: &'a Storefront,
}

impl<'a> CartWorkflow<'a> {
    pub fn new(app: &'a Storefront) -> Self {
        Self { app }
    }

    pub fn add_item(&self, cart_id: CartId, product_id: ProductId, quantity: u32) -> Result<Cart, AppError> {
        let product = self.live_product(product_id)?;
        let cart = self.app.execute::<Cart>(
            cart_id.0,
            CartCommand::AddItem(AddItem {
                cart_id,
                product: product.snapshot(),
                quantity,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%cart_id, %product_id, quantity, total = %cart.total(), "item added to cart");
        Ok(cart)
    }

    /// Adjust a line by `delta`; a result of zero removes the line.
    pub fn change_quantity(&self, cart_id: CartId, product_id: ProductId, delta: i64) -> Result<Cart, AppError> {
        let product = self.live_product(product_id)?;
        let cart = self.app.execute::<Cart>(
            cart_id.0,
            CartCommand::ChangeQuantity(ChangeQuantity {
                cart_id,
                product: product.snapshot(),
                delta,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%cart_id, %product_id, delta, total = %cart.total(), "cart quantity changed");
        Ok(cart)
    }

    pub fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> Result<Cart, AppError> {
        let cart = self.app.execute::<Cart>(
            cart_id.0,
            CartCommand::RemoveItem(RemoveItem {
                cart_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%cart_id, %product_id, total = %cart.total(), "item removed from cart");
        Ok(cart)
    }

    /// Re-snapshot a line's price and discount from the catalog.
    pub fn refresh_pricing(&self, cart_id: CartId, product_id: ProductId) -> Result<Cart, AppError> {
        let product = self.live_product(product_id)?;
        let cart = self.app.execute::<Cart>(
            cart_id.0,
            CartCommand::RefreshPricing(RefreshPricing {
                cart_id,
                product: product.snapshot(),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::debug!(%cart_id, %product_id, total = %cart.total(), "cart line repriced");
        Ok(cart)
    }

    fn live_product(&self, product_id: ProductId) -> Result<Product, AppError> {
        let product = self.app.load::<Product>(product_id.0)?;
        if !product.is_live() {
            return Err(AppError::not_found(format!("product {product_id}")));
        }
        Ok(product)
    }
}

impl Storefront {
    pub fn cart_workflow(&self) -> CartWorkflow<'_> {
        CartWorkflow::new(self)
    }

    /// The principal's cart id, creating the cart on first use.
    fn own_cart_id(&self, principal: &Principal) -> Result<CartId, AppError> {
        let cart_id = CartId::for_owner(principal.user_id);
        if self.carts.get(&cart_id).is_some() {
            return Ok(cart_id);
        }

        let created = self.execute::<Cart>(
            cart_id.0,
            CartCommand::CreateCart(CreateCart {
                cart_id,
                owner: principal.user_id,
                occurred_at: Utc::now(),
            }),
        );
        match created {
            Ok(_) => tracing::info!(%cart_id, user_id = %principal.user_id, "cart created"),
            // A racing call created it first.
            Err(AppError::Conflict(_) | AppError::Concurrency(_)) => {
                tracing::debug!(%cart_id, user_id = %principal.user_id, "cart already created")
            }
            Err(e) => return Err(e),
        }
        Ok(cart_id)
    }

    /// The principal's cart as stored, failing if it was never created.
    pub(crate) fn load_own_cart(&self, principal: &Principal) -> Result<Cart, AppError> {
        let cart_id = CartId::for_owner(principal.user_id);
        let cart = self.load::<Cart>(cart_id.0)?;
        if !cart.is_created() {
            return Err(AppError::not_found(format!("cart of user {}", principal.user_id)));
        }
        Ok(cart)
    }

    fn existing_own_cart_id(&self, principal: &Principal) -> Result<CartId, AppError> {
        Ok(self.load_own_cart(principal)?.id_typed())
    }

    pub fn add_to_my_cart(
        &self,
        principal: &Principal,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, AppError> {
        self.require(principal, &Permission::CART_MANAGE)?;
        let cart_id = self.own_cart_id(principal)?;
        self.cart_workflow().add_item(cart_id, product_id, quantity)
    }

    pub fn change_my_quantity(
        &self,
        principal: &Principal,
        product_id: ProductId,
        delta: i64,
    ) -> Result<Cart, AppError> {
        self.require(principal, &Permission::CART_MANAGE)?;
        let cart_id = self.existing_own_cart_id(principal)?;
        self.cart_workflow().change_quantity(cart_id, product_id, delta)
    }

    pub fn remove_from_my_cart(&self, principal: &Principal, product_id: ProductId) -> Result<Cart, AppError> {
        self.require(principal, &Permission::CART_MANAGE)?;
        let cart_id = self.existing_own_cart_id(principal)?;
        self.cart_workflow().remove_item(cart_id, product_id)
    }

    pub fn my_cart(&self, principal: &Principal) -> Result<CartReadModel, AppError> {
        self.require(principal, &Permission::CART_MANAGE)?;
        self.carts
            .find_by_owner(principal.user_id)
            .ok_or_else(|| AppError::not_found(format!("cart of user {}", principal.user_id)))
    }

    /// A cart by id, for its owner or a principal allowed to see any cart.
    pub fn cart(&self, principal: &Principal, cart_id: CartId) -> Result<CartReadModel, AppError> {
        let cart = self
            .carts
            .get(&cart_id)
            .ok_or_else(|| AppError::not_found(format!("cart {cart_id}")))?;
        self.require_owner(principal, cart.owner, &Permission::CARTS_ANY)?;
        Ok(cart)
    }

    pub fn all_carts(&self, principal: &Principal) -> Result<Vec<CartReadModel>, AppError> {
        self.require(principal, &Permission::CARTS_ANY)?;
        let mut carts = self.carts.list();
        carts.sort_by_key(|c| c.cart_id.0);
        Ok(carts)
    }
}
