use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque dotted strings (e.g. "cart.manage"). The wildcard
/// `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const CATALOG_READ: Permission = Permission(Cow::Borrowed("catalog.read"));
    pub const CATEGORIES_MANAGE: Permission = Permission(Cow::Borrowed("catalog.categories.manage"));
    pub const PRODUCTS_MANAGE: Permission = Permission(Cow::Borrowed("catalog.products.manage"));
    /// Edit products listed by another seller.
    pub const PRODUCTS_ANY: Permission = Permission(Cow::Borrowed("catalog.products.any"));
    pub const CART_MANAGE: Permission = Permission(Cow::Borrowed("cart.manage"));
    /// Read or act on carts owned by someone else.
    pub const CARTS_ANY: Permission = Permission(Cow::Borrowed("cart.any"));
    pub const ORDERS_PLACE: Permission = Permission(Cow::Borrowed("orders.place"));
    pub const ADDRESSES_MANAGE: Permission = Permission(Cow::Borrowed("orders.addresses.manage"));
    /// Read or act on addresses and orders owned by someone else.
    pub const ORDERS_ANY: Permission = Permission(Cow::Borrowed("orders.any"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
