use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{AuthzError, Permission, Principal};

/// Role identifier used for RBAC (e.g. "ROLE_USER").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The roles every storefront deployment starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppRole {
    User,
    Seller,
    Admin,
}

impl AppRole {
    pub const ALL: [AppRole; 3] = [AppRole::User, AppRole::Seller, AppRole::Admin];

    pub fn role(self) -> Role {
        match self {
            AppRole::User => Role::new("ROLE_USER"),
            AppRole::Seller => Role::new("ROLE_SELLER"),
            AppRole::Admin => Role::new("ROLE_ADMIN"),
        }
    }

    pub fn default_permissions(self) -> Vec<Permission> {
        let shopper = [
            Permission::CATALOG_READ,
            Permission::CART_MANAGE,
            Permission::ORDERS_PLACE,
            Permission::ADDRESSES_MANAGE,
        ];
        match self {
            AppRole::User => shopper.to_vec(),
            AppRole::Seller => {
                let mut perms = shopper.to_vec();
                perms.push(Permission::PRODUCTS_MANAGE);
                perms
            }
            AppRole::Admin => vec![Permission::WILDCARD],
        }
    }
}

/// Role → permission mapping.
///
/// Starts empty. [`RoleRegistry::ensure_defaults`] seeds the [`AppRole`]s and
/// must run once at startup; roles that were never seeded or defined are
/// rejected instead of being created on first use.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<Role, Vec<Permission>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the default roles. Existing definitions are left untouched.
    ///
    /// Returns the roles that were newly added.
    pub fn ensure_defaults(&mut self) -> Vec<Role> {
        let mut seeded = Vec::new();
        for app_role in AppRole::ALL {
            let role = app_role.role();
            if self.roles.contains_key(&role) {
                continue;
            }
            tracing::info!(role = %role, "seeding default role");
            self.roles.insert(role.clone(), app_role.default_permissions());
            seeded.push(role);
        }
        seeded
    }

    /// Define (or redefine) a role.
    pub fn define(&mut self, role: Role, permissions: impl IntoIterator<Item = Permission>) {
        self.roles.insert(role, permissions.into_iter().collect());
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }

    pub fn permissions_for(&self, role: &Role) -> Result<&[Permission], AuthzError> {
        self.roles
            .get(role)
            .map(Vec::as_slice)
            .ok_or_else(|| AuthzError::UnknownRole(role.to_string()))
    }

    /// Union of the permissions granted by every role the principal holds.
    pub fn effective_permissions(
        &self,
        principal: &Principal,
    ) -> Result<HashSet<Permission>, AuthzError> {
        let mut effective = HashSet::new();
        for role in &principal.roles {
            effective.extend(self.permissions_for(role)?.iter().cloned());
        }
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::UserId;

    #[test]
    fn ensure_defaults_is_idempotent() {
        let mut registry = RoleRegistry::new();
        assert_eq!(registry.ensure_defaults().len(), 3);
        assert!(registry.ensure_defaults().is_empty());
        assert!(registry.contains(&AppRole::Seller.role()));
    }

    #[test]
    fn ensure_defaults_keeps_custom_definitions() {
        let mut registry = RoleRegistry::new();
        registry.define(AppRole::User.role(), [Permission::CATALOG_READ]);
        registry.ensure_defaults();

        assert_eq!(
            registry.permissions_for(&AppRole::User.role()).unwrap(),
            &[Permission::CATALOG_READ]
        );
    }

    #[test]
    fn unknown_role_is_an_error() {
        let registry = RoleRegistry::new();
        let principal = Principal::new(UserId::new(), [AppRole::User.role()]);
        assert_eq!(
            registry.effective_permissions(&principal).unwrap_err(),
            AuthzError::UnknownRole("ROLE_USER".to_string())
        );
    }

    #[test]
    fn seller_can_manage_products_but_user_cannot() {
        let mut registry = RoleRegistry::new();
        registry.ensure_defaults();

        let seller = Principal::new(UserId::new(), [AppRole::Seller.role()]);
        let user = Principal::new(UserId::new(), [AppRole::User.role()]);

        assert!(registry
            .effective_permissions(&seller)
            .unwrap()
            .contains(&Permission::PRODUCTS_MANAGE));
        assert!(!registry
            .effective_permissions(&user)
            .unwrap()
            .contains(&Permission::PRODUCTS_MANAGE));
    }
}
