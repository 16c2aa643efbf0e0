use thiserror::Error;

use storefront_core::UserId;

use crate::{Permission, Principal, RoleRegistry};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: resource belongs to another user")]
    NotOwner,

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// Authorize a principal for a single permission.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(
    principal: &Principal,
    registry: &RoleRegistry,
    required: &Permission,
) -> Result<(), AuthzError> {
    let perms = registry.effective_permissions(principal)?;

    if perms.contains(&Permission::WILDCARD) || perms.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Allow the owner of a resource, or anyone holding `override_permission`.
pub fn authorize_owner(
    principal: &Principal,
    registry: &RoleRegistry,
    owner: UserId,
    override_permission: &Permission,
) -> Result<(), AuthzError> {
    if principal.user_id == owner {
        return Ok(());
    }
    match authorize(principal, registry, override_permission) {
        Ok(()) => Ok(()),
        Err(AuthzError::Forbidden(_)) => Err(AuthzError::NotOwner),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppRole;

    fn registry() -> RoleRegistry {
        let mut registry = RoleRegistry::new();
        registry.ensure_defaults();
        registry
    }

    #[test]
    fn admin_wildcard_grants_everything() {
        let admin = Principal::new(UserId::new(), [AppRole::Admin.role()]);
        assert!(authorize(&admin, &registry(), &Permission::CATEGORIES_MANAGE).is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let user = Principal::new(UserId::new(), [AppRole::User.role()]);
        assert_eq!(
            authorize(&user, &registry(), &Permission::CATEGORIES_MANAGE).unwrap_err(),
            AuthzError::Forbidden("catalog.categories.manage".to_string())
        );
    }

    #[test]
    fn owner_passes_without_override() {
        let user = Principal::new(UserId::new(), [AppRole::User.role()]);
        assert!(authorize_owner(&user, &registry(), user.user_id, &Permission::CARTS_ANY).is_ok());
    }

    #[test]
    fn stranger_is_not_owner_unless_admin() {
        let registry = registry();
        let owner = UserId::new();
        let stranger = Principal::new(UserId::new(), [AppRole::User.role()]);
        let admin = Principal::new(UserId::new(), [AppRole::Admin.role()]);

        assert_eq!(
            authorize_owner(&stranger, &registry, owner, &Permission::CARTS_ANY).unwrap_err(),
            AuthzError::NotOwner
        );
        assert!(authorize_owner(&admin, &registry, owner, &Permission::CARTS_ANY).is_ok());
    }
}
