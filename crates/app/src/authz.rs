//! Authorization guards, checked before any command is dispatched.

use storefront_auth::{Permission, Principal, authorize, authorize_owner};
use storefront_core::UserId;

use crate::errors::AppError;
use crate::services::Storefront;

impl Storefront {
    pub(crate) fn require(&self, principal: &Principal, permission: &Permission) -> Result<(), AppError> {
        let roles = self
            .roles
            .read()
            .map_err(|_| AppError::Internal("role registry lock poisoned".into()))?;
        authorize(principal, &roles, permission).map_err(|e| {
            tracing::debug!(user_id = %principal.user_id, %permission, "denied");
            AppError::from(e)
        })
    }

    /// The owner passes; anyone else needs `override_permission`.
    pub(crate) fn require_owner(
        &self,
        principal: &Principal,
        owner: UserId,
        override_permission: &Permission,
    ) -> Result<(), AppError> {
        let roles = self
            .roles
            .read()
            .map_err(|_| AppError::Internal("role registry lock poisoned".into()))?;
        Ok(authorize_owner(principal, &roles, owner, override_permission)?)
    }
}
