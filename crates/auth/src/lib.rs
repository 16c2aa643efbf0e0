//! `storefront-auth`: role-based authorization for storefront operations.
//!
//! Authentication happens elsewhere; this crate receives an already-verified
//! [`Principal`] and answers "may this principal do that?". Roles map to
//! permissions through a [`RoleRegistry`] that is seeded explicitly at startup.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, authorize_owner};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{AppRole, Role, RoleRegistry};
