//! Application services: the cart workflow and the catalog, address and order
//! services built around it.
//!
//! Everything goes through [`Storefront`], which owns the event store, the
//! read models and the role registry. Callers hand in an already
//! authenticated [`storefront_auth::Principal`]; every service checks its
//! permissions before dispatching.

pub mod addresses;
mod authz;
pub mod bootstrap;
pub mod cart;
pub mod catalog;
pub mod errors;
pub mod orders;
pub mod services;

pub use bootstrap::BootstrapReport;
pub use cart::CartWorkflow;
pub use catalog::{ProductChanges, ProductDraft};
pub use errors::{AppError, ErrorKind};
pub use services::{EventSourced, Storefront};

use storefront_infra::config::StorefrontConfig;

/// Read configuration from the environment, install logging and return a
/// bootstrapped storefront.
pub fn start_from_env() -> Result<Storefront, AppError> {
    let config = StorefrontConfig::from_env()?;
    storefront_observability::init(config.log_format);

    let app = Storefront::new(config);
    app.bootstrap()?;
    Ok(app)
}
