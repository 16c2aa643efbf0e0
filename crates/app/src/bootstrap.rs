use storefront_auth::Role;

use crate::errors::AppError;
use crate::services::Storefront;

/// What a [`Storefront::bootstrap`] run actually added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub roles_seeded: Vec<Role>,
    pub categories_created: Vec<String>,
}

impl BootstrapReport {
    pub fn is_empty(&self) -> bool {
        self.roles_seeded.is_empty() && self.categories_created.is_empty()
    }
}

impl Storefront {
    /// Seed the default roles and the configured default categories.
    ///
    /// Safe to run more than once; a second run reports nothing new.
    pub fn bootstrap(&self) -> Result<BootstrapReport, AppError> {
        let roles_seeded = self
            .roles
            .write()
            .map_err(|_| AppError::Internal("role registry lock poisoned".into()))?
            .ensure_defaults();

        let mut categories_created = Vec::new();
        for name in &self.config().default_categories {
            if self.categories.find_by_name(name).is_some() {
                continue;
            }
            self.create_category_unchecked(name)?;
            categories_created.push(name.clone());
        }

        let report = BootstrapReport {
            roles_seeded,
            categories_created,
        };
        tracing::info!(
            roles = report.roles_seeded.len(),
            categories = report.categories_created.len(),
            "bootstrap complete"
        );
        Ok(report)
    }
}
