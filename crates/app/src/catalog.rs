//! Category and product management.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use storefront_auth::{Permission, Principal};
use storefront_catalog::{
    Category, CategoryCommand, CategoryId, CreateCategory, CreateProduct, DeleteCategory,
    DeleteProduct, Product, ProductCommand, ProductId, RenameCategory, UpdateProduct,
};
use storefront_core::{AggregateId, Discount, Money};
use storefront_infra::projections::{CategoryReadModel, ProductReadModel};

use crate::errors::AppError;
use crate::services::Storefront;

/// Fields of a new product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    /// Stored image name; the default image is used when absent.
    pub image: Option<String>,
    pub price: Money,
    pub discount: Discount,
    pub stock: u32,
}

/// Replacement values for an existing product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount: Discount,
    pub stock: u32,
}

impl Storefront {
    pub fn create_category(&self, principal: &Principal, name: &str) -> Result<Category, AppError> {
        self.require(principal, &Permission::CATEGORIES_MANAGE)?;
        self.create_category_unchecked(name)
    }

    /// Create a category without an authorization check (bootstrap).
    pub(crate) fn create_category_unchecked(&self, name: &str) -> Result<Category, AppError> {
        self.ensure_category_name_free(name, None)?;

        let category_id = CategoryId::new(AggregateId::new());
        let category = self.execute::<Category>(
            category_id.0,
            CategoryCommand::CreateCategory(CreateCategory {
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%category_id, name = category.name(), "category created");
        Ok(category)
    }

    pub fn rename_category(
        &self,
        principal: &Principal,
        category_id: CategoryId,
        name: &str,
    ) -> Result<Category, AppError> {
        self.require(principal, &Permission::CATEGORIES_MANAGE)?;
        self.ensure_category_name_free(name, Some(category_id))?;

        let category = self.execute::<Category>(
            category_id.0,
            CategoryCommand::RenameCategory(RenameCategory {
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%category_id, name = category.name(), "category renamed");
        Ok(category)
    }

    /// Delete an empty category.
    pub fn delete_category(&self, principal: &Principal, category_id: CategoryId) -> Result<(), AppError> {
        self.require(principal, &Permission::CATEGORIES_MANAGE)?;

        let live_products = self.products.count_in_category(category_id);
        if live_products > 0 {
            return Err(AppError::InvalidState(format!(
                "category {category_id} still holds {live_products} product(s)"
            )));
        }

        self.execute::<Category>(
            category_id.0,
            CategoryCommand::DeleteCategory(DeleteCategory {
                category_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%category_id, "category deleted");
        Ok(())
    }

    pub fn list_categories(&self) -> Vec<CategoryReadModel> {
        self.categories.list()
    }

    fn ensure_category_name_free(&self, name: &str, renaming: Option<CategoryId>) -> Result<(), AppError> {
        match self.categories.find_by_name(name) {
            Some(existing) if Some(existing.category_id) != renaming => Err(AppError::Conflict(format!(
                "category {} already exists",
                existing.name
            ))),
            _ => Ok(()),
        }
    }

    /// List a product under `category_id`, sold by the principal.
    pub fn add_product(
        &self,
        principal: &Principal,
        category_id: CategoryId,
        draft: ProductDraft,
    ) -> Result<Product, AppError> {
        self.require(principal, &Permission::PRODUCTS_MANAGE)?;

        let category = self.load::<Category>(category_id.0)?;
        if !category.is_live() {
            return Err(AppError::not_found(format!("category {category_id}")));
        }
        self.ensure_product_name_free(category_id, &draft.name, None)?;

        let product_id = ProductId::new(AggregateId::new());
        let product = self.execute::<Product>(
            product_id.0,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                category_id,
                name: draft.name,
                description: draft.description,
                image: draft.image,
                price: draft.price,
                discount: draft.discount,
                stock: draft.stock,
                seller: Some(principal.user_id),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(
            %product_id,
            %category_id,
            special_price = %product.special_price(),
            stock = product.stock(),
            "product added"
        );
        Ok(product)
    }

    /// Replace a product's details. Every cart holding it is re-priced when
    /// the price or discount changes.
    pub fn update_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        changes: ProductChanges,
    ) -> Result<Product, AppError> {
        self.require(principal, &Permission::PRODUCTS_MANAGE)?;
        let before = self.editable_product(principal, product_id)?;
        if let Some(category_id) = before.category_id() {
            self.ensure_product_name_free(category_id, &changes.name, Some(product_id))?;
        }

        let product = self.execute::<Product>(
            product_id.0,
            ProductCommand::UpdateProduct(UpdateProduct {
                product_id,
                name: changes.name,
                description: changes.description,
                price: changes.price,
                discount: changes.discount,
                stock: changes.stock,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%product_id, special_price = %product.special_price(), "product updated");

        if product.price() != before.price() || product.discount() != before.discount() {
            let workflow = self.cart_workflow();
            for cart_id in self.carts.carts_containing(product_id) {
                workflow.refresh_pricing(cart_id, product_id)?;
            }
        }
        Ok(product)
    }

    /// Take a product out of every cart, then delete it.
    pub fn delete_product(&self, principal: &Principal, product_id: ProductId) -> Result<(), AppError> {
        self.require(principal, &Permission::PRODUCTS_MANAGE)?;
        self.editable_product(principal, product_id)?;

        let workflow = self.cart_workflow();
        for cart_id in self.carts.carts_containing(product_id) {
            workflow.remove_item(cart_id, product_id)?;
        }

        self.execute::<Product>(
            product_id.0,
            ProductCommand::DeleteProduct(DeleteProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(%product_id, "product deleted");
        Ok(())
    }

    pub fn product(&self, product_id: ProductId) -> Result<ProductReadModel, AppError> {
        self.products
            .get(&product_id)
            .ok_or_else(|| AppError::not_found(format!("product {product_id}")))
    }

    /// Live products, optionally narrowed to a category and a name keyword.
    pub fn products(&self, category: Option<CategoryId>, keyword: Option<&str>) -> Vec<ProductReadModel> {
        self.products.search(category, keyword)
    }

    fn editable_product(&self, principal: &Principal, product_id: ProductId) -> Result<Product, AppError> {
        let product = self.load::<Product>(product_id.0)?;
        if !product.is_live() {
            return Err(AppError::not_found(format!("product {product_id}")));
        }
        if let Some(seller) = product.seller() {
            self.require_owner(principal, seller, &Permission::PRODUCTS_ANY)?;
        }
        Ok(product)
    }

    fn ensure_product_name_free(
        &self,
        category_id: CategoryId,
        name: &str,
        updating: Option<ProductId>,
    ) -> Result<(), AppError> {
        match self.products.find_in_category(category_id, name) {
            Some(existing) if Some(existing.product_id) != updating => Err(AppError::Conflict(format!(
                "product {} already exists in this category",
                existing.name
            ))),
            _ => Ok(()),
        }
    }
}
