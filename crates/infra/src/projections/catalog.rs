use serde_json::Value as JsonValue;

use storefront_catalog::{Category, CategoryEvent, CategoryId, Product, ProductEvent, ProductId};
use storefront_core::{Discount, Money, UserId};
use storefront_events::EventEnvelope;

use super::cursor::{StreamCursors, decode, ensure_same_stream};
use super::{Projection, ProjectionError};
use crate::read_model::{InMemoryReadStore, ReadStore};

/// A live category. Deleted categories leave the read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReadModel {
    pub category_id: CategoryId,
    pub name: String,
}

#[derive(Debug)]
pub struct CategoriesProjection<S = InMemoryReadStore<CategoryId, CategoryReadModel>>
where
    S: ReadStore<CategoryId, CategoryReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl CategoriesProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, category_id: &CategoryId) -> Option<CategoryReadModel> {
        self.store.get(category_id)
    }

    /// Live categories ordered by name.
    pub fn list(&self) -> Vec<CategoryReadModel> {
        let mut all = self.store.list();
        all.sort_by_key(|c| c.name.to_lowercase());
        all
    }

    /// Case-insensitive name lookup.
    pub fn find_by_name(&self, name: &str) -> Option<CategoryReadModel> {
        let wanted = name.trim().to_lowercase();
        self.store
            .list()
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted)
    }
}

impl<S> Projection for CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryReadModel>,
{
    fn name(&self) -> &'static str {
        "catalog.categories"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Category::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: CategoryEvent = decode(envelope)?;
        ensure_same_stream(envelope, ev.category_id().0)?;

        match ev {
            CategoryEvent::CategoryCreated(e) => {
                self.store.upsert(
                    e.category_id,
                    CategoryReadModel {
                        category_id: e.category_id,
                        name: e.name,
                    },
                );
            }
            CategoryEvent::CategoryRenamed(e) => {
                if let Some(mut rm) = self.store.get(&e.category_id) {
                    rm.name = e.name;
                    self.store.upsert(e.category_id, rm);
                }
            }
            CategoryEvent::CategoryDeleted(e) => {
                self.store.remove(&e.category_id);
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        Ok(())
    }

    fn reset(&self) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear()
    }
}

/// A live product as shown in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub image: String,
    pub price: Money,
    pub discount: Discount,
    pub special_price: Money,
    pub stock: u32,
    pub seller: Option<UserId>,
}

#[derive(Debug)]
pub struct ProductsProjection<S = InMemoryReadStore<ProductId, ProductReadModel>>
where
    S: ReadStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl ProductsProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> ProductsProjection<S>
where
    S: ReadStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    /// Products filtered by category and by a case-insensitive keyword in the
    /// name, ordered by name.
    pub fn search(&self, category: Option<CategoryId>, keyword: Option<&str>) -> Vec<ProductReadModel> {
        let keyword = keyword
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());

        let mut found: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| category.is_none_or(|c| p.category_id == c))
            .filter(|p| {
                keyword
                    .as_deref()
                    .is_none_or(|k| p.name.to_lowercase().contains(k))
            })
            .collect();
        found.sort_by_key(|p| p.name.to_lowercase());
        found
    }

    /// Case-insensitive name lookup within one category.
    pub fn find_in_category(&self, category_id: CategoryId, name: &str) -> Option<ProductReadModel> {
        let wanted = name.trim().to_lowercase();
        self.store
            .list()
            .into_iter()
            .find(|p| p.category_id == category_id && p.name.to_lowercase() == wanted)
    }

    pub fn count_in_category(&self, category_id: CategoryId) -> usize {
        self.store
            .list()
            .iter()
            .filter(|p| p.category_id == category_id)
            .count()
    }

    fn update(&self, product_id: ProductId, f: impl FnOnce(&mut ProductReadModel)) {
        if let Some(mut rm) = self.store.get(&product_id) {
            f(&mut rm);
            self.store.upsert(product_id, rm);
        }
    }
}

impl<S> Projection for ProductsProjection<S>
where
    S: ReadStore<ProductId, ProductReadModel>,
{
    fn name(&self) -> &'static str {
        "catalog.products"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Product::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: ProductEvent = decode(envelope)?;
        ensure_same_stream(envelope, ev.product_id().0)?;

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        category_id: e.category_id,
                        name: e.name,
                        description: e.description,
                        image: e.image,
                        price: e.price,
                        discount: e.discount,
                        special_price: e.discount.apply(e.price),
                        stock: e.stock,
                        seller: e.seller,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => self.update(e.product_id, |rm| {
                rm.name = e.name;
                rm.description = e.description;
                rm.price = e.price;
                rm.discount = e.discount;
                rm.special_price = e.discount.apply(e.price);
                rm.stock = e.stock;
            }),
            ProductEvent::StockReserved(e) => self.update(e.product_id, |rm| {
                rm.stock = rm.stock.saturating_sub(e.quantity);
            }),
            ProductEvent::StockReleased(e) => self.update(e.product_id, |rm| {
                rm.stock = rm.stock.saturating_add(e.quantity);
            }),
            ProductEvent::ProductDeleted(e) => {
                self.store.remove(&e.product_id);
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number())?;
        Ok(())
    }

    fn reset(&self) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear()
    }
}
