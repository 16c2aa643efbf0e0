//! Catalog domain module (event-sourced).
//!
//! Categories and products, including the stock and pricing data carts and
//! orders read through [`ProductSnapshot`]. Pure domain logic: no IO, no
//! storage.

pub mod category;
pub mod product;
pub mod snapshot;

pub use category::{
    Category, CategoryCommand, CategoryCreated, CategoryDeleted, CategoryEvent, CategoryId,
    CategoryRenamed, CreateCategory, DeleteCategory, RenameCategory,
};
pub use product::{
    CreateProduct, DEFAULT_IMAGE, DeleteProduct, Product, ProductCommand, ProductCreated,
    ProductDeleted, ProductEvent, ProductId, ProductUpdated, ReleaseStock, ReserveStock,
    StockReleased, StockReserved, UpdateProduct,
};
pub use snapshot::ProductSnapshot;
