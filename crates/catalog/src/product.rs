use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::validate::{min_chars, not_blank};
use storefront_core::{Aggregate, AggregateId, AggregateRoot, Discount, DomainError, Money, UserId};
use storefront_events::Event;

use crate::category::CategoryId;
use crate::snapshot::ProductSnapshot;

/// Image name used when a product is created without one.
pub const DEFAULT_IMAGE: &str = "default.png";

const NAME_MIN_CHARS: usize = 3;
const DESCRIPTION_MIN_CHARS: usize = 6;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Product (the inventory record).
///
/// Holds list price, discount and available stock. The special price is
/// always derived from the current price and discount, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    category_id: Option<CategoryId>,
    name: String,
    description: String,
    image: String,
    price: Money,
    discount: Discount,
    stock: u32,
    seller: Option<UserId>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            category_id: None,
            name: String::new(),
            description: String::new(),
            image: String::new(),
            price: Money::ZERO,
            discount: Discount::NONE,
            stock: 0,
            seller: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn special_price(&self) -> Money {
        self.discount.apply(self.price)
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn seller(&self) -> Option<UserId> {
        self.seller
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            name: self.name.clone(),
            price: self.price,
            discount: self.discount,
            special_price: self.special_price(),
            available: self.stock,
        }
    }
}

impl Product {
    pub const AGGREGATE_TYPE: &'static str = "catalog.product";
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub price: Money,
    pub discount: Discount,
    pub stock: u32,
    pub seller: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct (full replacement of the editable fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount: Discount,
    pub stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock (take units out of stock for an order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock (return previously reserved units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
    DeleteProduct(DeleteProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub image: String,
    pub price: Money,
    pub discount: Discount,
    pub stock: u32,
    pub seller: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount: Discount,
    pub stock: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
    ProductDeleted(ProductDeleted),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::StockReserved(e) => e.product_id,
            ProductEvent::StockReleased(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::StockReserved(_) => "catalog.product.stock_reserved",
            ProductEvent::StockReleased(_) => "catalog.product.stock_released",
            ProductEvent::ProductDeleted(_) => "catalog.product.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::StockReserved(e) => e.occurred_at,
            ProductEvent::StockReleased(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.category_id = Some(e.category_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.image = e.image.clone();
                self.price = e.price;
                self.discount = e.discount;
                self.stock = e.stock;
                self.seller = e.seller;
                self.deleted = false;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.price = e.price;
                self.discount = e.discount;
                self.stock = e.stock;
            }
            ProductEvent::StockReserved(e) => {
                self.stock = self.stock.saturating_sub(e.quantity);
            }
            ProductEvent::StockReleased(e) => {
                self.stock = self.stock.saturating_add(e.quantity);
            }
            ProductEvent::ProductDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            ProductCommand::ReleaseStock(cmd) => self.handle_release(cmd),
            ProductCommand::DeleteProduct(cmd) => self.handle_delete(cmd),
        }
    }
}

fn validate_text(name: &str, description: &str) -> Result<(), DomainError> {
    min_chars("product name", name, NAME_MIN_CHARS)?;
    min_chars("product description", description, DESCRIPTION_MIN_CHARS)?;
    Ok(())
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invalid_state("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found(format!("product {product_id}")));
        }
        self.ensure_product_id(product_id)
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        validate_text(&cmd.name, &cmd.description)?;

        let image = match &cmd.image {
            Some(image) => {
                not_blank("product image", image)?;
                image.trim().to_string()
            }
            None => DEFAULT_IMAGE.to_string(),
        };

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            category_id: cmd.category_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.trim().to_string(),
            image,
            price: cmd.price,
            discount: cmd.discount,
            stock: cmd.stock,
            seller: cmd.seller,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.product_id)?;
        validate_text(&cmd.name, &cmd.description)?;

        let name = cmd.name.trim();
        let description = cmd.description.trim();
        let unchanged = name == self.name
            && description == self.description
            && cmd.price == self.price
            && cmd.discount == self.discount
            && cmd.stock == self.stock;
        if unchanged {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            name: name.to_string(),
            description: description.to_string(),
            price: cmd.price,
            discount: cmd.discount,
            stock: cmd.stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.product_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.snapshot().ensure_available(cmd.quantity)?;

        Ok(vec![ProductEvent::StockReserved(StockReserved {
            product_id: cmd.product_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<ProductEvent>, DomainError> {
        // Deleted products still accept releases.
        if !self.created {
            return Err(DomainError::not_found(format!("product {}", cmd.product_id)));
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.stock.checked_add(cmd.quantity).is_none() {
            return Err(DomainError::invalid_state("stock would overflow"));
        }

        Ok(vec![ProductEvent::StockReleased(StockReleased {
            product_id: cmd.product_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.product_id)?;

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
