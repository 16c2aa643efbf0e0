use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_catalog::{ProductId, ProductSnapshot};
use storefront_core::{Aggregate, AggregateId, AggregateRoot, Discount, DomainError, Money, UserId};
use storefront_events::Event;

/// Cart identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub AggregateId);

/// Namespace for deriving a user's cart id from their user id.
const CART_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_5e30_8c14_d2f6_0a9b_3e71);

impl CartId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The one cart a user owns. Every caller derives the same id, so two
    /// racing creations meet on the same stream.
    pub fn for_owner(owner: UserId) -> Self {
        Self(AggregateId::from_uuid(Uuid::new_v5(
            &CART_NAMESPACE,
            owner.as_uuid().as_bytes(),
        )))
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One product in a cart, with the price captured at the last add,
/// quantity change or pricing refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Special price (after discount) at snapshot time, in minor units.
    pub unit_price: Money,
    pub discount: Discount,
}

impl CartLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.saturating_times(self.quantity)
    }
}

/// Aggregate root: Cart.
///
/// Invariants:
/// - at most one line per product
/// - every line has a positive quantity
/// - `total()` equals the sum of `unit_price × quantity` over all lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    owner: Option<UserId>,
    lines: Vec<CartLine>,
    version: u64,
    created: bool,
}

impl Cart {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            owner: None,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Lines in the order they were first added.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::subtotal).sum()
    }
}

impl Cart {
    /// Stream type recorded on every stored event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "cart";
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateCart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCart {
    pub cart_id: CartId,
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub cart_id: CartId,
    pub product: ProductSnapshot,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeQuantity (relative; negative deltas decrease).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeQuantity {
    pub cart_id: CartId,
    pub product: ProductSnapshot,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefreshPricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPricing {
    pub cart_id: CartId,
    pub product: ProductSnapshot,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CheckOut (empties the cart once an order has been placed from it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOut {
    pub cart_id: CartId,
    pub order_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestoreLines (puts checked-out lines back after the order
/// placed from them failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreLines {
    pub cart_id: CartId,
    pub order_id: AggregateId,
    pub lines: Vec<CartLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    CreateCart(CreateCart),
    AddItem(AddItem),
    ChangeQuantity(ChangeQuantity),
    RemoveItem(RemoveItem),
    RefreshPricing(RefreshPricing),
    CheckOut(CheckOut),
    RestoreLines(RestoreLines),
}

/// Event: CartCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCreated {
    pub cart_id: CartId,
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub discount: Discount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantityChanged (carries the resulting quantity and the fresh snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChanged {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub discount: Discount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// The line's stored subtotal at removal time.
    pub subtotal: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PricingRefreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRefreshed {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub unit_price: Money,
    pub discount: Discount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartCheckedOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCheckedOut {
    pub cart_id: CartId,
    pub order_id: AggregateId,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesRestored. Carries only the lines that went back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesRestored {
    pub cart_id: CartId,
    pub order_id: AggregateId,
    pub lines: Vec<CartLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartCreated(CartCreated),
    ItemAdded(ItemAdded),
    QuantityChanged(QuantityChanged),
    ItemRemoved(ItemRemoved),
    PricingRefreshed(PricingRefreshed),
    CartCheckedOut(CartCheckedOut),
    LinesRestored(LinesRestored),
}

impl CartEvent {
    pub fn cart_id(&self) -> CartId {
        match self {
            CartEvent::CartCreated(e) => e.cart_id,
            CartEvent::ItemAdded(e) => e.cart_id,
            CartEvent::QuantityChanged(e) => e.cart_id,
            CartEvent::ItemRemoved(e) => e.cart_id,
            CartEvent::PricingRefreshed(e) => e.cart_id,
            CartEvent::CartCheckedOut(e) => e.cart_id,
            CartEvent::LinesRestored(e) => e.cart_id,
        }
    }
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartCreated(_) => "cart.created",
            CartEvent::ItemAdded(_) => "cart.item_added",
            CartEvent::QuantityChanged(_) => "cart.quantity_changed",
            CartEvent::ItemRemoved(_) => "cart.item_removed",
            CartEvent::PricingRefreshed(_) => "cart.pricing_refreshed",
            CartEvent::CartCheckedOut(_) => "cart.checked_out",
            CartEvent::LinesRestored(_) => "cart.lines_restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartCreated(e) => e.occurred_at,
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::QuantityChanged(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::PricingRefreshed(e) => e.occurred_at,
            CartEvent::CartCheckedOut(e) => e.occurred_at,
            CartEvent::LinesRestored(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartCreated(e) => {
                self.id = e.cart_id;
                self.owner = Some(e.owner);
                self.lines.clear();
                self.created = true;
            }
            CartEvent::ItemAdded(e) => {
                self.lines.push(CartLine {
                    product_id: e.product_id,
                    product_name: e.product_name.clone(),
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                    discount: e.discount,
                });
            }
            CartEvent::QuantityChanged(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == e.product_id) {
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                    line.discount = e.discount;
                }
            }
            CartEvent::ItemRemoved(e) => {
                self.lines.retain(|l| l.product_id != e.product_id);
            }
            CartEvent::PricingRefreshed(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == e.product_id) {
                    line.unit_price = e.unit_price;
                    line.discount = e.discount;
                }
            }
            CartEvent::CartCheckedOut(_) => {
                self.lines.clear();
            }
            CartEvent::LinesRestored(e) => {
                self.lines.extend(e.lines.iter().cloned());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::CreateCart(cmd) => self.handle_create(cmd),
            CartCommand::AddItem(cmd) => self.handle_add_item(cmd),
            CartCommand::ChangeQuantity(cmd) => self.handle_change_quantity(cmd),
            CartCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            CartCommand::RefreshPricing(cmd) => self.handle_refresh_pricing(cmd),
            CartCommand::CheckOut(cmd) => self.handle_check_out(cmd),
            CartCommand::RestoreLines(cmd) => self.handle_restore_lines(cmd),
        }
    }
}

impl Cart {
    fn ensure_cart(&self, cart_id: CartId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("cart {cart_id}")));
        }
        if self.id != cart_id {
            return Err(DomainError::invalid_state("cart_id mismatch"));
        }
        Ok(())
    }

    fn existing_line(&self, product_id: ProductId) -> Result<&CartLine, DomainError> {
        self.line(product_id).ok_or_else(|| {
            DomainError::not_found(format!("product {product_id} is not in cart {}", self.id))
        })
    }

    /// Fail unless the total still fits in `Money` once the line for
    /// `product_id` has the given subtotal.
    fn ensure_total_fits(&self, product_id: ProductId, subtotal: Money) -> Result<(), DomainError> {
        self.lines
            .iter()
            .filter(|l| l.product_id != product_id)
            .try_fold(subtotal, |acc, l| acc.checked_add(l.subtotal()))
            .map(|_| ())
            .ok_or_else(|| DomainError::invalid_state("cart total overflow"))
    }

    fn handle_create(&self, cmd: &CreateCart) -> Result<Vec<CartEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("cart already exists"));
        }

        Ok(vec![CartEvent::CartCreated(CartCreated {
            cart_id: cmd.cart_id,
            owner: cmd.owner,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;

        let product = &cmd.product;
        if self.line(product.product_id).is_some() {
            return Err(DomainError::conflict(format!(
                "{} already exists in the cart",
                product.name
            )));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::invalid_state("quantity must be positive"));
        }
        product.ensure_available(cmd.quantity)?;

        let subtotal = product.special_price.times(cmd.quantity)?;
        self.ensure_total_fits(product.product_id, subtotal)?;

        Ok(vec![CartEvent::ItemAdded(ItemAdded {
            cart_id: cmd.cart_id,
            product_id: product.product_id,
            product_name: product.name.clone(),
            quantity: cmd.quantity,
            unit_price: product.special_price,
            discount: product.discount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_quantity(&self, cmd: &ChangeQuantity) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;

        let product = &cmd.product;
        let line = self.existing_line(product.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let new_quantity = i64::from(line.quantity)
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::invalid_state("quantity overflow"))?;
        if new_quantity < 0 {
            return Err(DomainError::invalid_state("quantity cannot go negative"));
        }

        if new_quantity == 0 {
            return Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
                cart_id: cmd.cart_id,
                product_id: line.product_id,
                quantity: line.quantity,
                subtotal: line.subtotal(),
                occurred_at: cmd.occurred_at,
            })]);
        }

        let new_quantity = u32::try_from(new_quantity)
            .map_err(|_| DomainError::invalid_state("quantity overflow"))?;
        if cmd.delta > 0 {
            product.ensure_available(new_quantity)?;
        }

        let subtotal = product.special_price.times(new_quantity)?;
        self.ensure_total_fits(product.product_id, subtotal)?;

        Ok(vec![CartEvent::QuantityChanged(QuantityChanged {
            cart_id: cmd.cart_id,
            product_id: product.product_id,
            quantity: new_quantity,
            unit_price: product.special_price,
            discount: product.discount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;
        let line = self.existing_line(cmd.product_id)?;

        Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
            cart_id: cmd.cart_id,
            product_id: line.product_id,
            quantity: line.quantity,
            subtotal: line.subtotal(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refresh_pricing(&self, cmd: &RefreshPricing) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;

        let product = &cmd.product;
        let line = self.existing_line(product.product_id)?;

        if line.unit_price == product.special_price && line.discount == product.discount {
            return Ok(vec![]);
        }

        let subtotal = product.special_price.times(line.quantity)?;
        self.ensure_total_fits(product.product_id, subtotal)?;

        Ok(vec![CartEvent::PricingRefreshed(PricingRefreshed {
            cart_id: cmd.cart_id,
            product_id: product.product_id,
            unit_price: product.special_price,
            discount: product.discount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_check_out(&self, cmd: &CheckOut) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;

        if self.lines.is_empty() {
            return Err(DomainError::invalid_state("cannot check out an empty cart"));
        }

        Ok(vec![CartEvent::CartCheckedOut(CartCheckedOut {
            cart_id: cmd.cart_id,
            order_id: cmd.order_id,
            total: self.total(),
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Lines for products added again since the checkout are kept as they
    /// are; only the rest go back in.
    fn handle_restore_lines(&self, cmd: &RestoreLines) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;

        let mut lines: Vec<CartLine> = Vec::with_capacity(cmd.lines.len());
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(DomainError::invalid_state("quantity must be positive"));
            }
            if self.line(line.product_id).is_some()
                || lines.iter().any(|l| l.product_id == line.product_id)
            {
                continue;
            }
            lines.push(line.clone());
        }
        if lines.is_empty() {
            return Ok(vec![]);
        }

        let total = self
            .lines
            .iter()
            .chain(lines.iter())
            .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.subtotal()));
        if total.is_none() {
            return Err(DomainError::invalid_state("cart total overflow"));
        }

        Ok(vec![CartEvent::LinesRestored(LinesRestored {
            cart_id: cmd.cart_id,
            order_id: cmd.order_id,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }
}
