use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductId;
use storefront_core::validate::min_chars;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, Discount, DomainError, Money, UserId};
use storefront_events::Event;

use crate::address::AddressId;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OrderStatus::Pending => f.write_str("Order Pending"),
            OrderStatus::Accepted => f.write_str("Order Accepted!"),
        }
    }
}

/// Order line copied from a cart line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub discount: Discount,
    /// Price paid per unit (after discount).
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.saturating_times(self.quantity)
    }
}

/// Payment details as reported by the payment gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: String,
    pub gateway_name: String,
    pub gateway_payment_id: String,
    pub gateway_status: String,
    pub gateway_response_message: String,
}

impl Payment {
    pub fn validate(&self) -> Result<(), DomainError> {
        min_chars("payment method", &self.method, 4)
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    owner: Option<UserId>,
    address_id: Option<AddressId>,
    lines: Vec<OrderLine>,
    payment: Payment,
    status: OrderStatus,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            owner: None,
            address_id: None,
            lines: Vec::new(),
            payment: Payment::default(),
            status: OrderStatus::Pending,
            placed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn address_id(&self) -> Option<AddressId> {
        self.address_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(OrderLine::subtotal).sum()
    }
}

impl Order {
    pub const AGGREGATE_TYPE: &'static str = "orders.order";
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub owner: UserId,
    pub address_id: AddressId,
    pub lines: Vec<OrderLine>,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub owner: UserId,
    pub address_id: AddressId,
    pub lines: Vec<OrderLine>,
    pub payment: Payment,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.owner = Some(e.owner);
                self.address_id = Some(e.address_id);
                self.lines = e.lines.clone();
                self.payment = e.payment.clone();
                self.status = OrderStatus::Accepted;
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
        }
    }
}

impl Order {
    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already placed"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::invalid_state(
                "cannot place an order without lines",
            ));
        }
        if cmd.lines.iter().any(|l| l.quantity == 0) {
            return Err(DomainError::validation("order line quantity must be positive"));
        }
        cmd.payment.validate()?;

        let total = cmd
            .lines
            .iter()
            .try_fold(Money::ZERO, |acc, line| {
                acc.checked_add(line.unit_price.times(line.quantity).ok()?)
            })
            .ok_or_else(|| DomainError::invalid_state("order total overflow"))?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            owner: cmd.owner,
            address_id: cmd.address_id,
            lines: cmd.lines.clone(),
            payment: cmd.payment.clone(),
            total,
            occurred_at: cmd.occurred_at,
        })])
    }
}
