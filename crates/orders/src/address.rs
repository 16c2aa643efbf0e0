use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::validate::min_chars;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

/// Address identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(pub AggregateId);

impl AddressId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AddressId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Postal fields of a shipping address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetails {
    pub street: String,
    pub building_name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pincode: String,
}

impl AddressDetails {
    pub fn validate(&self) -> Result<(), DomainError> {
        min_chars("street", &self.street, 5)?;
        min_chars("building name", &self.building_name, 5)?;
        min_chars("city", &self.city, 4)?;
        min_chars("state", &self.state, 2)?;
        min_chars("country", &self.country, 2)?;
        min_chars("pincode", &self.pincode, 6)?;
        Ok(())
    }

    fn trimmed(&self) -> Self {
        Self {
            street: self.street.trim().to_string(),
            building_name: self.building_name.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            country: self.country.trim().to_string(),
            pincode: self.pincode.trim().to_string(),
        }
    }
}

/// Aggregate root: Address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    id: AddressId,
    owner: Option<UserId>,
    details: AddressDetails,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Address {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: AddressId) -> Self {
        Self {
            id,
            owner: None,
            details: AddressDetails::default(),
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AddressId {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn details(&self) -> &AddressDetails {
        &self.details
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }
}

impl Address {
    pub const AGGREGATE_TYPE: &'static str = "orders.address";
}

impl AggregateRoot for Address {
    type Id = AddressId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAddress {
    pub address_id: AddressId,
    pub owner: UserId,
    pub details: AddressDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAddress {
    pub address_id: AddressId,
    pub details: AddressDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAddress {
    pub address_id: AddressId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressCommand {
    CreateAddress(CreateAddress),
    UpdateAddress(UpdateAddress),
    DeleteAddress(DeleteAddress),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCreated {
    pub address_id: AddressId,
    pub owner: UserId,
    pub details: AddressDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUpdated {
    pub address_id: AddressId,
    pub details: AddressDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDeleted {
    pub address_id: AddressId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressEvent {
    AddressCreated(AddressCreated),
    AddressUpdated(AddressUpdated),
    AddressDeleted(AddressDeleted),
}

impl AddressEvent {
    pub fn address_id(&self) -> AddressId {
        match self {
            AddressEvent::AddressCreated(e) => e.address_id,
            AddressEvent::AddressUpdated(e) => e.address_id,
            AddressEvent::AddressDeleted(e) => e.address_id,
        }
    }
}

impl Event for AddressEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AddressEvent::AddressCreated(_) => "orders.address.created",
            AddressEvent::AddressUpdated(_) => "orders.address.updated",
            AddressEvent::AddressDeleted(_) => "orders.address.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AddressEvent::AddressCreated(e) => e.occurred_at,
            AddressEvent::AddressUpdated(e) => e.occurred_at,
            AddressEvent::AddressDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Address {
    type Command = AddressCommand;
    type Event = AddressEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AddressEvent::AddressCreated(e) => {
                self.id = e.address_id;
                self.owner = Some(e.owner);
                self.details = e.details.clone();
                self.created = true;
            }
            AddressEvent::AddressUpdated(e) => {
                self.details = e.details.clone();
            }
            AddressEvent::AddressDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AddressCommand::CreateAddress(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("address already exists"));
                }
                cmd.details.validate()?;
                Ok(vec![AddressEvent::AddressCreated(AddressCreated {
                    address_id: cmd.address_id,
                    owner: cmd.owner,
                    details: cmd.details.trimmed(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            AddressCommand::UpdateAddress(cmd) => {
                self.ensure_live(cmd.address_id)?;
                cmd.details.validate()?;
                let details = cmd.details.trimmed();
                if details == self.details {
                    return Ok(vec![]);
                }
                Ok(vec![AddressEvent::AddressUpdated(AddressUpdated {
                    address_id: cmd.address_id,
                    details,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AddressCommand::DeleteAddress(cmd) => {
                self.ensure_live(cmd.address_id)?;
                Ok(vec![AddressEvent::AddressDeleted(AddressDeleted {
                    address_id: cmd.address_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Address {
    fn ensure_live(&self, address_id: AddressId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found(format!("address {address_id}")));
        }
        if self.id != address_id {
            return Err(DomainError::invalid_state("address_id mismatch"));
        }
        Ok(())
    }
}
