use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::validate::not_blank;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storefront_events::Event;

/// Category identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Category.
///
/// Name uniqueness spans every category, so it is checked against the
/// catalog read model by the application layer before dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    name: String,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Category {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            name: String::new(),
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }
}

impl Category {
    pub const AGGREGATE_TYPE: &'static str = "catalog.category";
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCategory {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    CreateCategory(CreateCategory),
    RenameCategory(RenameCategory),
    DeleteCategory(DeleteCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRenamed {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDeleted {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
    CategoryRenamed(CategoryRenamed),
    CategoryDeleted(CategoryDeleted),
}

impl CategoryEvent {
    pub fn category_id(&self) -> CategoryId {
        match self {
            CategoryEvent::CategoryCreated(e) => e.category_id,
            CategoryEvent::CategoryRenamed(e) => e.category_id,
            CategoryEvent::CategoryDeleted(e) => e.category_id,
        }
    }
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "catalog.category.created",
            CategoryEvent::CategoryRenamed(_) => "catalog.category.renamed",
            CategoryEvent::CategoryDeleted(_) => "catalog.category.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
            CategoryEvent::CategoryRenamed(e) => e.occurred_at,
            CategoryEvent::CategoryDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.name = e.name.clone();
                self.deleted = false;
                self.created = true;
            }
            CategoryEvent::CategoryRenamed(e) => {
                self.name = e.name.clone();
            }
            CategoryEvent::CategoryDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::CreateCategory(cmd) => self.handle_create(cmd),
            CategoryCommand::RenameCategory(cmd) => self.handle_rename(cmd),
            CategoryCommand::DeleteCategory(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Category {
    fn ensure_live(&self, category_id: CategoryId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found(format!("category {category_id}")));
        }
        if self.id != category_id {
            return Err(DomainError::invalid_state("category_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("category already exists"));
        }
        not_blank("category name", &cmd.name)?;

        Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
            category_id: cmd.category_id,
            name: cmd.name.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_live(cmd.category_id)?;
        not_blank("category name", &cmd.name)?;

        let name = cmd.name.trim();
        if name == self.name {
            return Ok(vec![]);
        }

        Ok(vec![CategoryEvent::CategoryRenamed(CategoryRenamed {
            category_id: cmd.category_id,
            name: name.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_live(cmd.category_id)?;

        Ok(vec![CategoryEvent::CategoryDeleted(CategoryDeleted {
            category_id: cmd.category_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
