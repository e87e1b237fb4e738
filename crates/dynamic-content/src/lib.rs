//! Dynamic content: A/B content variants shown to leads per slot, their
//! delivery stats, lifecycle events and hit charts.

pub mod entity;
pub mod events;
pub mod form;
pub mod memory;
pub mod model;
pub mod repository;

pub use entity::{DynamicContent, LeadSlotAssignment, ModelEntity, SlotContent, Stat};
pub use events::{DynamicContentEvent, LifecycleAction};
pub use form::{BoundForm, BoundFormFactory, FormFactory, FormOptions};
pub use memory::InMemoryStore;
pub use model::{
    default_messages, variants_of, DeliverySource, DynamicContentModel, HitsFlag, ModelParts,
};
pub use repository::{DynamicContentRepository, SlotAssignmentStore, StatRepository};
