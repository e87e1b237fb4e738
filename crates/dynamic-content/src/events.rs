//! Lifecycle events fired around saving and deleting dynamic content.

use std::fmt;
use std::sync::Arc;

use crate::entity::DynamicContent;
use crate::repository::DynamicContentRepository;

pub const PRE_SAVE: &str = "dynamic_content.pre_save";
pub const POST_SAVE: &str = "dynamic_content.post_save";
pub const PRE_DELETE: &str = "dynamic_content.pre_delete";
pub const POST_DELETE: &str = "dynamic_content.post_delete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
}

impl LifecycleAction {
    /// `None` for anything other than the four lifecycle action names.
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "pre_save" => Some(LifecycleAction::PreSave),
            "post_save" => Some(LifecycleAction::PostSave),
            "pre_delete" => Some(LifecycleAction::PreDelete),
            "post_delete" => Some(LifecycleAction::PostDelete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::PreSave => "pre_save",
            LifecycleAction::PostSave => "post_save",
            LifecycleAction::PreDelete => "pre_delete",
            LifecycleAction::PostDelete => "post_delete",
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            LifecycleAction::PreSave => PRE_SAVE,
            LifecycleAction::PostSave => POST_SAVE,
            LifecycleAction::PreDelete => PRE_DELETE,
            LifecycleAction::PostDelete => POST_DELETE,
        }
    }
}

/// Payload handed to lifecycle listeners. Listeners may edit the entity;
/// the save path persists those edits.
#[derive(Clone)]
pub struct DynamicContentEvent {
    entity: DynamicContent,
    is_new: bool,
    store: Option<Arc<dyn DynamicContentRepository>>,
}

impl DynamicContentEvent {
    pub fn new(entity: DynamicContent, is_new: bool) -> Self {
        Self {
            entity,
            is_new,
            store: None,
        }
    }

    pub fn entity(&self) -> &DynamicContent {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut DynamicContent {
        &mut self.entity
    }

    pub fn into_entity(self) -> DynamicContent {
        self.entity
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn store(&self) -> Option<&Arc<dyn DynamicContentRepository>> {
        self.store.as_ref()
    }

    pub fn set_store(&mut self, store: Arc<dyn DynamicContentRepository>) {
        self.store = Some(store);
    }
}

impl fmt::Debug for DynamicContentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContentEvent")
            .field("entity", &self.entity.id)
            .field("is_new", &self.is_new)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
