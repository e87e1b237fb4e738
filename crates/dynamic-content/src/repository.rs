//! Storage seams for dynamic content, its slot assignments and delivery stats.

use std::sync::Arc;

use campaign_core::{CampaignResult, Translator};
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::entity::{DynamicContent, LeadSlotAssignment, SlotContent, Stat};

pub const DYNAMIC_CONTENT: &str = "dynamic_content";
pub const DYNAMIC_CONTENT_LEAD_DATA: &str = "dynamic_content_lead_data";
pub const DYNAMIC_CONTENT_STATS: &str = "dynamic_content_stats";
pub const PAGES: &str = "pages";

pub trait DynamicContentRepository: Send + Sync {
    /// The item with its variant parent and children loaded one level deep.
    fn get_entity(&self, id: Uuid) -> CampaignResult<Option<DynamicContent>>;

    /// Insert or replace. The parent link is taken from `variant_parent`;
    /// `variant_children` is ignored since children own their link.
    fn save_entity(&self, entity: &DynamicContent) -> CampaignResult<()>;

    fn delete_entity(&self, id: Uuid) -> CampaignResult<()>;

    fn set_translator(&self, translator: Arc<dyn Translator>);
}

pub trait StatRepository: Send + Sync {
    /// Append a stat and return it with its row id.
    fn save_entity(&self, stat: Stat) -> CampaignResult<Stat>;
}

pub trait SlotAssignmentStore: Send + Sync {
    fn insert_assignment(
        &self,
        lead_id: Uuid,
        dynamic_content_id: Uuid,
        slot: &str,
        date_added: NaiveDateTime,
    ) -> CampaignResult<LeadSlotAssignment>;

    /// Content of the latest assignment for (`slot`, `lead_id`): newest
    /// `date_added` first, then highest row id. Assignments pointing at
    /// deleted content are skipped.
    fn latest_slot_content(&self, slot: &str, lead_id: Uuid) -> CampaignResult<Option<SlotContent>>;
}
