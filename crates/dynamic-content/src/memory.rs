//! In-process store backed by DashMap tables. Row ids come from atomic
//! sequences so append-only tables keep insertion order for tie-breaks.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use campaign_core::{CampaignError, CampaignResult, Page, StoreConfig, Translator};
use campaign_reporting::query::{group_key, row_matches, TimeDataQuery, TimeDataSource};
use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{DynamicContent, LeadSlotAssignment, SlotContent, Stat};
use crate::repository::{
    DynamicContentRepository, SlotAssignmentStore, StatRepository, DYNAMIC_CONTENT,
    DYNAMIC_CONTENT_LEAD_DATA, DYNAMIC_CONTENT_STATS, PAGES,
};

pub const NOT_FOUND_KEY: &str = "mautic.dynamicContent.error.notfound";

#[derive(Debug, Clone)]
struct ContentRecord {
    content: DynamicContent,
    parent_id: Option<Uuid>,
}

pub struct InMemoryStore {
    config: StoreConfig,
    contents: DashMap<Uuid, ContentRecord>,
    assignments: DashMap<u64, LeadSlotAssignment>,
    stats: DashMap<u64, Stat>,
    pages: DashMap<Uuid, Page>,
    assignment_seq: AtomicU64,
    stat_seq: AtomicU64,
    translator: RwLock<Option<Arc<dyn Translator>>>,
}

impl InMemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            contents: DashMap::new(),
            assignments: DashMap::new(),
            stats: DashMap::new(),
            pages: DashMap::new(),
            assignment_seq: AtomicU64::new(0),
            stat_seq: AtomicU64::new(0),
            translator: RwLock::new(None),
        }
    }

    /// Physical table name for a logical one.
    pub fn table(&self, name: &str) -> String {
        self.config.table(name)
    }

    pub fn save_page(&self, page: Page) {
        self.pages.insert(page.id, page);
    }

    pub fn stats(&self) -> Vec<Stat> {
        let mut stats: Vec<Stat> = self.stats.iter().map(|s| s.value().clone()).collect();
        stats.sort_by_key(|s| s.id);
        stats
    }

    pub fn assignments(&self) -> Vec<LeadSlotAssignment> {
        let mut rows: Vec<LeadSlotAssignment> =
            self.assignments.iter().map(|a| a.value().clone()).collect();
        rows.sort_by_key(|a| a.id);
        rows
    }

    fn children_of(&self, parent_id: Uuid) -> Vec<DynamicContent> {
        let mut children: Vec<DynamicContent> = self
            .contents
            .iter()
            .filter(|r| r.parent_id == Some(parent_id))
            .map(|r| r.content.clone())
            .collect();
        children.sort_by(|a, b| (a.date_added, a.id).cmp(&(b.date_added, b.id)));
        children
    }

    fn record(&self, id: Uuid) -> Option<ContentRecord> {
        self.contents.get(&id).map(|r| r.value().clone())
    }

    fn not_found(&self, id: Uuid) -> CampaignError {
        let message = match self.translator.read().as_ref() {
            Some(translator) => translator.trans(NOT_FOUND_KEY),
            None => "dynamic content not found".to_string(),
        };
        CampaignError::NotFound(format!("{message} ({id})"))
    }

    fn owner_allows(&self, stat: &Stat, query: &TimeDataQuery) -> CampaignResult<bool> {
        let Some(owner) = &query.owner else {
            return Ok(true);
        };
        if owner.join_table != PAGES {
            return Err(CampaignError::Store(format!(
                "cannot join '{}' to '{}'",
                self.table(&owner.join_table),
                self.table(&query.table)
            )));
        }
        let container = match owner.join_column.as_str() {
            "container_id" => stat.container_id,
            other => {
                return Err(CampaignError::Store(format!(
                    "unknown join column '{other}' on '{}'",
                    self.table(&query.table)
                )))
            }
        };
        // Inner join: stats without a container never match.
        let creator = container
            .and_then(|id| self.pages.get(&id).map(|p| p.created_by))
            .flatten();
        Ok(container.is_some() && owner.allows(creator))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl DynamicContentRepository for InMemoryStore {
    fn get_entity(&self, id: Uuid) -> CampaignResult<Option<DynamicContent>> {
        let Some(record) = self.record(id) else {
            return Ok(None);
        };

        let mut entity = record.content;
        match record.parent_id.and_then(|pid| self.record(pid)) {
            Some(parent) => {
                let mut parent = parent.content;
                parent.variant_children = Some(self.children_of(parent.id));
                entity.variant_parent = Some(Box::new(parent));
                entity.variant_children = Some(Vec::new());
            }
            None => {
                entity.variant_children = Some(self.children_of(entity.id));
            }
        }
        Ok(Some(entity))
    }

    fn save_entity(&self, entity: &DynamicContent) -> CampaignResult<()> {
        let parent_id = entity.parent_id();
        if parent_id == Some(entity.id) {
            return Err(CampaignError::InvalidArgument(format!(
                "dynamic content {} cannot be its own variant parent",
                entity.id
            )));
        }
        if let Some(pid) = parent_id {
            if !self.contents.contains_key(&pid) {
                return Err(CampaignError::Store(format!(
                    "foreign key violation on {}: variant_parent_id {pid} does not exist",
                    self.table(DYNAMIC_CONTENT)
                )));
            }
        }

        self.contents.insert(
            entity.id,
            ContentRecord {
                content: entity.detached(),
                parent_id,
            },
        );
        debug!(table = %self.table(DYNAMIC_CONTENT), id = %entity.id, "saved dynamic content");
        Ok(())
    }

    fn delete_entity(&self, id: Uuid) -> CampaignResult<()> {
        if self.contents.remove(&id).is_none() {
            return Err(self.not_found(id));
        }
        // Variants lose their parent; mirrors ON DELETE SET NULL.
        for mut record in self.contents.iter_mut() {
            if record.parent_id == Some(id) {
                record.parent_id = None;
            }
        }
        debug!(table = %self.table(DYNAMIC_CONTENT), %id, "deleted dynamic content");
        Ok(())
    }

    fn set_translator(&self, translator: Arc<dyn Translator>) {
        *self.translator.write() = Some(translator);
    }
}

impl StatRepository for InMemoryStore {
    fn save_entity(&self, mut stat: Stat) -> CampaignResult<Stat> {
        stat.id = self.stat_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.insert(stat.id, stat.clone());
        debug!(table = %self.table(DYNAMIC_CONTENT_STATS), id = stat.id, "saved stat");
        Ok(stat)
    }
}

impl SlotAssignmentStore for InMemoryStore {
    fn insert_assignment(
        &self,
        lead_id: Uuid,
        dynamic_content_id: Uuid,
        slot: &str,
        date_added: NaiveDateTime,
    ) -> CampaignResult<LeadSlotAssignment> {
        let row = LeadSlotAssignment {
            id: self.assignment_seq.fetch_add(1, Ordering::SeqCst) + 1,
            lead_id,
            dynamic_content_id,
            slot: slot.to_string(),
            date_added,
        };
        self.assignments.insert(row.id, row.clone());
        Ok(row)
    }

    fn latest_slot_content(
        &self,
        slot: &str,
        lead_id: Uuid,
    ) -> CampaignResult<Option<SlotContent>> {
        let mut candidates: Vec<(NaiveDateTime, u64, Uuid)> = self
            .assignments
            .iter()
            .filter(|a| a.slot == slot && a.lead_id == lead_id)
            .map(|a| (a.date_added, a.id, a.dynamic_content_id))
            .collect();
        candidates.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));

        debug!(
            table = %self.table(DYNAMIC_CONTENT_LEAD_DATA),
            slot,
            %lead_id,
            candidates = candidates.len(),
            "slot content lookup"
        );

        Ok(candidates.into_iter().find_map(|(_, _, content_id)| {
            self.contents.get(&content_id).map(|r| SlotContent {
                id: r.content.id,
                content: r.content.content.clone(),
            })
        }))
    }
}

impl TimeDataSource for InMemoryStore {
    fn load_time_data(&self, query: &TimeDataQuery) -> CampaignResult<Vec<DateTime<Utc>>> {
        if query.table != DYNAMIC_CONTENT_STATS {
            return Err(CampaignError::Store(format!(
                "table '{}' does not exist",
                self.table(&query.table)
            )));
        }
        if query.date_column != "date_sent" {
            return Err(CampaignError::Store(format!(
                "'{}' is not a date column of '{}'",
                query.date_column,
                self.table(&query.table)
            )));
        }

        let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
        let mut dates = Vec::new();
        for stat in self.stats().iter().filter(|s| query.contains(&s.date_sent)) {
            if !row_matches(stat, &query.filters)? || !self.owner_allows(stat, query)? {
                continue;
            }
            if !query.group_by.is_empty() && !seen.insert(group_key(stat, &query.group_by)?) {
                continue;
            }
            dates.push(stat.date_sent);
        }
        Ok(dates)
    }
}
