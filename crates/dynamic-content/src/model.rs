//! Dynamic content model: entity access, variant resolution, slot
//! assignment, delivery stats, lifecycle events and hit charts.

use std::sync::Arc;

use campaign_core::{
    CampaignError, CampaignResult, EventDispatcher, Lead, MessageCatalog, Translator, UserContext,
};
use campaign_reporting::{
    ChartData, ChartFilter, FilterValue, LineChart, OwnerFilter, TimeDataQuery, TimeDataSource,
    TimeUnit,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{stored_timestamp, DynamicContent, ModelEntity, SlotContent, Stat};
use crate::events::{DynamicContentEvent, LifecycleAction};
use crate::form::{FormFactory, FormOptions, FORM_TYPE};
use crate::memory::{InMemoryStore, NOT_FOUND_KEY};
use crate::repository::{
    DynamicContentRepository, SlotAssignmentStore, StatRepository, DYNAMIC_CONTENT_STATS, PAGES,
};

pub const TOTAL_VIEWS_KEY: &str = "mautic.dynamicContent.show.total.views";
pub const UNIQUE_VIEWS_KEY: &str = "mautic.dynamicContent.show.unique.views";

const ENTITY_KIND: &str = "Dynamic Content";

/// English labels for the keys this crate translates.
pub fn default_messages() -> MessageCatalog {
    MessageCatalog::new("en_US")
        .with_message(TOTAL_VIEWS_KEY, "Total views")
        .with_message(UNIQUE_VIEWS_KEY, "Unique views")
        .with_message(NOT_FOUND_KEY, "Dynamic content not found")
}

/// Which hit series to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitsFlag {
    Total,
    Unique,
    TotalAndUnique,
}

impl HitsFlag {
    /// An empty flag is the same as no flag.
    pub fn from_filter_value(value: &FilterValue) -> CampaignResult<Option<Self>> {
        match value.as_text() {
            Some("") => Ok(None),
            Some("total") => Ok(Some(HitsFlag::Total)),
            Some("unique") => Ok(Some(HitsFlag::Unique)),
            Some("total_and_unique") => Ok(Some(HitsFlag::TotalAndUnique)),
            _ => Err(CampaignError::InvalidArgument(format!(
                "unknown hits flag {value:?}, expected total, unique or total_and_unique"
            ))),
        }
    }

    fn includes_total(self) -> bool {
        matches!(self, HitsFlag::Total | HitsFlag::TotalAndUnique)
    }

    fn includes_unique(self) -> bool {
        matches!(self, HitsFlag::Unique | HitsFlag::TotalAndUnique)
    }
}

/// Where a delivery happened, beyond the content and the lead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySource {
    pub source: Option<String>,
    pub source_id: Option<i64>,
    pub container_id: Option<Uuid>,
}

/// Collaborators the model delegates to.
pub struct ModelParts {
    pub repository: Arc<dyn DynamicContentRepository>,
    pub stats: Arc<dyn StatRepository>,
    pub assignments: Arc<dyn SlotAssignmentStore>,
    pub time_data: Arc<dyn TimeDataSource>,
    pub dispatcher: Arc<dyn EventDispatcher<DynamicContentEvent>>,
    pub translator: Arc<dyn Translator>,
    pub user: Arc<dyn UserContext>,
}

/// Request-scoped orchestration over the content stores. Holds no state of
/// its own between calls.
pub struct DynamicContentModel {
    repository: Arc<dyn DynamicContentRepository>,
    stats: Arc<dyn StatRepository>,
    assignments: Arc<dyn SlotAssignmentStore>,
    time_data: Arc<dyn TimeDataSource>,
    dispatcher: Arc<dyn EventDispatcher<DynamicContentEvent>>,
    translator: Arc<dyn Translator>,
    user: Arc<dyn UserContext>,
}

impl DynamicContentModel {
    pub fn new(parts: ModelParts) -> Self {
        Self {
            repository: parts.repository,
            stats: parts.stats,
            assignments: parts.assignments,
            time_data: parts.time_data,
            dispatcher: parts.dispatcher,
            translator: parts.translator,
            user: parts.user,
        }
    }

    /// Model whose every table lives in one [`InMemoryStore`].
    pub fn in_memory(
        store: Arc<InMemoryStore>,
        dispatcher: Arc<dyn EventDispatcher<DynamicContentEvent>>,
        translator: Arc<dyn Translator>,
        user: Arc<dyn UserContext>,
    ) -> Self {
        Self::new(ModelParts {
            repository: store.clone(),
            stats: store.clone(),
            assignments: store.clone(),
            time_data: store,
            dispatcher,
            translator,
            user,
        })
    }

    /// The content repository, with the model's translator attached.
    pub fn get_repository(&self) -> Arc<dyn DynamicContentRepository> {
        self.repository.set_translator(Arc::clone(&self.translator));
        Arc::clone(&self.repository)
    }

    pub fn get_stat_repository(&self) -> Arc<dyn StatRepository> {
        Arc::clone(&self.stats)
    }

    pub fn get_entity(&self, id: Uuid) -> CampaignResult<Option<DynamicContent>> {
        self.repository.get_entity(id)
    }

    /// Bind `entity` to a `dwc` form. A non-empty `action` is passed to the
    /// factory as the `action` option.
    pub fn create_form<F: FormFactory>(
        &self,
        entity: &ModelEntity,
        factory: &F,
        action: Option<&str>,
        mut options: FormOptions,
    ) -> CampaignResult<F::Form> {
        let content = entity.as_dynamic_content().ok_or_else(|| {
            CampaignError::InvalidArgument(format!(
                "Entity must be of class DynamicContent, got {}",
                entity.kind()
            ))
        })?;

        if let Some(action) = action.filter(|a| !a.is_empty()) {
            options.insert("action".to_string(), Value::String(action.to_string()));
        }

        factory.create(FORM_TYPE, content, options)
    }

    /// `(parent, variants)` for any member of a variant family.
    pub fn get_variants(&self, entity: &DynamicContent) -> (DynamicContent, Vec<DynamicContent>) {
        variants_of(entity)
    }

    /// Record that `lead` was shown `item` in `slot`, stamped with the current
    /// time at second precision.
    pub fn set_slot_content_for_lead(
        &self,
        item: &DynamicContent,
        lead: &Lead,
        slot: &str,
    ) -> CampaignResult<()> {
        let row = self.assignments.insert_assignment(
            lead.id,
            item.id,
            slot,
            stored_timestamp(Utc::now()).naive_utc(),
        )?;
        debug!(
            slot,
            lead_id = %lead.id,
            dynamic_content_id = %item.id,
            date_added = %row.date_added_string(),
            "assigned slot content"
        );
        Ok(())
    }

    pub fn get_slot_content_for_lead(
        &self,
        slot: &str,
        lead: &Lead,
    ) -> CampaignResult<Option<SlotContent>> {
        self.assignments.latest_slot_content(slot, lead.id)
    }

    pub fn create_stat_entry(
        &self,
        item: &DynamicContent,
        lead: &Lead,
        source: Option<&str>,
    ) -> CampaignResult<()> {
        self.create_stat_entry_with(
            item,
            lead,
            DeliverySource {
                source: source.map(str::to_string),
                ..Default::default()
            },
        )
        .map(|_| ())
    }

    /// Like [`create_stat_entry`](Self::create_stat_entry), also recording the
    /// container and source id. Returns the stored stat.
    pub fn create_stat_entry_with(
        &self,
        item: &DynamicContent,
        lead: &Lead,
        delivery: DeliverySource,
    ) -> CampaignResult<Stat> {
        let mut stat = Stat::new(item, lead, delivery.source, stored_timestamp(Utc::now()));
        stat.source_id = delivery.source_id;
        stat.container_id = delivery.container_id;

        let stat = self.stats.save_entity(stat)?;
        info!(
            stat_id = stat.id,
            dynamic_content_id = %item.id,
            lead_id = %lead.id,
            source = stat.source.as_deref().unwrap_or(""),
            "recorded dynamic content delivery"
        );
        Ok(stat)
    }

    /// Fire the lifecycle event for `action`.
    ///
    /// Returns `Ok(None)` for unknown actions and when nobody listens; no
    /// event is built in either case. Otherwise listeners run in order on
    /// `event` (or a fresh one) and the event is handed back.
    pub fn dispatch_event(
        &self,
        action: &str,
        entity: &ModelEntity,
        is_new: bool,
        event: Option<DynamicContentEvent>,
    ) -> CampaignResult<Option<DynamicContentEvent>> {
        let content = entity
            .as_dynamic_content()
            .ok_or_else(|| CampaignError::method_not_allowed([ENTITY_KIND]))?;
        let Some(action) = LifecycleAction::parse(action) else {
            return Ok(None);
        };
        self.dispatch_lifecycle(action, content, is_new, event)
    }

    fn dispatch_lifecycle(
        &self,
        action: LifecycleAction,
        content: &DynamicContent,
        is_new: bool,
        event: Option<DynamicContentEvent>,
    ) -> CampaignResult<Option<DynamicContentEvent>> {
        let name = action.event_name();
        if !self.dispatcher.has_listeners(name) {
            return Ok(None);
        }

        let mut event = event.unwrap_or_else(|| {
            let mut event = DynamicContentEvent::new(content.clone(), is_new);
            event.set_store(Arc::clone(&self.repository));
            event
        });
        debug!(action = action.as_str(), id = %content.id, is_new, "dispatching lifecycle event");
        self.dispatcher.dispatch(name, &mut event)?;
        Ok(Some(event))
    }

    /// Save with `pre_save` / `post_save` events around the write. Edits a
    /// `pre_save` listener makes to the entity are what gets stored.
    pub fn save_entity(&self, mut entity: DynamicContent) -> CampaignResult<DynamicContent> {
        let is_new = self.repository.get_entity(entity.id)?.is_none();
        let now = Utc::now();
        if is_new {
            entity.date_added.get_or_insert(now);
        } else {
            entity.date_modified = Some(now);
        }

        let pre_save = self.dispatch_lifecycle(LifecycleAction::PreSave, &entity, is_new, None)?;
        if let Some(event) = pre_save {
            entity = event.into_entity();
        }

        self.repository.save_entity(&entity)?;
        info!(id = %entity.id, name = %entity.name, is_new, "saved dynamic content");

        self.dispatch_lifecycle(LifecycleAction::PostSave, &entity, is_new, None)?;
        Ok(entity)
    }

    /// Delete with `pre_delete` / `post_delete` events around the write.
    pub fn delete_entity(&self, entity: &DynamicContent) -> CampaignResult<()> {
        self.dispatch_lifecycle(LifecycleAction::PreDelete, entity, false, None)?;
        self.get_repository().delete_entity(entity.id)?;
        info!(id = %entity.id, name = %entity.name, "deleted dynamic content");
        self.dispatch_lifecycle(LifecycleAction::PostDelete, entity, false, None)?;
        Ok(())
    }

    /// Restrict `query` to rows whose page was created by the current user.
    pub fn limit_query_to_creator(&self, query: TimeDataQuery) -> TimeDataQuery {
        query.with_owner(OwnerFilter {
            join_table: PAGES.to_string(),
            join_column: "container_id".to_string(),
            created_by: self.user.user_id(),
        })
    }

    /// Line chart of delivery hits between `date_from` and `date_to`.
    ///
    /// `filter["flag"]` picks the series (`total`, `unique`,
    /// `total_and_unique`; unset means total only) and is removed before the
    /// remaining entries are applied as column criteria. Unique hits collapse
    /// rows sharing a lead and a (whole-second) send time.
    pub fn get_hits_line_chart_data(
        &self,
        unit: TimeUnit,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        date_format: Option<&str>,
        mut filter: ChartFilter,
        can_view_others: bool,
    ) -> CampaignResult<ChartData> {
        let flag = match filter.remove("flag") {
            Some(value) => HitsFlag::from_filter_value(&value)?,
            None => None,
        };

        let mut chart = LineChart::new(unit, date_from, date_to, date_format);
        let query = chart.chart_query()?;

        if flag.map_or(true, HitsFlag::includes_total) {
            let mut q = query.prepare_time_data_query(DYNAMIC_CONTENT_STATS, "date_sent", &filter);
            if !can_view_others {
                q = self.limit_query_to_creator(q);
            }
            let data = query.load_and_build_time_data(self.time_data.as_ref(), &q)?;
            chart.set_dataset(self.translator.trans(TOTAL_VIEWS_KEY), data);
        }

        if flag.is_some_and(HitsFlag::includes_unique) {
            let mut q = query
                .prepare_time_data_query(DYNAMIC_CONTENT_STATS, "date_sent", &filter)
                .group_by(["lead_id", "date_sent"]);
            if !can_view_others {
                q = self.limit_query_to_creator(q);
            }
            let data = query.load_and_build_time_data(self.time_data.as_ref(), &q)?;
            chart.set_dataset(self.translator.trans(UNIQUE_VIEWS_KEY), data);
        }

        info!(
            ?unit,
            %date_from,
            %date_to,
            ?flag,
            can_view_others,
            "built dynamic content hits chart"
        );
        chart.render()
    }
}

/// `(parent, variants)`: a variant resolves to its parent and the parent's
/// children, a root to itself and its own children. Unloaded children are
/// treated as none.
pub fn variants_of(entity: &DynamicContent) -> (DynamicContent, Vec<DynamicContent>) {
    let parent = match &entity.variant_parent {
        Some(parent) => parent.as_ref(),
        None => entity,
    };
    let children = parent.variant_children.clone().unwrap_or_default();
    (parent.clone(), children)
}
