use campaign_core::{CampaignResult, Lead, Page};
use campaign_reporting::query::{unknown_column, QueryRow};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::DYNAMIC_CONTENT_STATS;

/// Storage format of assignment timestamps.
pub const DATE_ADDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamic content block. Items with a `variant_parent` are variants;
/// items without one are roots whose `variant_children` are their variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicContent {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
    #[serde(default)]
    pub publish_up: Option<DateTime<Utc>>,
    #[serde(default)]
    pub publish_down: Option<DateTime<Utc>>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub sent_count: u64,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variant_parent: Option<Box<DynamicContent>>,
    /// `None` when the children were never loaded.
    #[serde(default)]
    pub variant_children: Option<Vec<DynamicContent>>,
}

fn default_published() -> bool {
    true
}

impl DynamicContent {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            content: content.into(),
            is_published: true,
            publish_up: None,
            publish_down: None,
            language: None,
            sent_count: 0,
            created_by: None,
            date_added: None,
            date_modified: None,
            variant_parent: None,
            variant_children: None,
        }
    }

    /// A variant of `parent`. Only the parent's own fields are kept on the
    /// link, not its children.
    pub fn variant_of(
        parent: &DynamicContent,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut variant = Self::new(name, content);
        variant.variant_parent = Some(Box::new(parent.detached()));
        variant
    }

    pub fn is_variant(&self) -> bool {
        self.variant_parent.is_some()
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.variant_parent.as_ref().map(|p| p.id)
    }

    /// Copy of this item with the variant graph stripped.
    pub fn detached(&self) -> Self {
        Self {
            variant_parent: None,
            variant_children: None,
            ..self.clone()
        }
    }
}

/// Closed set of entities that can reach the model boundary. Operations
/// that only make sense for dynamic content reject the other variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEntity {
    DynamicContent(DynamicContent),
    Lead(Lead),
    Stat(Stat),
    Page(Page),
}

impl ModelEntity {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelEntity::DynamicContent(_) => "Dynamic Content",
            ModelEntity::Lead(_) => "Lead",
            ModelEntity::Stat(_) => "Stat",
            ModelEntity::Page(_) => "Page",
        }
    }

    pub fn as_dynamic_content(&self) -> Option<&DynamicContent> {
        match self {
            ModelEntity::DynamicContent(content) => Some(content),
            _ => None,
        }
    }
}

impl From<DynamicContent> for ModelEntity {
    fn from(value: DynamicContent) -> Self {
        ModelEntity::DynamicContent(value)
    }
}

impl From<Lead> for ModelEntity {
    fn from(value: Lead) -> Self {
        ModelEntity::Lead(value)
    }
}

impl From<Stat> for ModelEntity {
    fn from(value: Stat) -> Self {
        ModelEntity::Stat(value)
    }
}

impl From<Page> for ModelEntity {
    fn from(value: Page) -> Self {
        ModelEntity::Page(value)
    }
}

/// One "lead was shown this content in this slot" row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSlotAssignment {
    pub id: u64,
    pub lead_id: Uuid,
    pub dynamic_content_id: Uuid,
    pub slot: String,
    pub date_added: NaiveDateTime,
}

impl LeadSlotAssignment {
    pub fn date_added_string(&self) -> String {
        self.date_added.format(DATE_ADDED_FORMAT).to_string()
    }
}

/// `now` cut to whole seconds, the precision assignment and stat rows are
/// stored at. Unique hits rely on deliveries in the same second comparing
/// equal.
pub fn stored_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0).unwrap_or(now)
}

/// Result of a slot lookup: the content shown, not the assignment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotContent {
    pub id: Uuid,
    pub content: String,
}

/// One delivery of dynamic content to a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    #[serde(default)]
    pub id: u64,
    pub lead_id: Uuid,
    pub dynamic_content_id: Uuid,
    /// Page the content was delivered into; drives ownership filtering.
    #[serde(default)]
    pub container_id: Option<Uuid>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<i64>,
    pub date_sent: DateTime<Utc>,
}

impl Stat {
    pub fn new(
        content: &DynamicContent,
        lead: &Lead,
        source: Option<String>,
        date_sent: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            lead_id: lead.id,
            dynamic_content_id: content.id,
            container_id: None,
            source,
            source_id: None,
            date_sent,
        }
    }
}

impl QueryRow for Stat {
    fn column(&self, name: &str) -> CampaignResult<Option<String>> {
        let value = match name {
            "id" => Some(self.id.to_string()),
            "lead_id" => Some(self.lead_id.to_string()),
            "dynamic_content_id" => Some(self.dynamic_content_id.to_string()),
            "container_id" => self.container_id.map(|id| id.to_string()),
            "source" => self.source.clone(),
            "source_id" => self.source_id.map(|id| id.to_string()),
            "date_sent" => Some(self.date_sent.to_rfc3339()),
            other => return Err(unknown_column(DYNAMIC_CONTENT_STATS, other)),
        };
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_variant_link_is_detached() {
        let mut root = DynamicContent::new("Root", "<p>A</p>");
        root.variant_children = Some(vec![DynamicContent::new("Other", "x")]);

        let variant = DynamicContent::variant_of(&root, "B", "<p>B</p>");
        assert!(variant.is_variant());
        assert_eq!(variant.parent_id(), Some(root.id));
        assert!(variant.variant_parent.as_ref().unwrap().variant_children.is_none());
        assert!(!root.is_variant());
    }

    #[test]
    fn test_stored_timestamp_has_second_precision() {
        let second = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let ts = stored_timestamp(second + Duration::milliseconds(789));
        assert_eq!(ts, second);
        assert_eq!(stored_timestamp(second + Duration::nanoseconds(1)), ts);

        let row = LeadSlotAssignment {
            id: 1,
            lead_id: Uuid::new_v4(),
            dynamic_content_id: Uuid::new_v4(),
            slot: "hero".into(),
            date_added: ts.naive_utc(),
        };
        assert_eq!(row.date_added_string(), "2024-03-01 12:30:45");
    }

    #[test]
    fn test_model_entity_kind() {
        let content: ModelEntity = DynamicContent::new("A", "a").into();
        assert_eq!(content.kind(), "Dynamic Content");
        assert!(content.as_dynamic_content().is_some());

        let lead: ModelEntity = Lead::new(Uuid::new_v4()).into();
        assert_eq!(lead.kind(), "Lead");
        assert!(lead.as_dynamic_content().is_none());
    }

    #[test]
    fn test_stat_columns() {
        let item = DynamicContent::new("A", "a");
        let lead = Lead::new(Uuid::new_v4());
        let stat = Stat::new(&item, &lead, Some("email".into()), Utc::now());
        assert_eq!(stat.column("source").unwrap().as_deref(), Some("email"));
        assert_eq!(stat.column("lead_id").unwrap(), Some(lead.id.to_string()));
        assert_eq!(stat.column("container_id").unwrap(), None);
        assert!(stat.column("page_id").is_err());
    }
}
