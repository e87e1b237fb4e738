use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A contact/prospect record. Only the identifier matters to the content
/// and reporting layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl Lead {
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None }
    }
}

/// A landing page; the container content is delivered into. Reporting
/// uses its creator for ownership checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// The authenticated user a request runs as.
pub trait UserContext: Send + Sync {
    /// `None` for anonymous requests.
    fn user_id(&self) -> Option<Uuid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
}

impl CurrentUser {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl UserContext for CurrentUser {
    fn user_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousUser;

impl UserContext for AnonymousUser {
    fn user_id(&self) -> Option<Uuid> {
        None
    }
}
