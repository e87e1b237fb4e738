pub mod config;
pub mod error;
pub mod event_bus;
pub mod i18n;
pub mod types;

pub use config::{AppConfig, StoreConfig};
pub use error::{CampaignError, CampaignResult};
pub use event_bus::{EventBus, EventDispatcher};
pub use i18n::{MessageCatalog, Translator};
pub use types::{AnonymousUser, CurrentUser, Lead, Page, UserContext};
