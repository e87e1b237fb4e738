//! Form binding seam. Rendering and submission handling live with the
//! caller's form layer; this crate only hands it the entity and options.

use std::collections::BTreeMap;

use campaign_core::CampaignResult;
use serde::Serialize;
use serde_json::Value;

use crate::entity::DynamicContent;

/// Form type identifier for dynamic content forms.
pub const FORM_TYPE: &str = "dwc";

pub type FormOptions = BTreeMap<String, Value>;

pub trait FormFactory {
    type Form;

    fn create(
        &self,
        form_type: &str,
        entity: &DynamicContent,
        options: FormOptions,
    ) -> CampaignResult<Self::Form>;
}

/// A form bound to an entity snapshot, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundForm {
    pub form_type: String,
    pub data: DynamicContent,
    pub options: FormOptions,
}

impl BoundForm {
    pub fn action(&self) -> Option<&str> {
        self.options.get("action").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundFormFactory;

impl FormFactory for BoundFormFactory {
    type Form = BoundForm;

    fn create(
        &self,
        form_type: &str,
        entity: &DynamicContent,
        options: FormOptions,
    ) -> CampaignResult<BoundForm> {
        Ok(BoundForm {
            form_type: form_type.to_string(),
            data: entity.clone(),
            options,
        })
    }
}
