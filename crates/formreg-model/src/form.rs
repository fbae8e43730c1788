// SPDX-License-Identifier: Apache-2.0

use crate::{DeploymentStatus, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

pub const ID_MAX_LEN: usize = 64;

/// Registry row identifier. UUIDs in practice, but any short printable token
/// is accepted so pre-existing rows keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("template id must not be empty".to_string()));
        }
        if s.len() > ID_MAX_LEN {
            return Err(ValidationError(format!(
                "template id exceeds max length {ID_MAX_LEN}"
            )));
        }
        if !s.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError(
                "template id must be printable ascii".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for TemplateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full form-template row as served by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: TemplateId,
    pub version: Option<String>,
    pub ministry_id: Option<String>,
    pub last_modified: Option<String>,
    pub title: Option<String>,
    pub form_id: Option<String>,
    pub deployed_to: DeploymentStatus,
    pub data_sources: Option<Value>,
    pub data: Value,
    pub interface: Value,
    pub barcode: Option<Value>,
    pub pdf_template_id: Option<TemplateId>,
}

/// Normalized insert payload. Built by the wire layer from either accepted
/// payload shape; `data` and `interface` already carry their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFormTemplate {
    pub id: TemplateId,
    pub version: Option<String>,
    pub ministry_id: Option<String>,
    pub last_modified: Option<String>,
    pub title: Option<String>,
    pub form_id: Option<String>,
    pub deployed_to: DeploymentStatus,
    pub data_sources: Option<Value>,
    pub data: Value,
    pub interface: Value,
}
