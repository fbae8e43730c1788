// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Response body for create/update operations: the affected row id plus a
/// human-readable confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatedResponseDto {
    pub id: String,
    pub message: String,
}

impl CreatedResponseDto {
    #[must_use]
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Request body for `PUT /api/forms/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDeploymentDto {
    pub form_id: String,
    pub id: String,
    pub deployed_to: String,
    #[serde(default)]
    pub pdf_template_id: Option<String>,
}
