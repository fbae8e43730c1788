// SPDX-License-Identifier: Apache-2.0

use crate::TemplateId;
use serde::{Deserialize, Serialize};

/// Registry row for a binary render template stored in PETS. The bytes live
/// in PETS; the registry keeps the handle (`template_uuid`) plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfTemplate {
    pub id: TemplateId,
    pub name: String,
    pub version: String,
    pub template_uuid: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPdfTemplate {
    pub name: String,
    pub version: String,
    pub template_uuid: String,
    pub notes: Option<String>,
}
