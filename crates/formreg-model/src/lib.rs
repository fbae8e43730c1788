// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Registry model SSOT: deployment environments, template identifiers, and
//! the two registry records (form templates and PDF render templates).

mod deployment;
mod form;
mod pdf;

pub use deployment::{DeploymentStatus, DEPLOYMENT_PRIORITY_FLOOR};
pub use form::{FormTemplate, NewFormTemplate, TemplateId, ID_MAX_LEN};
pub use pdf::{NewPdfTemplate, PdfTemplate};

pub const CRATE_NAME: &str = "formreg-model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}
