// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod dto;
mod error_mapping;
mod errors;
mod normalize;

pub use dto::{CreatedResponseDto, UpdateDeploymentDto};
pub use error_mapping::{map_error, ApiErrorMapping};
pub use errors::{ApiError, ApiErrorCode};
pub use normalize::normalize_form_payload;

pub const CRATE_NAME: &str = "formreg-api";
