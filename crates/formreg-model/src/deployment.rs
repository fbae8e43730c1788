// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Priority value assigned to versions not deployed anywhere. Lower values
/// outrank higher ones when resolving the effective version of a form.
pub const DEPLOYMENT_PRIORITY_FLOOR: u8 = 4;

/// Environment a form-template version is currently deployed to.
///
/// Stored as `""`/`"dev"`/`"test"`/`"prod"`; the empty string means the
/// version is registered but not serving any environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeploymentStatus {
    #[default]
    None,
    Dev,
    Test,
    Prod,
}

impl DeploymentStatus {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "" | "none" => Ok(Self::None),
            "dev" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "prod" => Ok(Self::Prod),
            other => Err(ValidationError(format!(
                "unknown deployment environment: {other}"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }

    /// Resolution rank: prod=1, test=2, dev=3, none=4.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::Prod => 1,
            Self::Test => 2,
            Self::Dev => 3,
            Self::None => DEPLOYMENT_PRIORITY_FLOOR,
        }
    }

    /// True for dev/test/prod, false for the unset tag.
    #[must_use]
    pub fn is_environment(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl Display for DeploymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for DeploymentStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeploymentStatus> for String {
    fn from(value: DeploymentStatus) -> Self {
        value.as_str().to_string()
    }
}
