use crate::error::{Result, SalesCountError};
use crate::schema::AdvisorConfig;
use crate::utils::normalize_advisor_code;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdvisorType {
    /// House accounts and employees.
    Internal,
    /// Independent agents.
    External,
    /// Third-party channels.
    Brokered,
}

impl AdvisorType {
    pub const ALL: [AdvisorType; 3] = [
        AdvisorType::Internal,
        AdvisorType::External,
        AdvisorType::Brokered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisorType::Internal => "INTERNAL",
            AdvisorType::External => "EXTERNAL",
            AdvisorType::Brokered => "BROKERED",
        }
    }
}

impl fmt::Display for AdvisorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdvisorType {
    type Err = SalesCountError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "INTERNAL" => Ok(AdvisorType::Internal),
            "EXTERNAL" => Ok(AdvisorType::External),
            "BROKERED" => Ok(AdvisorType::Brokered),
            _ => Err(SalesCountError::InvalidAdvisorType(s.to_string())),
        }
    }
}

/// Resolves advisor codes to advisor types.
///
/// Lookups go through [`normalize_advisor_code`], so `"123"`, `"00123"` and
/// `"0000123"` all hit the same entry. Reserved house codes win over the
/// caller's mapping, and codes missing from the mapping are `External`.
#[derive(Debug, Clone, Default)]
pub struct AdvisorDirectory {
    labels: HashMap<String, String>,
    reserved: HashSet<String>,
}

impl AdvisorDirectory {
    pub fn new(advisor_types: &HashMap<String, String>, config: &AdvisorConfig) -> Self {
        let labels = advisor_types
            .iter()
            .filter_map(|(code, label)| {
                normalize_advisor_code(code).map(|normalized| (normalized, label.clone()))
            })
            .collect();

        let reserved = config
            .reserved_codes
            .iter()
            .filter_map(|code| normalize_advisor_code(code))
            .collect();

        Self { labels, reserved }
    }

    pub fn from_map(advisor_types: &HashMap<String, String>) -> Self {
        Self::new(advisor_types, &AdvisorConfig::default())
    }

    pub fn is_reserved(&self, normalized_code: &str) -> bool {
        self.reserved.contains(normalized_code)
    }

    /// Returns `None` only when the mapping holds a label that is not one of the
    /// three advisor types.
    pub fn classify(&self, advisor_code: Option<&str>) -> Option<AdvisorType> {
        let Some(code) = advisor_code.and_then(normalize_advisor_code) else {
            return Some(AdvisorType::External);
        };

        if self.is_reserved(&code) {
            return Some(AdvisorType::Internal);
        }

        match self.labels.get(&code) {
            Some(label) => match label.parse::<AdvisorType>() {
                Ok(advisor_type) => Some(advisor_type),
                Err(e) => {
                    debug!("Advisor {} left out of advisor-type buckets: {}", code, e);
                    None
                }
            },
            None => Some(AdvisorType::External),
        }
    }
}
