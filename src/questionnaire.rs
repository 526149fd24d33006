use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_WEIGHT, MAX_WEIGHT, MIN_WEIGHT};
use crate::error::AdvisoryError;

/// How the client would like to be helped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ApproachPreference {
    SelfService,
    FullService,
    #[default]
    Hybrid,
}

impl ApproachPreference {
    pub const ALL: [ApproachPreference; 3] = [Self::SelfService, Self::FullService, Self::Hybrid];

    /// Form value, identical to the serde name.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SelfService => "self_service",
            Self::FullService => "full_service",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

impl fmt::Display for ApproachPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfService => write!(f, "Zelf doen (self-service)"),
            Self::FullService => write!(f, "Volledig uitbesteden (full service)"),
            Self::Hybrid => write!(f, "Hybride"),
        }
    }
}

/// Everything the form collects for one advice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionnaireInput {
    pub software: String,
    pub pain_points: Vec<String>,
    pub weights: BTreeMap<String, u8>,
    pub notes: String,
    pub approach: ApproachPreference,
}

impl QuestionnaireInput {
    /// Selected pain points, first occurrence wins.
    pub fn selected_pain_points(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.pain_points
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && seen.insert(*p))
            .collect()
    }

    /// Weight of a pain point, defaulting when absent and clamped into range.
    pub fn weight_of(&self, pain_point: &str) -> u8 {
        self.weights
            .get(pain_point)
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
            .clamp(MIN_WEIGHT, MAX_WEIGHT)
    }

    /// Selected pain points the user did not weigh explicitly.
    pub fn missing_weights(&self) -> Vec<&str> {
        self.selected_pain_points()
            .into_iter()
            .filter(|p| !self.weights.contains_key(*p))
            .collect()
    }

    /// Refuses generation when required fields are empty.
    pub fn validate(&self) -> Result<(), AdvisoryError> {
        let mut missing = Vec::new();
        if self.software.trim().is_empty() {
            missing.push("software".to_string());
        }
        if self.selected_pain_points().is_empty() {
            missing.push("pain_points".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AdvisoryError::InputIncomplete { missing })
        }
    }
}
