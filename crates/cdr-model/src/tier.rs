//! Dataset tiers of the curation pipeline.
//!
//! Each tier corresponds to a distinct dataset in the warehouse. Data moves
//! from the raw submission tiers (RDR, EHR) through the unioned and combined
//! datasets into the de-identified registered and controlled tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A named stage of the data pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Participant-provided survey and physical measurement data.
    Rdr,
    /// Electronic health record submissions from a single site.
    Ehr,
    /// EHR submissions unioned across all sites.
    Unioned,
    /// RDR and unioned EHR data merged into one dataset.
    Combined,
    RegisteredTierDeid,
    RegisteredTierDeidBase,
    RegisteredTierDeidClean,
    RegisteredTierFitbit,
    ControlledTierDeid,
    ControlledTierDeidBase,
    ControlledTierDeidClean,
    ControlledTierFitbit,
    /// Wearable device data before de-identification.
    Fitbit,
    Synthetic,
}

impl Tier {
    /// All tiers in pipeline order.
    pub const ALL: [Tier; 14] = [
        Tier::Rdr,
        Tier::Ehr,
        Tier::Unioned,
        Tier::Combined,
        Tier::RegisteredTierDeid,
        Tier::RegisteredTierDeidBase,
        Tier::RegisteredTierDeidClean,
        Tier::RegisteredTierFitbit,
        Tier::ControlledTierDeid,
        Tier::ControlledTierDeidBase,
        Tier::ControlledTierDeidClean,
        Tier::ControlledTierFitbit,
        Tier::Fitbit,
        Tier::Synthetic,
    ];

    /// Returns the canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Rdr => "rdr",
            Tier::Ehr => "ehr",
            Tier::Unioned => "unioned",
            Tier::Combined => "combined",
            Tier::RegisteredTierDeid => "registered_tier_deid",
            Tier::RegisteredTierDeidBase => "registered_tier_deid_base",
            Tier::RegisteredTierDeidClean => "registered_tier_deid_clean",
            Tier::RegisteredTierFitbit => "registered_tier_fitbit",
            Tier::ControlledTierDeid => "controlled_tier_deid",
            Tier::ControlledTierDeidBase => "controlled_tier_deid_base",
            Tier::ControlledTierDeidClean => "controlled_tier_deid_clean",
            Tier::ControlledTierFitbit => "controlled_tier_fitbit",
            Tier::Fitbit => "fitbit",
            Tier::Synthetic => "synthetic",
        }
    }

    /// Returns true for tiers produced by de-identification.
    pub fn is_deidentified(&self) -> bool {
        matches!(
            self,
            Tier::RegisteredTierDeid
                | Tier::RegisteredTierDeidBase
                | Tier::RegisteredTierDeidClean
                | Tier::RegisteredTierFitbit
                | Tier::ControlledTierDeid
                | Tier::ControlledTierDeidBase
                | Tier::ControlledTierDeidClean
                | Tier::ControlledTierFitbit
        )
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ModelError;

    /// Parses a tier name, case-insensitive, accepting `-` in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownTier(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_loose_names() {
        assert_eq!("combined".parse::<Tier>(), Ok(Tier::Combined));
        assert_eq!("COMBINED".parse::<Tier>(), Ok(Tier::Combined));
        assert_eq!(
            "controlled-tier-deid".parse::<Tier>(),
            Ok(Tier::ControlledTierDeid)
        );
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let err = "staging".parse::<Tier>().unwrap_err();
        assert_eq!(err, ModelError::UnknownTier("staging".to_string()));
    }

    #[test]
    fn display_round_trips_every_tier() {
        for tier in Tier::ALL {
            assert_eq!(tier.to_string().parse::<Tier>(), Ok(tier));
        }
    }

    #[test]
    fn deid_tiers() {
        assert!(Tier::RegisteredTierDeid.is_deidentified());
        assert!(!Tier::Combined.is_deidentified());
    }
}
