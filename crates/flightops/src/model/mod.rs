//! Domain records for the fleet, its flights, and its maintenance history.
//!
//! These are plain data types. Derivation rules live in [`crate::mission`]
//! and [`crate::alerts`]; persistence lives in [`crate::storage`].

pub mod fleet;
pub mod flight;
pub mod maintenance;

use thiserror::Error;

pub use fleet::{
    normalize_tail_number, Account, Aircraft, AircraftStatus, Base, Crew, NewAircraft, NewBase,
    NewCrew, NewPilot, Pilot, Role,
};
pub use flight::{
    FlightDraft, FlightPatch, FlightRecord, MissionStatus, NewTelemetrySample, TelemetrySample,
};
pub use maintenance::{Alert, MaintenancePatch, MaintenanceRecord, NewMaintenanceRecord, Severity};

/// A stored or user-supplied string did not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// The enumeration being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum whose
/// stored form is a fixed lowercase name.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The stored and displayed name of this value.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::model::UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err($crate::model::UnknownVariant::new($kind, other)),
                }
            }
        }
    };
}

pub(crate) use text_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variant_display() {
        let err = UnknownVariant::new("severity", "critical");
        assert_eq!(err.to_string(), "unknown severity: \"critical\"");
    }

    #[test]
    fn test_text_enum_roundtrip_through_str() {
        for status in [MissionStatus::Active, MissionStatus::Completed] {
            assert_eq!(status.as_str().parse::<MissionStatus>().unwrap(), status);
        }
        assert!("landed".parse::<MissionStatus>().is_err());
    }
}
