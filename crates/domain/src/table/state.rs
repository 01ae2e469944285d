//! Table availability.

use serde::{Deserialize, Serialize};

/// Availability of a table.
///
/// State transitions:
/// ```text
///             first sale / occupy
/// Available ─────────────────────────► Occupied ──┐ sale (append)
///     ▲  ▲                               │  ▲  ◄──┘
///     │  └──────── free (settle) ────────┘  │
///     │                                     │ sale / occupy (seat)
///     └──── free (settle) ──── Reserved ────┘
///                                 ▲
///            reserve (holds tab) ─┘ from Available or Occupied
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    /// Nobody is seated and no tab is open.
    #[default]
    Available,

    /// Customers are seated; the table holds a credential.
    Occupied,

    /// Held for an arriving party; any open tab is kept.
    Reserved,
}

impl Availability {
    /// Returns true if a table in this state holds a credential.
    pub fn has_credential(&self) -> bool {
        matches!(self, Availability::Occupied)
    }

    /// Returns true if a staff transition from this state to `target` is allowed.
    pub fn can_transition_to(&self, target: Availability) -> bool {
        *self != target
    }

    /// Returns true if a table in this state may be archived.
    pub fn can_archive(&self) -> bool {
        !matches!(self, Availability::Occupied)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "AVAILABLE",
            Availability::Occupied => "OCCUPIED",
            Availability::Reserved => "RESERVED",
        }
    }

    /// Numeric code used by the persistence layer.
    pub fn code(&self) -> i16 {
        match self {
            Availability::Available => 0,
            Availability::Occupied => 1,
            Availability::Reserved => 2,
        }
    }

    /// Decodes a persistence code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Availability::Available),
            1 => Some(Availability::Occupied),
            2 => Some(Availability::Reserved),
            _ => None,
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Availability; 3] = [
        Availability::Available,
        Availability::Occupied,
        Availability::Reserved,
    ];

    #[test]
    fn test_default_is_available() {
        assert_eq!(Availability::default(), Availability::Available);
    }

    #[test]
    fn test_only_occupied_holds_credential() {
        assert!(!Availability::Available.has_credential());
        assert!(Availability::Occupied.has_credential());
        assert!(!Availability::Reserved.has_credential());
    }

    #[test]
    fn test_self_transition_is_rejected() {
        for state in ALL {
            assert!(!state.can_transition_to(state));
            for target in ALL.into_iter().filter(|t| *t != state) {
                assert!(state.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_codes_round_trip() {
        for state in ALL {
            assert_eq!(Availability::from_code(state.code()), Some(state));
        }
        assert_eq!(Availability::from_code(3), None);
    }

    #[test]
    fn test_serializes_in_upper_case() {
        let json = serde_json::to_string(&Availability::Reserved).unwrap();
        assert_eq!(json, "\"RESERVED\"");
        let parsed: Availability = serde_json::from_str("\"OCCUPIED\"").unwrap();
        assert_eq!(parsed, Availability::Occupied);
    }
}
