//! Link security levels

use core::fmt;

/// Security level of a link, ordered from weakest to strongest
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    /// No security requested yet
    #[default]
    None,
    /// No encryption and no authentication
    Low,
    /// Encryption without authentication (no MITM protection)
    Medium,
    /// Encryption and authentication (MITM protection)
    High,
    /// Authenticated LE Secure Connections
    Fips,
}

impl SecurityLevel {
    /// Decode the numeric level reported by the host
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::Fips),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this level meets `required`
    pub fn satisfies(self, required: SecurityLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(SecurityLevel::Fips > SecurityLevel::High);
        assert!(SecurityLevel::High > SecurityLevel::Medium);
        assert!(SecurityLevel::Low > SecurityLevel::None);
        assert_eq!(SecurityLevel::default(), SecurityLevel::None);
    }

    #[test]
    fn test_satisfies() {
        assert!(SecurityLevel::Fips.satisfies(SecurityLevel::Fips));
        assert!(SecurityLevel::Fips.satisfies(SecurityLevel::Medium));
        assert!(!SecurityLevel::High.satisfies(SecurityLevel::Fips));
    }

    #[test]
    fn test_numeric_round_trip_of_known_levels() {
        assert_eq!(SecurityLevel::from_u8(4), Some(SecurityLevel::Fips));
        assert_eq!(SecurityLevel::Medium.as_u8(), 2);
        assert_eq!(SecurityLevel::from_u8(5), None);
    }
}
