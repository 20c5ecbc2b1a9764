use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(TestCategory {
    Installation => "installation",
    Functional => "functional",
    Performance => "performance",
    Security => "security",
    DataIntegrity => "data_integrity",
    Integration => "integration",
});

str_enum!(RiskLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// GAMP-5 software category of the system under test.
///
/// Serialized as the bare integer code (`1`, `3`, `4`, `5`). Category 2 was
/// retired from GAMP-5 and is rejected like any other unknown code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GampCategory {
    /// Infrastructure software.
    Category1,
    /// Non-configured products.
    Category3,
    /// Configured products.
    Category4,
    /// Custom applications.
    Category5,
}

impl GampCategory {
    pub const ALL: [GampCategory; 4] = [
        Self::Category1,
        Self::Category3,
        Self::Category4,
        Self::Category5,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Self::Category1 => 1,
            Self::Category3 => 3,
            Self::Category4 => 4,
            Self::Category5 => 5,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ModelError> {
        match code {
            1 => Ok(Self::Category1),
            3 => Ok(Self::Category3),
            4 => Ok(Self::Category4),
            5 => Ok(Self::Category5),
            other => Err(ModelError::UnknownCategory(other.to_string())),
        }
    }

    /// Configured and custom software carry the data-integrity and security
    /// test obligations.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::Category4 | Self::Category5)
    }
}

impl TryFrom<u8> for GampCategory {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<GampCategory> for u8 {
    fn from(category: GampCategory) -> Self {
        category.code()
    }
}

impl std::str::FromStr for GampCategory {
    type Err = ModelError;

    /// Accepts `"4"`, `"category 4"`, `"Category4"` and `"gamp-4"` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        let prefix_ok = s
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .trim()
            .trim_end_matches(['-', '_'])
            .to_lowercase();
        if !matches!(prefix_ok.as_str(), "" | "category" | "cat" | "gamp") {
            return Err(ModelError::UnknownCategory(s.into()));
        }
        digits
            .parse::<u8>()
            .map_err(|_| ModelError::UnknownCategory(s.into()))
            .and_then(Self::from_code)
    }
}

impl fmt::Display for GampCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GAMP Category {}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_category_round_trips_through_str() {
        for s in ["installation", "functional", "performance", "security", "data_integrity", "integration"] {
            let parsed = TestCategory::from_str(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
    }

    #[test]
    fn test_category_rejects_unknown() {
        let err = TestCategory::from_str("smoke").unwrap_err();
        assert!(matches!(err, ModelError::InvalidEnum { .. }));
    }

    #[test]
    fn risk_level_serializes_snake_case() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: RiskLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, RiskLevel::Medium);
    }

    #[test]
    fn risk_level_rejects_capitalized() {
        assert!(serde_json::from_str::<RiskLevel>("\"High\"").is_err());
    }

    #[test]
    fn gamp_category_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&GampCategory::Category4).unwrap(), "4");
        let parsed: GampCategory = serde_json::from_str("5").unwrap();
        assert_eq!(parsed, GampCategory::Category5);
    }

    #[test]
    fn gamp_category_two_is_unknown() {
        assert!(serde_json::from_str::<GampCategory>("2").is_err());
        assert!(matches!(
            GampCategory::from_code(2),
            Err(ModelError::UnknownCategory(_))
        ));
    }

    #[test]
    fn gamp_category_parses_common_spellings() {
        assert_eq!(GampCategory::from_str("4").unwrap(), GampCategory::Category4);
        assert_eq!(GampCategory::from_str("Category 3").unwrap(), GampCategory::Category3);
        assert_eq!(GampCategory::from_str("gamp-5").unwrap(), GampCategory::Category5);
        assert!(GampCategory::from_str("level 4").is_err());
        assert!(GampCategory::from_str("").is_err());
    }

    #[test]
    fn only_configured_and_custom_are_high_risk() {
        assert!(!GampCategory::Category1.is_high_risk());
        assert!(!GampCategory::Category3.is_high_risk());
        assert!(GampCategory::Category4.is_high_risk());
        assert!(GampCategory::Category5.is_high_risk());
    }
}
