use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-query consistency requirement. Passed through to the node untouched;
/// the client attaches no meaning to it beyond the wire code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    #[default]
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl ConsistencyLevel {
    pub const ALL_LEVELS: [ConsistencyLevel; 11] = [
        ConsistencyLevel::Any,
        ConsistencyLevel::One,
        ConsistencyLevel::Two,
        ConsistencyLevel::Three,
        ConsistencyLevel::Quorum,
        ConsistencyLevel::All,
        ConsistencyLevel::LocalQuorum,
        ConsistencyLevel::EachQuorum,
        ConsistencyLevel::Serial,
        ConsistencyLevel::LocalSerial,
        ConsistencyLevel::LocalOne,
    ];

    pub fn code(self) -> u16 {
        match self {
            ConsistencyLevel::Any => 0x0000,
            ConsistencyLevel::One => 0x0001,
            ConsistencyLevel::Two => 0x0002,
            ConsistencyLevel::Three => 0x0003,
            ConsistencyLevel::Quorum => 0x0004,
            ConsistencyLevel::All => 0x0005,
            ConsistencyLevel::LocalQuorum => 0x0006,
            ConsistencyLevel::EachQuorum => 0x0007,
            ConsistencyLevel::Serial => 0x0008,
            ConsistencyLevel::LocalSerial => 0x0009,
            ConsistencyLevel::LocalOne => 0x000A,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL_LEVELS.iter().copied().find(|level| level.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "ANY",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::All => "ALL",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::EachQuorum => "EACH_QUORUM",
            ConsistencyLevel::Serial => "SERIAL",
            ConsistencyLevel::LocalSerial => "LOCAL_SERIAL",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL_LEVELS
            .iter()
            .copied()
            .find(|level| level.as_str() == upper)
            .ok_or_else(|| format!("unknown consistency level: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::ConsistencyLevel;

    #[test]
    fn codes_are_unique_and_reversible() {
        for level in ConsistencyLevel::ALL_LEVELS {
            assert_eq!(ConsistencyLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(ConsistencyLevel::from_code(0x00FF), None);
    }

    #[test]
    fn parses_cql_spelling() {
        assert_eq!("quorum".parse::<ConsistencyLevel>(), Ok(ConsistencyLevel::Quorum));
        assert_eq!(
            "LOCAL_ONE".parse::<ConsistencyLevel>(),
            Ok(ConsistencyLevel::LocalOne)
        );
        assert!("most".parse::<ConsistencyLevel>().is_err());
    }

    #[test]
    fn deserializes_from_toml() {
        #[derive(serde::Deserialize)]
        struct Holder {
            level: ConsistencyLevel,
        }
        let holder: Holder = toml::from_str("level = \"EACH_QUORUM\"").expect("parse");
        assert_eq!(holder.level, ConsistencyLevel::EachQuorum);
    }
}
