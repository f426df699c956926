//! SNMP protocol version.

/// SNMP version as carried in the message `version` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V1,
    V2c,
    V3,
}

impl Version {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::V1),
            1 => Some(Self::V2c),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
            Self::V3 => 3,
        }
    }

    /// Whether messages of this version carry a community string.
    pub fn is_community(self) -> bool {
        matches!(self, Self::V1 | Self::V2c)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2c => write!(f, "v2c"),
            Self::V3 => write!(f, "v3"),
        }
    }
}

impl std::str::FromStr for Version {
    type Err = Box<crate::Error>;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Self::V1),
            "2c" | "v2c" | "2" | "v2" => Ok(Self::V2c),
            "3" | "v3" => Ok(Self::V3),
            _ => Err(crate::Error::Config(format!("unknown SNMP version '{s}'").into()).boxed()),
        }
    }
}
