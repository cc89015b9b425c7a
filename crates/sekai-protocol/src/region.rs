//! Game server regions.
//!
//! Each region is a separately operated deployment. Two account families
//! exist: `jp` and `en` authenticate with a numeric user id and a credential,
//! the remaining regions with an access token.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ClientError;

/// Game server region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Japan
    Jp,
    /// Global (English)
    En,
    /// Taiwan
    Tw,
    /// Korea
    Kr,
    /// China
    Cn,
}

/// Authentication shape used by a region's accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountFamily {
    /// Numeric user id plus credential
    Direct,
    /// Access token, user id resolved at login
    Token,
}

impl Region {
    /// Every known region
    pub const ALL: [Self; 5] = [Self::Jp, Self::En, Self::Tw, Self::Kr, Self::Cn];

    /// Lowercase identifier used in paths and config
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jp => "jp",
            Self::En => "en",
            Self::Tw => "tw",
            Self::Kr => "kr",
            Self::Cn => "cn",
        }
    }

    /// Uppercase tag used in logs and file names
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Jp => "JP",
            Self::En => "EN",
            Self::Tw => "TW",
            Self::Kr => "KR",
            Self::Cn => "CN",
        }
    }

    pub const fn family(self) -> AccountFamily {
        match self {
            Self::Jp | Self::En => AccountFamily::Direct,
            Self::Tw | Self::Kr | Self::Cn => AccountFamily::Token,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClientError::UnknownRegion(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        assert_eq!(Region::Jp.family(), AccountFamily::Direct);
        assert_eq!(Region::En.family(), AccountFamily::Direct);
        assert_eq!(Region::Tw.family(), AccountFamily::Token);
        assert_eq!(Region::Kr.family(), AccountFamily::Token);
        assert_eq!(Region::Cn.family(), AccountFamily::Token);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("jp".parse::<Region>().expect("jp"), Region::Jp);
        assert_eq!("KR".parse::<Region>().expect("kr"), Region::Kr);
        assert!("us".parse::<Region>().is_err());
        assert_eq!(Region::Tw.to_string(), "tw");
        assert_eq!(Region::Tw.tag(), "TW");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Region::En).expect("serialize");
        assert_eq!(json, "\"en\"");
        let region: Region = serde_json::from_str("\"cn\"").expect("deserialize");
        assert_eq!(region, Region::Cn);
    }
}
