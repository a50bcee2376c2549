//! runtime environment selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// development or production.
///
/// production turns on secure cookies and makes forwarded-for headers
/// trusted for the client ip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RuntimeEnv {
    #[default]
    Development,
    Production,
}

impl RuntimeEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, RuntimeEnv::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeEnv::Development => "development",
            RuntimeEnv::Production => "production",
        }
    }
}

impl FromStr for RuntimeEnv {
    type Err = Error;

    /// accepts "", development, dev, production and prod, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "development" | "dev" => Ok(RuntimeEnv::Development),
            "production" | "prod" => Ok(RuntimeEnv::Production),
            _ => Err(Error::InvalidEnv(s.to_string())),
        }
    }
}

impl TryFrom<String> for RuntimeEnv {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RuntimeEnv> for String {
    fn from(env: RuntimeEnv) -> Self {
        env.as_str().to_string()
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_values() {
        for s in ["", "development", "dev", "DEV", "Development", "  dev "] {
            assert_eq!(s.parse::<RuntimeEnv>().unwrap(), RuntimeEnv::Development, "{s:?}");
        }
        for s in ["production", "prod", "PROD", "Production"] {
            assert_eq!(s.parse::<RuntimeEnv>().unwrap(), RuntimeEnv::Production, "{s:?}");
        }
    }

    #[test]
    fn test_rejects_unknown() {
        let err = "staging".parse::<RuntimeEnv>().unwrap_err();
        assert_eq!(err, Error::InvalidEnv("staging".to_string()));
        assert!("production2".parse::<RuntimeEnv>().is_err());
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&RuntimeEnv::Production).unwrap();
        assert_eq!(json, r#""production""#);
        let env: RuntimeEnv = serde_json::from_str(r#""prod""#).unwrap();
        assert!(env.is_production());
        assert!(serde_json::from_str::<RuntimeEnv>(r#""qa""#).is_err());
    }
}
