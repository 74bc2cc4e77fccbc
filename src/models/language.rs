//! Submission language

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::languages;

/// Languages a submission may be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Java,
    JavaScript,
    Python,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::JavaScript,
        Language::Python,
    ];

    /// Get language identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => languages::C,
            Self::Cpp => languages::CPP,
            Self::Java => languages::JAVA,
            Self::JavaScript => languages::JAVASCRIPT,
            Self::Python => languages::PYTHON,
        }
    }

    /// Whether a separate compile step produces the runnable artifact
    pub fn is_compiled(&self) -> bool {
        matches!(self, Self::C | Self::Cpp | Self::Java)
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|language| language.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_match_constants() {
        let ids: Vec<&str> = Language::ALL.iter().map(Language::as_str).collect();
        assert_eq!(ids, languages::ALL);
    }

    #[test]
    fn test_parse() {
        assert_eq!("cpp".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!("javascript".parse::<Language>(), Ok(Language::JavaScript));
        assert!("rust".parse::<Language>().is_err());
        assert!("Python".parse::<Language>().is_err());
    }

    #[test]
    fn test_serde_uses_identifiers() {
        let json = serde_json::to_string(&Language::JavaScript).unwrap();
        assert_eq!(json, "\"javascript\"");
    }
}
