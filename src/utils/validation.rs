//! Input validation utilities

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    constants::MAX_SOURCE_CODE_LENGTH,
    error::{AppError, AppResult},
    models::Language,
};

/// Parse a language identifier, rejecting anything outside the supported set
pub fn parse_language(language: &str) -> AppResult<Language> {
    language
        .trim()
        .to_ascii_lowercase()
        .parse::<Language>()
        .map_err(|_: String| AppError::UnsupportedLanguage(language.to_string()))
}

/// Validate source code size
pub fn validate_source_code(code: &str) -> Result<(), String> {
    if code.trim().is_empty() {
        return Err("Source code cannot be empty".to_string());
    }
    if code.chars().count() > MAX_SOURCE_CODE_LENGTH {
        return Err(format!(
            "Source code exceeds maximum length of {} characters",
            MAX_SOURCE_CODE_LENGTH
        ));
    }
    Ok(())
}

static PYTHON_BLOCKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import|from)\s+(?:os|subprocess|socket|ctypes|multiprocessing)\b")
        .expect("valid regex")
});

static JAVA_BLOCKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Runtime\s*\.\s*getRuntime|ProcessBuilder|java\.net\.|java\.lang\.reflect")
        .expect("valid regex")
});

static NATIVE_BLOCKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:system|popen|fork|execv|execve|execl)\s*\(|#\s*include\s*<sys/socket\.h>")
        .expect("valid regex")
});

static JAVASCRIPT_BLOCKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"child_process|require\s*\(\s*['"](?:net|dgram|http|https|cluster)['"]\s*\)"#)
        .expect("valid regex")
});

/// Cheap early rejection of obviously hostile constructs.
///
/// Trivially bypassable; the sandbox is what actually contains submissions.
pub fn screen_source(language: Language, code: &str) -> Result<(), String> {
    let pattern = match language {
        Language::Python => &*PYTHON_BLOCKLIST,
        Language::Java => &*JAVA_BLOCKLIST,
        Language::C | Language::Cpp => &*NATIVE_BLOCKLIST,
        Language::JavaScript => &*JAVASCRIPT_BLOCKLIST,
    };

    match pattern.find(code) {
        Some(found) => Err(format!(
            "Source code uses a restricted construct: {}",
            found.as_str().trim()
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language_rejects_unknown() {
        assert_eq!(parse_language("cpp").unwrap(), Language::Cpp);
        assert!(matches!(
            parse_language("rust"),
            Err(AppError::UnsupportedLanguage(l)) if l == "rust"
        ));
        assert!(parse_language("invalid").is_err());
    }

    #[test]
    fn test_parse_language_normalises_case() {
        assert_eq!(parse_language(" Python ").unwrap(), Language::Python);
        assert!(matches!(
            parse_language("cobol"),
            Err(AppError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_validate_source_code() {
        assert!(validate_source_code("print(1)").is_ok());
        assert!(validate_source_code("   \n\t").is_err());
        assert!(validate_source_code(&"a".repeat(MAX_SOURCE_CODE_LENGTH)).is_ok());
        assert!(validate_source_code(&"a".repeat(MAX_SOURCE_CODE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_screen_source() {
        assert!(screen_source(Language::Python, "import subprocess\n").is_err());
        assert!(screen_source(Language::Python, "from socket import socket").is_err());
        assert!(screen_source(Language::Python, "import sys\nprint(input())").is_ok());

        assert!(screen_source(Language::Java, "Runtime.getRuntime().exec(\"ls\")").is_err());
        assert!(screen_source(Language::Cpp, "int main(){ system(\"ls\"); }").is_err());
        assert!(screen_source(Language::C, "int main(){ return 0; }").is_ok());

        assert!(screen_source(Language::JavaScript, "require('child_process')").is_err());
        assert!(screen_source(Language::JavaScript, "require(\"net\")").is_err());
        assert!(screen_source(Language::JavaScript, "console.log(1)").is_ok());
    }
}
