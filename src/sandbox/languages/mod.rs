//! Language-specific handlers for compilation and execution
//!
//! Each language is a data record: how its source file is named, the optional
//! compile command, the run command and the container image. Commands are
//! templates with `{source}`, `{stem}` and `{memory_mb}` placeholders.

pub mod c;
pub mod cpp;
pub mod java;
pub mod javascript;
pub mod python;

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::Language;

static REGISTRY: LazyLock<LanguageRegistry> = LazyLock::new(LanguageRegistry::default);

/// Shared registry with every supported language
pub fn registry() -> &'static LanguageRegistry {
    &REGISTRY
}

/// How the source file inside the workspace is named
#[derive(Debug, Clone, Copy)]
pub enum SourceNaming {
    /// Always the same file name
    Fixed(&'static str),
    /// Derived from the source text
    Derived(fn(&str) -> String),
}

/// Language handler for compilation and execution
#[derive(Debug, Clone)]
pub struct LanguageHandler {
    pub language: Language,
    pub image: &'static str,
    pub source_naming: SourceNaming,
    pub compile_command: Option<&'static str>,
    pub run_command: &'static str,
    /// Apply `RLIMIT_AS`; runtimes that reserve large virtual ranges opt out
    /// and bound their heap through `{memory_mb}` instead
    pub limit_address_space: bool,
}

impl LanguageHandler {
    /// Get the source file name for this source text
    pub fn source_file(&self, source: &str) -> String {
        match self.source_naming {
            SourceNaming::Fixed(name) => name.to_string(),
            SourceNaming::Derived(name) => name(source),
        }
    }

    /// Get the compile command (if needed)
    pub fn compile_command(&self, source_file: &str, memory_limit_mb: u64) -> Option<String> {
        self.compile_command
            .map(|template| render(template, source_file, memory_limit_mb))
    }

    /// Get the run command
    pub fn run_command(&self, source_file: &str, memory_limit_mb: u64) -> String {
        render(self.run_command, source_file, memory_limit_mb)
    }
}

fn render(template: &str, source_file: &str, memory_limit_mb: u64) -> String {
    let stem = source_file
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(source_file);

    template
        .replace("{source}", source_file)
        .replace("{stem}", stem)
        .replace("{memory_mb}", &memory_limit_mb.to_string())
}

/// Language identifier to handler table
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    handlers: HashMap<Language, LanguageHandler>,
}

impl LanguageRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) a handler
    pub fn register(&mut self, handler: LanguageHandler) -> &mut Self {
        self.handlers.insert(handler.language, handler);
        self
    }

    /// Get handler for a specific language
    pub fn get(&self, language: Language) -> Option<&LanguageHandler> {
        self.handlers.get(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.handlers.keys().copied()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(c::handler())
            .register(cpp::handler())
            .register(java::handler())
            .register(javascript::handler())
            .register(python::handler());
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_language_is_registered() {
        for language in Language::ALL {
            let handler = registry().get(language).expect("handler registered");
            assert_eq!(handler.language, language);
            assert_eq!(handler.compile_command.is_some(), language.is_compiled());
        }
    }

    #[test]
    fn test_render_placeholders() {
        let rendered = render("java -Xmx{memory_mb}m -cp . {stem} < {source}", "Main.java", 256);
        assert_eq!(rendered, "java -Xmx256m -cp . Main < Main.java");
    }

    #[test]
    fn test_cpp_commands() {
        let handler = registry().get(Language::Cpp).unwrap();
        let file = handler.source_file("int main() {}");
        assert_eq!(file, "solution.cpp");
        assert_eq!(
            handler.compile_command(&file, 256).unwrap(),
            "g++ -O2 -std=c++17 -o solution solution.cpp"
        );
        assert_eq!(handler.run_command(&file, 256), "./solution");
    }
}
