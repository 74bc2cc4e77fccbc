//! Java language handler
//!
//! `javac` insists the file name matches the public class, so the source file
//! is named after the first `public class` declaration that starts a line.

use std::sync::LazyLock;

use regex::Regex;

use crate::{constants::container_images, models::Language};

use super::{LanguageHandler, SourceNaming};

const DEFAULT_CLASS: &str = "Solution";

static PUBLIC_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*public\s+(?:final\s+|abstract\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("valid regex")
});

/// Get handler for Java
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Java,
        image: container_images::JAVA,
        source_naming: SourceNaming::Derived(source_file),
        compile_command: Some("javac -encoding UTF-8 {source}"),
        run_command: "java -Xmx{memory_mb}m -Xss64m -cp . {stem}",
        limit_address_space: false,
    }
}

/// Name of the public class, or `Solution` when there is none
pub fn class_name(source: &str) -> &str {
    PUBLIC_CLASS
        .captures(source)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_CLASS)
}

fn source_file(source: &str) -> String {
    format!("{}.java", class_name(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_detection() {
        assert_eq!(class_name("public class Main { }"), "Main");
        assert_eq!(class_name("public final class Fast{}"), "Fast");
        assert_eq!(class_name("class Hidden {}"), "Solution");
        assert_eq!(class_name("import java.io.*;\n    public class Indented {}"), "Indented");
    }

    #[test]
    fn test_mentions_before_the_declaration_are_ignored() {
        let source = "// public class Fake\n\
                      /* see public class Other */\n\
                      public class Main {\n\
                      \x20   String s = \"public class Quoted\";\n\
                      }";
        assert_eq!(class_name(source), "Main");

        let quoted_first = "class Helper { String s = \"public class Quoted\"; }\npublic class Main {}";
        assert_eq!(class_name(quoted_first), "Main");
    }

    #[test]
    fn test_commands_follow_class_name() {
        let handler = handler();
        let file = handler.source_file("import java.util.*;\npublic class Main {}");
        assert_eq!(file, "Main.java");
        assert_eq!(
            handler.run_command(&file, 256),
            "java -Xmx256m -Xss64m -cp . Main"
        );
    }
}
