//! JavaScript (Node.js) language handler

use crate::{constants::container_images, models::Language};

use super::{LanguageHandler, SourceNaming};

/// Get handler for JavaScript
///
/// V8 reserves far more address space than it uses, so the heap is capped
/// with `--max-old-space-size` rather than `RLIMIT_AS`.
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::JavaScript,
        image: container_images::JAVASCRIPT,
        source_naming: SourceNaming::Fixed("solution.js"),
        compile_command: None,
        run_command: "node --max-old-space-size={memory_mb} {source}",
        limit_address_space: false,
    }
}
