//! Python language handler

use crate::{constants::container_images, models::Language};

use super::{LanguageHandler, SourceNaming};

/// Get handler for Python 3 (interpreted, no compile step)
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Python,
        image: container_images::PYTHON,
        source_naming: SourceNaming::Fixed("solution.py"),
        compile_command: None,
        run_command: "python3 -B {source}",
        limit_address_space: true,
    }
}
