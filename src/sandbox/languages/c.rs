//! C language handler

use crate::{constants::container_images, models::Language};

use super::{LanguageHandler, SourceNaming};

/// Get handler for C
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::C,
        image: container_images::C,
        source_naming: SourceNaming::Fixed("solution.c"),
        compile_command: Some("gcc -O2 -std=c11 -o solution {source} -lm"),
        run_command: "./solution",
        limit_address_space: true,
    }
}
