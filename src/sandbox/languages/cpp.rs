//! C++ language handler

use crate::{constants::container_images, models::Language};

use super::{LanguageHandler, SourceNaming};

/// Get handler for C++
pub fn handler() -> LanguageHandler {
    LanguageHandler {
        language: Language::Cpp,
        image: container_images::CPP,
        source_naming: SourceNaming::Fixed("solution.cpp"),
        compile_command: Some("g++ -O2 -std=c++17 -o solution {source}"),
        run_command: "./solution",
        limit_address_space: true,
    }
}
