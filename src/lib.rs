pub mod core {
    pub mod model;
    pub mod config;
    pub mod style;
    pub mod layout;
    pub mod content;
    pub mod hierarchy;
    pub mod section;
    pub mod template;
    pub mod writer;
    pub mod assembler;
}

pub mod utils {
    pub mod artifact_store;
    pub mod image_fetcher;
}

pub mod error;

pub use crate::core::assembler::DocumentAssembler;
pub use crate::core::config::{Presets, RenderConfig};
pub use crate::core::model::{ContentItem, GenerateRequest, Section};
pub use crate::error::{Error, Result};
