pub mod catalog;
pub mod composer;
pub mod medium;
pub mod pipeline;
pub mod segmenter;

pub use catalog::PlatformCatalog;
pub use medium::ImageMediumType;
pub use pipeline::{ExtractionError, ExtractionSettings, StyleExtractor};
pub use segmenter::PlatformPrompts;
