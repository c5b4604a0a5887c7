pub mod archive;
pub mod document;
pub mod enums;
pub mod filters;
pub mod retention;

pub use archive::*;
pub use document::*;
pub use filters::*;
pub use retention::*;
