pub mod content;
pub mod document;
pub mod fonts;
pub mod resources;
pub mod template;

pub use document::compose;
pub use template::write_default_template;
