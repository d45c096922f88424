pub mod loader;
pub mod schema;

pub use loader::ConfigManager;
pub use schema::{PasteStyle, Settings, Snippet};
