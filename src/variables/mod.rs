pub mod builtins;

pub use builtins::expand_placeholders;
