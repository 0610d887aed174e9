//! Completion and selection for Java sources, including sources that do not
//! parse cleanly.

pub mod completion;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod request;
pub mod selection;
pub mod syntax;

#[cfg(test)]
mod testing;

pub use config::AssistConfig;
pub use error::EngineError;
pub use request::Request;
