//! Configuration system for clkeep

pub mod defaults;
mod links;
mod settings;
mod types;
pub mod validation;

pub use links::*;
pub use settings::*;
pub use types::*;
pub use validation::*;
