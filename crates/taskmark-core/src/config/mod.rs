//! Task manifest configuration

mod assemble;
pub mod defaults;
mod loader;
mod types;
pub mod validation;

pub use assemble::*;
pub use defaults::*;
pub use loader::*;
pub use types::*;
pub use validation::*;
