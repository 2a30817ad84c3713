pub mod config;
pub mod errors;
pub mod outcome;
pub mod parameters;

pub use config::*;
pub use errors::*;
pub use outcome::*;
pub use parameters::*;
