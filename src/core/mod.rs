pub mod config;
pub mod errors;
pub mod kernel;
pub mod traits;
