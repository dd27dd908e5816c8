pub mod config;
pub mod errors;

pub use config::SessionConfig;
pub use errors::SessionError;
