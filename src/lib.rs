pub mod config;
pub mod connect;
pub mod error;
pub mod load;
pub mod schema;
pub mod verify;

pub use config::Config;
pub use error::{PipelineError, Result};
