pub mod config;
pub mod error;
pub mod scope;
pub mod types;

pub use config::AppConfig;
pub use error::{TimetableError, TimetableResult};
pub use scope::{ScopeFilter, ScopeParams};
