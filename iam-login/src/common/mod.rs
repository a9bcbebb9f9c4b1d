pub mod arn;
pub mod config;
pub mod login;
pub mod types;

// Re-export everything for easy access
pub use arn::*;
pub use login::*;
pub use types::*;
