pub mod blob;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod utils;

pub use config::Config;
pub use coordinator::Depot;
pub use error::{DepotError, Result};
