pub mod claim;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod store;
pub mod types;

pub use error::{Result, WoodlinkError};
