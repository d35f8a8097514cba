pub mod config;
pub mod reconcile;
pub mod serve;
