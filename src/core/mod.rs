pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod stats;
pub mod collection;
pub mod concurrent;
pub mod transaction;
