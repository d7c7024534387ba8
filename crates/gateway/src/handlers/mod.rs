//! API handlers module

pub mod documents;
pub mod health;
pub mod query;
pub mod root;
pub mod stats;
