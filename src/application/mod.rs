//! Services between the HTTP layer and the store.

pub mod accounts;
pub mod error;
pub mod feed;
pub mod follow;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod repos;
