//! Scribbly: a small community blog with posts, groups, comments and a follow feed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
