// src/lib.rs

pub mod config;
pub mod corrections;
pub mod error;
pub mod server;
pub mod store;
pub mod table;
