//! @APIVersion 2.0.0
//! @APITitle Rust shop

pub mod api;
pub mod models;
