//! Domain types shared across the crate

mod id;

pub use id::{TaskId, generate_id};
