pub mod config;
pub mod error;
pub mod tool;

pub use error::{Error, Result};
