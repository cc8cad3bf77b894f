pub mod agent;
pub mod api;
pub mod bootstrap;
pub mod catalog;
pub mod cli;
pub mod prompt;
pub mod state;
