pub mod api;
pub mod cli;
pub mod contact;
pub mod core;
pub mod error;
pub mod export;
pub mod state;
