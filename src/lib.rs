#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod bootstrap;
pub mod builder;
pub mod comments;
pub mod config;
pub mod data;
pub mod dom;
pub mod model;
pub mod placeholder;
pub mod posts;
pub mod surface;
pub mod toggle;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
