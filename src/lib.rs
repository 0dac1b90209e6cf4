#![forbid(unsafe_code)]

pub mod build;
pub mod cache;
pub mod cli;
pub mod episode;
pub mod epub;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod narou;
pub mod range;
pub mod serve;
pub mod server;
