//! AuroraSync backup receiver
//!
//! Phones send an inventory of their files; the server answers with the
//! files it lacks or holds stale copies of, then stores the uploads and a
//! JSON metadata index keyed by relative path.

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod meta;
pub mod normalize;
pub mod plan;
pub mod receive;
pub mod server;
pub mod service;
pub mod wire;
