//! Corpus text handling, paths and configuration

pub mod config;
pub mod paths;
pub mod text;
