//! Command line surface for the metadata catalogue engine

pub mod cli;
pub mod logger;
