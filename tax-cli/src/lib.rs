//! `mtax`: command-line front end for the household declaration engine.

pub mod app;
pub mod cli;
pub mod config;
pub mod output;
