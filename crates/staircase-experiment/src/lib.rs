//! Staircase Experiment: the interactive front end for staircase runs.
//!
//! This crate wraps the kernel with:
//! - Terminal prompts and a judgment source reading operator answers
//! - An interactive builder for experiment configuration files
//! - CSV/JSON archival and SVG plots of each staircase's trajectory

pub mod builder;
pub mod plot;
pub mod prompt;
pub mod results;
