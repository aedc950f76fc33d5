//! Configuration module for Shelf-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shelf_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Checking for due jobs every {}s", config.scheduler.check_interval);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, RateLimitConfig, SchedulerConfig, SelectorConfig, SourceConfig, UserAgentConfig,
};

pub use parser::{load_config, load_config_with_overrides, parse_config, ConfigOverrides};
