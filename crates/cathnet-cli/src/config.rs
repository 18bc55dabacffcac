mod builder;
mod defaults;
mod file;

pub use builder::build_run_config;
