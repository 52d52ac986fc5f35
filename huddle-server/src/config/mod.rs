mod coordinator_config;

pub use coordinator_config::*;
