mod call_config;

pub use call_config::*;
