pub mod executor;
pub mod paths;
pub mod system_env;
