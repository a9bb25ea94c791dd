//! 配置与文件格式

pub mod format;
pub mod settings;

pub use settings::Settings;
