pub mod constants;
pub mod settings;

pub use settings::{LogFormat, Settings, SettingsError};
