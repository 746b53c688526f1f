// Tauri command handlers - one file per domain
pub mod extraction;
pub mod selection;
pub mod settings;
