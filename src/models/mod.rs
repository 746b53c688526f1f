// Data models (structs)
pub mod camera_profile;
pub mod extraction_job;
pub mod settings;

pub use camera_profile::*;
pub use extraction_job::*;
pub use settings::*;
