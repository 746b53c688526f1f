// Camera profile data model
use serde::{Deserialize, Serialize};

pub const UNKNOWN_CAMERA_FIELD: &str = "Unknown";
const DEFAULT_FOCAL_LENGTH: &str = "0";

/// Camera metadata tagged onto extracted frames.
///
/// Profiles arrive from the UI as a single `make,model,focalLength` line taken
/// verbatim from the camera list file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraProfile {
    pub make: String,
    pub model: String,
    /// Focal length in millimetres, kept as the token the list file gave
    pub focal_length: String,
}

impl Default for CameraProfile {
    fn default() -> Self {
        Self {
            make: UNKNOWN_CAMERA_FIELD.to_string(),
            model: UNKNOWN_CAMERA_FIELD.to_string(),
            focal_length: DEFAULT_FOCAL_LENGTH.to_string(),
        }
    }
}

impl CameraProfile {
    /// Parse a `make,model,focalLength` line. Missing or blank parts fall back
    /// to `Unknown` / `0`; a focal length that is present but not a finite,
    /// non-negative number is rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.split(',').map(str::trim);
        let mut profile = Self::default();

        if let Some(make) = parts.next().filter(|p| !p.is_empty()) {
            profile.make = make.to_string();
        }
        if let Some(model) = parts.next().filter(|p| !p.is_empty()) {
            profile.model = model.to_string();
        }
        if let Some(focal) = parts.next().filter(|p| !p.is_empty()) {
            let value: f64 = focal
                .parse()
                .map_err(|_| format!("Invalid focal length: {}", focal))?;
            if !value.is_finite() || value < 0.0 {
                return Err(format!("Invalid focal length: {}", focal));
            }
            profile.focal_length = focal.to_string();
        }

        Ok(profile)
    }

    /// Focal length as handed to the worker, unchanged from the input
    pub fn focal_length_arg(&self) -> &str {
        &self.focal_length
    }

    pub fn display_line(&self) -> String {
        format!("{},{},{}", self.make, self.model, self.focal_length_arg())
    }
}
