use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("Monitor {index} not found ({available} available, indices start at 1)")]
    MonitorNotFound { index: usize, available: usize },

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Crop window {width}x{height} at ({x}, {y}) exceeds image bounds {image_width}x{image_height}")]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Failed to load icon {}: {source}", .path.display())]
    IconLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::IconLoad {
                source: image::ImageError::IoError(e),
                ..
            } => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_icon_load_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::IconLoad {
            path: PathBuf::from("paused_icon.png"),
            source: image::ImageError::IoError(io_err),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("paused_icon.png"));
    }

    #[test]
    fn test_monitor_not_found_message() {
        let err = Error::MonitorNotFound {
            index: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Monitor 3 not found (2 available, indices start at 1)"
        );
    }
}
