/*!
 * Capture Agent Library
 *
 * Window discovery, frame and audio capture, and the filesystem hand-off to
 * a downstream processing consumer.
 */

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod session;
pub mod signal;
pub mod validation;
pub mod video;

// Re-export commonly used types
pub use audio::{AudioBackend, AudioCaptureWorker, AudioClip, AudioConfig, AudioFormat};
pub use capture::{
    CaptureRegion, CaptureRegionSelector, FrameCaptureWorker, PreviewRect, WindowBackend,
    WindowDetector, WindowInfo,
};
pub use config::AgentConfig;
pub use error::{CaptureError, CaptureResult};
pub use platform::PlatformAdapter;
pub use session::{
    CaptureSession, ProcessingReport, ProcessingStatus, SessionEvent, SessionFileStore,
    SessionState, SessionStatus,
};
pub use video::{FrameEncoder, FrameFormat};
