pub mod coordinator;
pub mod permission;
pub mod traits;
pub mod view_model;

pub use coordinator::{SessionCoordinator, SessionState};
pub use permission::{Permission, PermissionGate, PermissionProbe, PermissionStatus};
pub use traits::{CapturedRecording, OutputError, OutputSink, Recorder, RecorderError};
pub use view_model::{MessageKind, OverlayState, OverlayViewModel};
