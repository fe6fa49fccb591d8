//! podsniff - capture pod or node traffic without tooling in the target.
//!
//! A privileged helper pod is scheduled on the target's node. From there a
//! runtime-specific script starts a short-lived tcpdump container inside the
//! target's network namespace (or the host's) and streams pcap data back.

pub mod config;
pub mod error;
pub mod kube;
pub mod runtime;
pub mod session;
pub mod utils;

pub use config::{CaptureSettings, CaptureTarget, Config, Setting};
pub use error::{BridgeError, ClientError, ConfigError, SessionError};
pub use kube::{CancelFlag, ControlPlaneClient, KubectlClient};
pub use runtime::{bridge_for, ContainerRuntimeBridge, RuntimeDefaults, RuntimeKind};
pub use session::{CaptureSession, SessionState};
