//! Control-plane client abstraction.
//!
//! The session depends on the `ControlPlaneClient` trait only, so tests can
//! drive it with an in-memory fake and the binary with `KubectlClient`.

mod kubectl;

pub use kubectl::{parse_pod_target, privileged_pod_manifest, KubectlClient, PodTarget};

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ClientError;

/// Everything needed to schedule the privileged helper pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegedPodSpec {
    pub node: String,
    pub container_name: String,
    pub image: String,
    /// Runtime socket on the node, mounted into the helper at the same path.
    pub socket_path: String,
    pub timeout: Duration,
    pub service_account: Option<String>,
    /// Schedule the helper pod itself in the host network namespace.
    pub host_network: bool,
}

/// A pod created by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub node: String,
}

/// Shared flag used to interrupt a streaming command.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Operations the capture session needs from the cluster.
pub trait ControlPlaneClient {
    /// Create the privileged pod and wait until it is ready.
    fn create_privileged_pod(&self, spec: &PrivilegedPodSpec) -> Result<Pod, ClientError>;

    /// Run `command` in a container of `pod`, streaming stdout into `sink`.
    ///
    /// Blocks until the remote process exits or `cancel` is set. Returns the
    /// exit code on success; a non-zero exit is reported as `ClientError::Exec`.
    fn execute_command(
        &self,
        pod: &Pod,
        container_name: &str,
        command: &[String],
        sink: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<i32, ClientError>;

    fn delete_pod(&self, pod: &Pod) -> Result<(), ClientError>;
}
