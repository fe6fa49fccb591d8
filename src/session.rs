//! Capture session lifecycle.
//!
//! A session provisions one privileged pod on the target node, runs the
//! bridge-generated capture command in it, and tears everything down.
//! The three steps run strictly in order: `setup`, `start`, `cleanup`.

use std::fmt;
use std::io::{self, Write};

use tracing::{error, info, warn};

use crate::config::{CaptureSettings, CaptureTarget};
use crate::error::SessionError;
use crate::kube::{CancelFlag, ControlPlaneClient, Pod, PrivilegedPodSpec};
use crate::runtime::{CaptureCommand, ContainerRuntimeBridge, FilterQuoting};

/// Name of the helper container inside the privileged pod.
pub const PRIVILEGED_CONTAINER_NAME: &str = "podsniff-privileged";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    PodProvisioned,
    Capturing,
    TornDown,
}

impl SessionState {
    fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::PodProvisioned => "pod provisioned",
            SessionState::Capturing => "capturing",
            SessionState::TornDown => "torn down",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Images and socket after defaults were filled in from the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub helper_image: String,
    pub capture_image: String,
    pub socket_path: String,
}

/// One capture from a pod or a whole node.
pub struct CaptureSession<'a> {
    settings: CaptureSettings,
    client: &'a dyn ControlPlaneClient,
    bridge: Box<dyn ContainerRuntimeBridge>,
    resolved: Option<ResolvedSettings>,
    pod: Option<Pod>,
    state: SessionState,
}

impl<'a> CaptureSession<'a> {
    pub fn new(
        settings: CaptureSettings,
        client: &'a dyn ControlPlaneClient,
        bridge: Box<dyn ContainerRuntimeBridge>,
    ) -> Self {
        Self {
            settings,
            client,
            bridge,
            resolved: None,
            pod: None,
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// The privileged pod, while it exists.
    pub fn pod(&self) -> Option<&Pod> {
        self.pod.as_ref()
    }

    pub fn resolved(&self) -> Option<&ResolvedSettings> {
        self.resolved.as_ref()
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                state: self.state.as_str(),
            })
        }
    }

    /// Resolve defaults and create the privileged pod on the target node.
    ///
    /// On failure nothing was created and no cleanup is owed.
    pub fn setup(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Created, "setup")?;

        let resolved = ResolvedSettings {
            helper_image: self.settings.helper_image.resolve(self.bridge.default_image()),
            capture_image: self
                .settings
                .capture_image
                .resolve(self.bridge.default_capture_image()),
            socket_path: self
                .settings
                .socket_path
                .resolve(self.bridge.default_socket_path()),
        };

        info!(
            "Creating privileged pod on node '{}' ({} runtime)",
            self.settings.node,
            self.bridge.kind()
        );

        let spec = PrivilegedPodSpec {
            node: self.settings.node.clone(),
            container_name: PRIVILEGED_CONTAINER_NAME.to_string(),
            image: resolved.helper_image.clone(),
            socket_path: resolved.socket_path.clone(),
            timeout: self.settings.pod_create_timeout,
            service_account: self.settings.service_account.clone(),
            host_network: self.settings.host_network,
        };

        let pod = self.client.create_privileged_pod(&spec).map_err(|e| {
            error!("Failed to create privileged pod on node '{}': {}", self.settings.node, e);
            SessionError::Setup(e)
        })?;

        info!("Pod '{}' created on node '{}'", pod.name, self.settings.node);
        self.pod = Some(pod);
        self.resolved = Some(resolved);
        self.state = SessionState::PodProvisioned;
        Ok(())
    }

    /// Run the capture, streaming raw pcap output into `sink`.
    ///
    /// Blocks until the remote tcpdump exits or `cancel` is set. Whatever the
    /// outcome, the caller must follow up with `cleanup`.
    pub fn start(&mut self, sink: &mut dyn Write, cancel: &CancelFlag) -> Result<(), SessionError> {
        self.expect_state(SessionState::PodProvisioned, "start")?;
        self.state = SessionState::Capturing;

        let (pod, resolved) = match (&self.pod, &self.resolved) {
            (Some(pod), Some(resolved)) => (pod.clone(), resolved.clone()),
            _ => {
                return Err(SessionError::InvalidTransition {
                    action: "start",
                    state: "missing pod",
                })
            }
        };

        let command = self.build_capture_command(&pod, &resolved, cancel)?;
        if command.filter_quoting == FilterQuoting::Verbatim {
            warn!("Capture filter passed through unquoted; make sure it is shell safe");
        }

        match &self.settings.target {
            CaptureTarget::NodeWide => info!("Starting node-wide capture on '{}'", self.settings.node),
            CaptureTarget::Container { container_id } => {
                info!("Starting capture of container '{}'", container_id)
            }
        }

        match self
            .client
            .execute_command(&pod, PRIVILEGED_CONTAINER_NAME, &command.argv, sink, cancel)
        {
            Ok(_) => {
                info!("Capture completed");
                Ok(())
            }
            Err(e) => {
                let exit_code = e.exit_code();
                error!("Capture failed, exit code: {:?}: {}", exit_code, e);
                Err(SessionError::Capture { exit_code, source: e })
            }
        }
    }

    fn build_capture_command(
        &mut self,
        pod: &Pod,
        resolved: &ResolvedSettings,
        cancel: &CancelFlag,
    ) -> Result<CaptureCommand, SessionError> {
        let settings = &self.settings;
        let command = match &settings.target {
            CaptureTarget::NodeWide => self.bridge.build_node_wide_capture_command(
                &settings.interface,
                &settings.filter,
                &resolved.socket_path,
                &resolved.capture_image,
            )?,
            CaptureTarget::Container { container_id } => {
                let pid = if self.bridge.needs_target_pid() {
                    Some(resolve_pid(
                        self.client,
                        self.bridge.as_ref(),
                        pod,
                        container_id,
                        &resolved.socket_path,
                        cancel,
                    )?)
                } else {
                    None
                };
                self.bridge.build_capture_command(
                    container_id,
                    &settings.interface,
                    &settings.filter,
                    pid.as_deref(),
                    &resolved.socket_path,
                    &resolved.capture_image,
                )?
            }
        };
        Ok(command)
    }

    /// Kill the ephemeral capture container and delete the privileged pod.
    ///
    /// A failed container kill is only logged. A failed pod deletion is
    /// returned because the pod would otherwise leak.
    pub fn cleanup(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::TornDown {
            return Err(SessionError::InvalidTransition {
                action: "cleanup",
                state: self.state.as_str(),
            });
        }
        self.state = SessionState::TornDown;

        let Some(pod) = self.pod.take() else {
            return Ok(());
        };

        if let Some(command) = self.bridge.build_cleanup_command() {
            info!("Removing ephemeral capture container");
            // Cleanup must run even after the capture was cancelled.
            let cancel = CancelFlag::new();
            match self.client.execute_command(
                &pod,
                PRIVILEGED_CONTAINER_NAME,
                &command,
                &mut io::sink(),
                &cancel,
            ) {
                Ok(_) => info!("Ephemeral capture container removed"),
                Err(e) => error!(
                    "Failed to remove ephemeral capture container, exit code: {:?}, please remove it manually: {}",
                    e.exit_code(),
                    e
                ),
            }
        }

        info!("Removing privileged pod '{}'", pod.name);
        match self.client.delete_pod(&pod) {
            Ok(()) => {
                info!("Privileged pod '{}' removed", pod.name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to remove privileged pod '{}', please remove it manually: {}", pod.name, e);
                Err(SessionError::Teardown(e))
            }
        }
    }

    /// Setup, capture and clean up, calling `cleanup` exactly once after a successful setup.
    ///
    /// A capture error takes precedence over a teardown error, which is then logged.
    pub fn run(&mut self, sink: &mut dyn Write, cancel: &CancelFlag) -> Result<(), SessionError> {
        self.setup()?;

        let capture = self.start(sink, cancel);
        let teardown = self.cleanup();

        match (capture, teardown) {
            (Err(e), Err(t)) => {
                error!("Teardown also failed: {}", t);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), result) => result,
        }
    }
}

/// Ask the runtime for the target's pid by running the inspect command in the helper pod.
fn resolve_pid(
    client: &dyn ControlPlaneClient,
    bridge: &dyn ContainerRuntimeBridge,
    pod: &Pod,
    container_id: &str,
    socket_path: &str,
    cancel: &CancelFlag,
) -> Result<String, SessionError> {
    let command = bridge.build_inspect_command(container_id, socket_path)?;

    let mut output = Vec::new();
    client
        .execute_command(pod, PRIVILEGED_CONTAINER_NAME, &command, &mut output, cancel)
        .map_err(|e| SessionError::PidResolution {
            exit_code: e.exit_code(),
            source: e,
        })?;

    let pid = bridge.extract_pid(&String::from_utf8_lossy(&output))?;
    info!("Resolved container '{}' to pid {}", container_id, pid);
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Setting;
    use crate::error::{BridgeError, ClientError};
    use crate::runtime::{bridge_for, RuntimeDefaults, RuntimeKind};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create(PrivilegedPodSpec),
        Exec { pod: String, script: String },
        Delete(String),
    }

    /// In-memory client that records every call.
    #[derive(Default)]
    struct FakeClient {
        calls: RefCell<Vec<Call>>,
        fail_create: bool,
        fail_delete: bool,
        /// Results for successive exec calls; `Ok(output)` or `Err(exit code)`.
        exec_results: RefCell<VecDeque<Result<Vec<u8>, i32>>>,
    }

    impl FakeClient {
        fn with_exec_results(results: Vec<Result<Vec<u8>, i32>>) -> Self {
            Self {
                exec_results: RefCell::new(results.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn exec_scripts(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Exec { script, .. } => Some(script),
                    _ => None,
                })
                .collect()
        }
    }

    impl ControlPlaneClient for FakeClient {
        fn create_privileged_pod(&self, spec: &PrivilegedPodSpec) -> Result<Pod, ClientError> {
            self.calls.borrow_mut().push(Call::Create(spec.clone()));
            if self.fail_create {
                return Err(ClientError::PodCreation {
                    node: spec.node.clone(),
                    reason: "admission denied".to_string(),
                });
            }
            Ok(Pod {
                name: "podsniff-test1".to_string(),
                namespace: "default".to_string(),
                node: spec.node.clone(),
            })
        }

        fn execute_command(
            &self,
            pod: &Pod,
            container_name: &str,
            command: &[String],
            sink: &mut dyn Write,
            _cancel: &CancelFlag,
        ) -> Result<i32, ClientError> {
            assert_eq!(container_name, PRIVILEGED_CONTAINER_NAME);
            self.calls.borrow_mut().push(Call::Exec {
                pod: pod.name.clone(),
                script: command.last().cloned().unwrap_or_default(),
            });
            match self.exec_results.borrow_mut().pop_front() {
                Some(Ok(output)) => {
                    sink.write_all(&output)?;
                    Ok(0)
                }
                Some(Err(exit_code)) => Err(ClientError::Exec {
                    pod: pod.name.clone(),
                    exit_code,
                }),
                None => Ok(0),
            }
        }

        fn delete_pod(&self, pod: &Pod) -> Result<(), ClientError> {
            self.calls.borrow_mut().push(Call::Delete(pod.name.clone()));
            if self.fail_delete {
                return Err(ClientError::PodDeletion {
                    pod: pod.name.clone(),
                    reason: "forbidden".to_string(),
                });
            }
            Ok(())
        }
    }

    /// Bridge that records which methods were called.
    struct SpyBridge {
        needs_pid: bool,
        cleanup: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SpyBridge {
        fn record(&self, call: &'static str) {
            self.log.lock().unwrap().push(call);
        }
    }

    impl ContainerRuntimeBridge for SpyBridge {
        fn kind(&self) -> RuntimeKind {
            RuntimeKind::Containerd
        }

        fn default_image(&self) -> &str {
            "helper:default"
        }

        fn default_capture_image(&self) -> &str {
            "tcpdump:default"
        }

        fn default_socket_path(&self) -> &str {
            "/run/default.sock"
        }

        fn needs_target_pid(&self) -> bool {
            self.needs_pid
        }

        fn build_inspect_command(&self, _container_id: &str, socket_path: &str) -> Result<Vec<String>, BridgeError> {
            self.record("inspect");
            Ok(vec!["/bin/sh".into(), "-c".into(), format!("inspect {}", socket_path)])
        }

        fn extract_pid(&self, inspection: &str) -> Result<String, BridgeError> {
            self.record("extract_pid");
            Ok(inspection.trim().to_string())
        }

        fn build_capture_command(
            &mut self,
            container_id: &str,
            _interface: &str,
            _filter: &str,
            pid: Option<&str>,
            _socket_path: &str,
            _capture_image: &str,
        ) -> Result<CaptureCommand, BridgeError> {
            self.record("capture");
            Ok(CaptureCommand {
                argv: vec![
                    "/bin/sh".into(),
                    "-c".into(),
                    format!("capture {} pid={}", container_id, pid.unwrap_or("-")),
                ],
                container_name: "spy".into(),
                filter_quoting: FilterQuoting::Wrapped,
            })
        }

        fn build_node_wide_capture_command(
            &mut self,
            _interface: &str,
            _filter: &str,
            _socket_path: &str,
            _capture_image: &str,
        ) -> Result<CaptureCommand, BridgeError> {
            self.record("node_wide");
            Ok(CaptureCommand {
                argv: vec!["/bin/sh".into(), "-c".into(), "node-wide".into()],
                container_name: "spy".into(),
                filter_quoting: FilterQuoting::Wrapped,
            })
        }

        fn build_cleanup_command(&self) -> Option<Vec<String>> {
            self.record("cleanup");
            self.cleanup
                .then(|| vec!["/bin/sh".into(), "-c".into(), "cleanup".into()])
        }
    }

    fn spy(needs_pid: bool, cleanup: bool) -> (Box<dyn ContainerRuntimeBridge>, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bridge = SpyBridge {
            needs_pid,
            cleanup,
            log: log.clone(),
        };
        (Box::new(bridge), log)
    }

    #[test]
    fn test_setup_resolves_defaults() {
        let client = FakeClient::default();
        let (bridge, _) = spy(false, true);
        let mut settings = CaptureSettings::node_wide("worker-1");
        settings.capture_image = Setting::Explicit("tcpdump:custom".to_string());
        settings.service_account = Some("sniffer".to_string());

        let mut session = CaptureSession::new(settings, &client, bridge);
        session.setup().unwrap();

        assert_eq!(session.state(), SessionState::PodProvisioned);
        let resolved = session.resolved().unwrap();
        assert_eq!(resolved.helper_image, "helper:default");
        assert_eq!(resolved.capture_image, "tcpdump:custom");
        assert_eq!(resolved.socket_path, "/run/default.sock");

        match &client.calls()[0] {
            Call::Create(spec) => {
                assert_eq!(spec.node, "worker-1");
                assert_eq!(spec.container_name, PRIVILEGED_CONTAINER_NAME);
                assert_eq!(spec.image, "helper:default");
                assert_eq!(spec.socket_path, "/run/default.sock");
                assert_eq!(spec.service_account.as_deref(), Some("sniffer"));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_setup_failure_aborts_run() {
        let client = FakeClient {
            fail_create: true,
            ..FakeClient::default()
        };
        let (bridge, log) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        let err = session.run(&mut Vec::new(), &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SessionError::Setup(ClientError::PodCreation { .. })));

        assert_eq!(client.calls().len(), 1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn test_node_wide_run_streams_and_cleans_up() {
        let client = FakeClient::with_exec_results(vec![Ok(b"pcap-bytes".to_vec()), Ok(Vec::new())]);
        let (bridge, log) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        let mut out = Vec::new();
        session.run(&mut out, &CancelFlag::new()).unwrap();

        assert_eq!(out, b"pcap-bytes");
        assert_eq!(*log.lock().unwrap(), vec!["node_wide", "cleanup"]);
        assert_eq!(client.exec_scripts(), vec!["node-wide", "cleanup"]);
        assert_eq!(client.calls().last(), Some(&Call::Delete("podsniff-test1".to_string())));
        assert_eq!(session.state(), SessionState::TornDown);
        assert!(session.pod().is_none());
    }

    #[test]
    fn test_capture_failure_still_deletes_pod() {
        let client = FakeClient::with_exec_results(vec![Err(2), Ok(Vec::new())]);
        let (bridge, _) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        session.setup().unwrap();
        let err = session.start(&mut Vec::new(), &CancelFlag::new()).unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(session.state(), SessionState::Capturing);

        session.cleanup().unwrap();
        assert_eq!(client.calls().last(), Some(&Call::Delete("podsniff-test1".to_string())));
    }

    #[test]
    fn test_cleanup_exec_failure_is_not_fatal() {
        let client = FakeClient::with_exec_results(vec![Ok(Vec::new()), Err(1)]);
        let (bridge, _) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        session.run(&mut Vec::new(), &CancelFlag::new()).unwrap();
        assert_eq!(client.calls().last(), Some(&Call::Delete("podsniff-test1".to_string())));
    }

    #[test]
    fn test_cleanup_skipped_when_bridge_has_none() {
        let client = FakeClient::default();
        let (bridge, _) = spy(false, false);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        session.run(&mut Vec::new(), &CancelFlag::new()).unwrap();
        assert_eq!(client.exec_scripts(), vec!["node-wide"]);
        assert_eq!(client.calls().last(), Some(&Call::Delete("podsniff-test1".to_string())));
    }

    #[test]
    fn test_pod_deletion_failure_is_surfaced() {
        let client = FakeClient {
            fail_delete: true,
            ..FakeClient::default()
        };
        let (bridge, _) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        let err = session.run(&mut Vec::new(), &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SessionError::Teardown(ClientError::PodDeletion { .. })));
    }

    #[test]
    fn test_capture_error_wins_over_teardown_error() {
        let client = FakeClient {
            fail_delete: true,
            exec_results: RefCell::new(vec![Err(137)].into()),
            ..FakeClient::default()
        };
        let (bridge, _) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        let err = session.run(&mut Vec::new(), &CancelFlag::new()).unwrap_err();
        assert_eq!(err.exit_code(), Some(137));
        assert!(client.calls().contains(&Call::Delete("podsniff-test1".to_string())));
    }

    #[test]
    fn test_container_target_without_pid_never_inspects() {
        let client = FakeClient::default();
        let (bridge, log) = spy(false, true);
        let settings = CaptureSettings::container("worker-1", "abc123");
        let mut session = CaptureSession::new(settings, &client, bridge);

        session.run(&mut Vec::new(), &CancelFlag::new()).unwrap();
        let log = log.lock().unwrap();
        assert!(!log.contains(&"inspect"));
        assert!(!log.contains(&"extract_pid"));
        assert_eq!(client.exec_scripts()[0], "capture abc123 pid=-");
    }

    #[test]
    fn test_container_target_with_pid_inspects_first() {
        let client = FakeClient::with_exec_results(vec![Ok(b"4242\n".to_vec()), Ok(Vec::new()), Ok(Vec::new())]);
        let (bridge, log) = spy(true, true);
        let settings = CaptureSettings::container("worker-1", "abc123");
        let mut session = CaptureSession::new(settings, &client, bridge);

        let mut out = Vec::new();
        session.run(&mut out, &CancelFlag::new()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["inspect", "extract_pid", "capture", "cleanup"]);
        assert_eq!(client.exec_scripts(), vec!["inspect /run/default.sock", "capture abc123 pid=4242", "cleanup"]);
        // Inspection output is not forwarded to the capture sink.
        assert!(out.is_empty());
    }

    #[test]
    fn test_inspect_failure_reports_exit_code_and_cleans_up() {
        let client = FakeClient::with_exec_results(vec![Err(1)]);
        let (bridge, _) = spy(true, true);
        let settings = CaptureSettings::container("worker-1", "abc123");
        let mut session = CaptureSession::new(settings, &client, bridge);

        let err = session.run(&mut Vec::new(), &CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SessionError::PidResolution { exit_code: Some(1), .. }));
        assert_eq!(client.calls().last(), Some(&Call::Delete("podsniff-test1".to_string())));
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let client = FakeClient::default();
        let (bridge, _) = spy(false, true);
        let mut session = CaptureSession::new(CaptureSettings::node_wide("worker-1"), &client, bridge);

        assert!(matches!(
            session.start(&mut Vec::new(), &CancelFlag::new()),
            Err(SessionError::InvalidTransition { .. })
        ));

        session.setup().unwrap();
        assert!(matches!(session.setup(), Err(SessionError::InvalidTransition { .. })));

        session.cleanup().unwrap();
        assert!(matches!(session.cleanup(), Err(SessionError::InvalidTransition { .. })));
        let deletes = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Delete(_)))
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_real_bridge_cleanup_matches_capture_name() {
        let client = FakeClient::default();
        let bridge = bridge_for(RuntimeKind::Containerd, RuntimeDefaults::builtin(RuntimeKind::Containerd));
        let mut settings = CaptureSettings::node_wide("worker-1");
        settings.interface = "eth0".to_string();
        settings.filter = "port 80".to_string();
        let mut session = CaptureSession::new(settings, &client, bridge);

        session.run(&mut Vec::new(), &CancelFlag::new()).unwrap();

        let scripts = client.exec_scripts();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("tcpdump -i eth0 -U -w - 'port 80'"));
        assert!(scripts[0].contains("--net-host"));

        let name = scripts[1]
            .lines()
            .find_map(|l| l.strip_prefix("export CONTAINER_ID=\""))
            .map(|rest| rest.trim_end_matches('"').to_string())
            .unwrap();
        assert!(name.starts_with("podsniff-container-"));
        assert!(scripts[0].contains(&name));
    }
}
