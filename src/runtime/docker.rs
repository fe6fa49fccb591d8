//! Docker bridge.

use super::script::{ephemeral_container_name, tcpdump_invocation, CaptureCommand, ScriptBuilder};
use super::{ContainerRuntimeBridge, EphemeralContainer, RuntimeDefaults, RuntimeKind};
use crate::error::BridgeError;
use crate::utils::ensure_shell_token;

/// Joins the target's namespace with `docker run --net container:<id>`.
pub struct DockerBridge {
    defaults: RuntimeDefaults,
    last_container: Option<EphemeralContainer>,
}

impl DockerBridge {
    pub fn new(defaults: RuntimeDefaults) -> Self {
        Self {
            defaults,
            last_container: None,
        }
    }

    fn build(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
        network: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        let interface = ensure_shell_token("interface", interface)?;
        let socket_path = ensure_shell_token("socket path", socket_path)?;
        let capture_image = ensure_shell_token("capture image", capture_image)?;

        let name = ephemeral_container_name();
        let tcpdump = tcpdump_invocation(interface, filter);

        let argv = ScriptBuilder::new()
            .export("DOCKER_SOCKET", socket_path)
            .export("DOCKER_HOST", "unix:///host${DOCKER_SOCKET}")
            .prefetch(format!("docker pull {}", capture_image))
            .line(format!(
                "exec docker run --rm --name {} --net {} {} {}",
                name, network, capture_image, tcpdump.command
            ))
            .into_command();

        self.last_container = Some(EphemeralContainer {
            name: name.clone(),
            socket_path: socket_path.to_string(),
        });

        Ok(CaptureCommand {
            argv,
            container_name: name,
            filter_quoting: tcpdump.quoting,
        })
    }
}

impl ContainerRuntimeBridge for DockerBridge {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Docker
    }

    fn default_image(&self) -> &str {
        &self.defaults.helper_image
    }

    fn default_capture_image(&self) -> &str {
        &self.defaults.capture_image
    }

    fn default_socket_path(&self) -> &str {
        &self.defaults.socket_path
    }

    fn build_capture_command(
        &mut self,
        container_id: &str,
        interface: &str,
        filter: &str,
        _pid: Option<&str>,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        let container_id = ensure_shell_token("container id", container_id)?;
        let network = format!("container:{}", container_id);
        self.build(interface, filter, socket_path, capture_image, &network)
    }

    fn build_node_wide_capture_command(
        &mut self,
        interface: &str,
        filter: &str,
        socket_path: &str,
        capture_image: &str,
    ) -> Result<CaptureCommand, BridgeError> {
        self.build(interface, filter, socket_path, capture_image, "host")
    }

    fn build_cleanup_command(&self) -> Option<Vec<String>> {
        let container = self.last_container.as_ref()?;
        let argv = ScriptBuilder::new()
            .export("DOCKER_SOCKET", container.socket_path.as_str())
            .export("DOCKER_HOST", "unix:///host${DOCKER_SOCKET}")
            .export("CONTAINER_ID", container.name.as_str())
            .line("docker rm -f ${CONTAINER_ID}")
            .into_command();
        Some(argv)
    }
}
