//! `ControlPlaneClient` backed by the kubectl binary.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{CancelFlag, ControlPlaneClient, Pod, PrivilegedPodSpec};
use crate::error::ClientError;
use crate::utils::random_string;

/// How often a streaming exec checks the cancel flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read size for streamed command output.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

const POD_NAME_PREFIX: &str = "podsniff-";

/// Where a pod's container runs, as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTarget {
    pub node: String,
    pub container_name: String,
    /// Runtime-prefixed id, e.g. `containerd://3f2a…`.
    pub container_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodObject {
    #[serde(default)]
    spec: PodSpecObject,
    #[serde(default)]
    status: PodStatusObject,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodSpecObject {
    node_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatusObject {
    #[serde(default)]
    container_statuses: Vec<ContainerStatusObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerStatusObject {
    name: String,
    #[serde(rename = "containerID")]
    container_id: Option<String>,
}

/// Runs kubectl as a subprocess for every cluster operation.
pub struct KubectlClient {
    kubectl: String,
    namespace: String,
    context: Option<String>,
}

impl KubectlClient {
    pub fn new(kubectl: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            namespace: namespace.into(),
            context: None,
        }
    }

    /// Use a specific kubeconfig context.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.kubectl);
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.arg("--namespace").arg(&self.namespace);
        cmd
    }

    /// Run kubectl to completion and return its stdout.
    fn output(&self, args: &[&str]) -> Result<String, ClientError> {
        debug!("kubectl {}", args.join(" "));
        let output = self.command().args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::Lookup(format!(
                "kubectl {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runtime version of a node, e.g. `containerd://1.7.2`.
    pub fn node_runtime_version(&self, node: &str) -> Result<String, ClientError> {
        let version = self.output(&[
            "get",
            "node",
            node,
            "-o",
            "jsonpath={.status.nodeInfo.containerRuntimeVersion}",
        ])?;
        Ok(version.trim().to_string())
    }

    /// Look up the node and container id of a pod's container.
    pub fn pod_target(&self, pod: &str, container: Option<&str>) -> Result<PodTarget, ClientError> {
        let json = self.output(&["get", "pod", pod, "-o", "json"])?;
        parse_pod_target(&json, container)
    }

    fn create(&self, manifest: &serde_json::Value) -> Result<(), String> {
        let payload = serde_json::to_vec(manifest).map_err(|e| e.to_string())?;

        let mut child = self
            .command()
            .args(["create", "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| e.to_string())?;

        match child.stdin.as_mut() {
            Some(stdin) => stdin.write_all(&payload).map_err(|e| e.to_string())?,
            None => return Err("failed to open kubectl stdin".to_string()),
        }
        // Closes stdin so kubectl sees EOF.
        drop(child.stdin.take());

        let output = child.wait_with_output().map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        Ok(())
    }

    fn wait_ready(&self, name: &str, timeout: Duration) -> Result<(), String> {
        let target = format!("pod/{}", name);
        let timeout = format!("--timeout={}s", timeout.as_secs().max(1));
        self.output(&["wait", "--for=condition=Ready", &target, &timeout])
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Build the manifest of the privileged helper pod.
pub fn privileged_pod_manifest(name: &str, namespace: &str, spec: &PrivilegedPodSpec) -> serde_json::Value {
    let mut pod_spec = json!({
        "nodeName": spec.node,
        "restartPolicy": "Never",
        "hostPID": true,
        "hostNetwork": spec.host_network,
        "tolerations": [{ "operator": "Exists" }],
        "containers": [{
            "name": spec.container_name,
            "image": spec.image,
            "imagePullPolicy": "IfNotPresent",
            "command": ["sh", "-c", "sleep 10000000"],
            "securityContext": { "privileged": true },
            "volumeMounts": [
                { "name": "host", "mountPath": "/host" },
                { "name": "container-socket", "mountPath": spec.socket_path },
            ],
        }],
        "volumes": [
            { "name": "host", "hostPath": { "path": "/" } },
            { "name": "container-socket", "hostPath": { "path": spec.socket_path, "type": "Socket" } },
        ],
    });

    if let Some(account) = &spec.service_account {
        pod_spec["serviceAccountName"] = json!(account);
    }

    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": { "app.kubernetes.io/name": "podsniff" },
        },
        "spec": pod_spec,
    })
}

/// Extract the node and container id from `kubectl get pod -o json` output.
///
/// Without an explicit container name the first container status is used.
pub fn parse_pod_target(json: &str, container: Option<&str>) -> Result<PodTarget, ClientError> {
    let pod: PodObject = serde_json::from_str(json)?;

    let node = pod
        .spec
        .node_name
        .ok_or_else(|| ClientError::Lookup("pod is not scheduled on a node".to_string()))?;

    let status = match container {
        Some(name) => pod.status.container_statuses.into_iter().find(|s| s.name == name),
        None => pod.status.container_statuses.into_iter().next(),
    }
    .ok_or_else(|| {
        ClientError::Lookup(format!(
            "container '{}' not found in pod status",
            container.unwrap_or("<first>")
        ))
    })?;

    let container_id = status
        .container_id
        .ok_or_else(|| ClientError::Lookup(format!("container '{}' is not running", status.name)))?;

    Ok(PodTarget {
        node,
        container_name: status.name,
        container_id,
    })
}

/// Copy a child's stdout into `sink` until it closes or `cancel` is set.
fn stream_stdout(child: &mut Child, sink: &mut dyn Write, cancel: &CancelFlag) -> Result<(), ClientError> {
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClientError::Lookup("failed to capture kubectl stdout".to_string()))?;

    let (tx, rx) = mpsc::channel::<std::io::Result<Vec<u8>>>();
    let reader = thread::spawn(move || {
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        loop {
            match stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });

    let result = loop {
        if cancel.is_cancelled() {
            break Err(ClientError::Cancelled);
        }
        match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(Ok(chunk)) => {
                if let Err(e) = sink.write_all(&chunk).and_then(|_| sink.flush()) {
                    break Err(ClientError::Io(e));
                }
            }
            Ok(Err(e)) => break Err(ClientError::Io(e)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };

    if result.is_err() {
        let _ = child.kill();
    }
    // The reader exits once the child's stdout closes.
    let _ = reader.join();
    result
}

/// Map a finished exec's exit code to the client result.
fn exit_result(pod: &str, code: Option<i32>) -> Result<i32, ClientError> {
    match code {
        Some(0) => Ok(0),
        code => Err(ClientError::Exec {
            pod: pod.to_string(),
            // Terminated by a signal.
            exit_code: code.unwrap_or(-1),
        }),
    }
}

impl ControlPlaneClient for KubectlClient {
    fn create_privileged_pod(&self, spec: &PrivilegedPodSpec) -> Result<Pod, ClientError> {
        let name = format!("{}{}", POD_NAME_PREFIX, random_string(5));
        let manifest = privileged_pod_manifest(&name, &self.namespace, spec);

        self.create(&manifest).map_err(|reason| ClientError::PodCreation {
            node: spec.node.clone(),
            reason,
        })?;

        let pod = Pod {
            name,
            namespace: self.namespace.clone(),
            node: spec.node.clone(),
        };

        if let Err(reason) = self.wait_ready(&pod.name, spec.timeout) {
            // The pod exists but never became ready; remove it so a failed
            // setup leaves nothing behind.
            if let Err(e) = self.delete_pod(&pod) {
                warn!("Failed to remove unready pod '{}': {}", pod.name, e);
            }
            return Err(ClientError::PodCreation {
                node: spec.node.clone(),
                reason,
            });
        }

        Ok(pod)
    }

    fn execute_command(
        &self,
        pod: &Pod,
        container_name: &str,
        command: &[String],
        sink: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<i32, ClientError> {
        debug!("Executing in pod '{}' container '{}'", pod.name, container_name);

        let mut child = self
            .command()
            .arg("exec")
            .arg(&pod.name)
            .arg("-c")
            .arg(container_name)
            .arg("--")
            .args(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Err(e) = stream_stdout(&mut child, sink, cancel) {
            let _ = child.wait();
            return Err(e);
        }

        let status = child.wait()?;
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        exit_result(&pod.name, status.code())
    }

    fn delete_pod(&self, pod: &Pod) -> Result<(), ClientError> {
        self.output(&["delete", "pod", &pod.name, "--wait=false"])
            .map(|_| ())
            .map_err(|e| ClientError::PodDeletion {
                pod: pod.name.clone(),
                reason: e.to_string(),
            })
    }
}
