//! podsniff - capture traffic of a pod or node through a privileged helper pod.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podsniff::{
    bridge_for, CancelFlag, CaptureSession, CaptureSettings, CaptureTarget, ClientError, Config,
    KubectlClient, RuntimeKind, SessionError, Setting,
};

#[derive(Parser)]
#[command(name = "podsniff")]
#[command(about = "Capture traffic of a pod or node through a privileged helper pod")]
struct Args {
    /// Pod to capture from
    pod: Option<String>,

    /// Container in the pod (defaults to the first one)
    #[arg(short, long)]
    container: Option<String>,

    /// Namespace of the pod and of the helper pod
    #[arg(short, long)]
    namespace: Option<String>,

    /// Interface to capture on
    #[arg(short, long, default_value = "any")]
    interface: String,

    /// tcpdump filter expression
    #[arg(short, long, default_value = "")]
    filter: String,

    /// Output file, or - for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Capture the node's host network namespace instead of a pod
    #[arg(long)]
    node_wide: bool,

    /// Node for --node-wide (defaults to the pod's node)
    #[arg(long)]
    node: Option<String>,

    /// Container runtime: auto, containerd, docker or cri-o
    #[arg(long, default_value = "auto")]
    runtime: String,

    /// Privileged helper image
    #[arg(long)]
    image: Option<String>,

    /// Image providing tcpdump for the capture container
    #[arg(long)]
    capture_image: Option<String>,

    /// Container runtime socket path on the node
    #[arg(long)]
    socket: Option<String>,

    /// Seconds to wait for the helper pod to become ready
    #[arg(long)]
    timeout: Option<u64>,

    /// Service account for the helper pod
    #[arg(long)]
    service_account: Option<String>,

    /// Run the helper pod in the host network namespace
    #[arg(long)]
    host_network: bool,

    /// kubeconfig context
    #[arg(long)]
    context: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load().context("Failed to load configuration")?;

    // Logs go to stderr so stdout stays a clean pcap stream
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("podsniff=debug")
        } else {
            EnvFilter::new(config.tracing_filter())
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let namespace = args.namespace.clone().unwrap_or_else(|| config.namespace.clone());
    let client = KubectlClient::new(config.kubectl.clone(), namespace).with_context(args.context.clone());

    let forced_runtime = match args.runtime.as_str() {
        "auto" => None,
        other => Some(other.parse::<RuntimeKind>().map_err(|e| anyhow!(e))?),
    };

    let (node, target, kind) = resolve_target(&args, &client, forced_runtime)?;
    tracing::info!("Target node '{}' runs {}", node, kind);

    let settings = CaptureSettings {
        node,
        target,
        interface: args.interface.clone(),
        filter: args.filter.clone(),
        helper_image: Setting::from_option(args.image.clone()),
        capture_image: Setting::from_option(args.capture_image.clone()),
        socket_path: Setting::from_option(args.socket.clone()),
        pod_create_timeout: args
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(config.pod_create_timeout),
        service_account: args.service_account.clone().or_else(|| config.service_account.clone()),
        host_network: args.host_network,
    };

    let mut sink: Box<dyn Write> = if args.output == "-" {
        Box::new(io::stdout().lock())
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("Failed to create output file {}", args.output))?;
        Box::new(BufWriter::new(file))
    };

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Interrupted, stopping capture");
        handler_flag.cancel();
    })
    .context("Failed to set Ctrl+C handler")?;

    let bridge = bridge_for(kind, config.defaults.get(kind));
    let mut session = CaptureSession::new(settings, &client, bridge);

    let result = session.run(&mut sink, &cancel);
    sink.flush().context("Failed to flush capture output")?;

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(SessionError::Capture {
            source: ClientError::Cancelled,
            ..
        }) => {
            tracing::info!("Capture stopped by operator");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(e.into()),
    }
}

/// Work out the node, capture target and container runtime from the arguments.
fn resolve_target(
    args: &Args,
    client: &KubectlClient,
    forced_runtime: Option<RuntimeKind>,
) -> Result<(String, CaptureTarget, RuntimeKind)> {
    if args.node_wide {
        let node = match (&args.node, &args.pod) {
            (Some(node), _) => node.clone(),
            (None, Some(pod)) => client.pod_target(pod, args.container.as_deref())?.node,
            (None, None) => bail!("--node-wide needs --node or a pod name"),
        };

        let kind = match forced_runtime {
            Some(kind) => kind,
            None => {
                let version = client.node_runtime_version(&node)?;
                RuntimeKind::from_runtime_version(&version)
                    .ok_or_else(|| anyhow!("Unsupported container runtime '{}' on node '{}'", version, node))?
            }
        };
        return Ok((node, CaptureTarget::NodeWide, kind));
    }

    let pod = args
        .pod
        .as_deref()
        .ok_or_else(|| anyhow!("A pod name is required unless --node-wide is given"))?;
    let target = client
        .pod_target(pod, args.container.as_deref())
        .with_context(|| format!("Failed to look up pod '{}'", pod))?;

    let (detected, container_id) = RuntimeKind::split_container_id(&target.container_id)
        .ok_or_else(|| anyhow!("Unsupported container id '{}'", target.container_id))?;
    let kind = forced_runtime.unwrap_or(detected);

    tracing::info!(
        "Capturing container '{}' of pod '{}' ({})",
        target.container_name,
        pod,
        container_id
    );

    Ok((
        target.node.clone(),
        CaptureTarget::Container {
            container_id: container_id.to_string(),
        },
        kind,
    ))
}
