//! Shared script assembly for every runtime bridge.
//!
//! Bridges only decide which engine CLI to call. Filter quoting, the
//! tcpdump invocation and the preamble layout live here so they behave the
//! same for every engine.

use tracing::warn;

use crate::utils::random_string;

/// Interpreter used for every command handed to the control-plane client.
pub const SHELL: &str = "/bin/sh";

/// Prefix of every ephemeral capture container name.
pub const EPHEMERAL_NAME_PREFIX: &str = "podsniff-container-";

/// Length of the random suffix appended to ephemeral container names.
const EPHEMERAL_SUFFIX_LEN: usize = 8;

/// How the capture filter ended up in the generated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterQuoting {
    /// Wrapped in single quotes.
    Wrapped,
    /// Embedded as given because it already contains a single quote.
    Verbatim,
    /// No filter was given.
    Empty,
}

/// A filter prepared for embedding in a shell command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedFilter {
    pub text: String,
    pub quoting: FilterQuoting,
}

/// Quote a capture filter so multi-token expressions reach tcpdump as one argument.
///
/// Filters that already contain a single quote are left alone and a warning
/// is logged; the operator is then responsible for shell safety.
pub fn quote_filter(filter: &str) -> QuotedFilter {
    if filter.trim().is_empty() {
        return QuotedFilter {
            text: String::new(),
            quoting: FilterQuoting::Empty,
        };
    }

    if filter.contains('\'') {
        warn!("Filter contains single quotes, skipping automatic quoting: {}", filter);
        QuotedFilter {
            text: filter.to_string(),
            quoting: FilterQuoting::Verbatim,
        }
    } else {
        QuotedFilter {
            text: format!("'{}'", filter),
            quoting: FilterQuoting::Wrapped,
        }
    }
}

/// The tcpdump command line run inside the ephemeral container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpdumpInvocation {
    pub command: String,
    pub quoting: FilterQuoting,
}

/// Build an unbuffered tcpdump invocation that writes pcap data to stdout.
pub fn tcpdump_invocation(interface: &str, filter: &str) -> TcpdumpInvocation {
    let quoted = quote_filter(filter);
    let mut command = format!("tcpdump -i {} -U -w -", interface);
    if quoted.quoting != FilterQuoting::Empty {
        command.push(' ');
        command.push_str(&quoted.text);
    }

    TcpdumpInvocation {
        command,
        quoting: quoted.quoting,
    }
}

/// Mint a fresh name for an ephemeral capture container.
pub fn ephemeral_container_name() -> String {
    format!("{}{}", EPHEMERAL_NAME_PREFIX, random_string(EPHEMERAL_SUFFIX_LEN))
}

/// Builder for the `/bin/sh -c <script>` commands sent to the helper pod.
///
/// The layout is always: `set -ex`, environment exports, an optional image
/// pre-fetch, then the body lines.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    exports: Vec<(String, String)>,
    prefetch: Option<String>,
    body: Vec<String>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export an environment variable. The value is placed in double quotes.
    pub fn export(mut self, name: &str, value: impl Into<String>) -> Self {
        self.exports.push((name.to_string(), value.into()));
        self
    }

    /// Pull an image before the body runs so pull latency stays out of the capture.
    pub fn prefetch(mut self, pull_command: impl Into<String>) -> Self {
        self.prefetch = Some(pull_command.into());
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    pub fn build(&self) -> String {
        let mut script = String::from("set -ex\n");
        for (name, value) in &self.exports {
            script.push_str(&format!("export {}=\"{}\"\n", name, value));
        }
        if let Some(pull) = &self.prefetch {
            script.push_str(&format!("{} >/dev/null\n", pull));
        }
        for line in &self.body {
            script.push_str(line);
            script.push('\n');
        }
        script
    }

    /// Wrap the script in a shell invocation vector.
    pub fn into_command(self) -> Vec<String> {
        vec![SHELL.to_string(), "-c".to_string(), self.build()]
    }
}

/// A capture command plus what the bridge decided while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    pub argv: Vec<String>,
    /// Name of the ephemeral container the script launches.
    pub container_name: String,
    pub filter_quoting: FilterQuoting,
}

impl CaptureCommand {
    /// The generated script body.
    pub fn script(&self) -> &str {
        self.argv.last().map(String::as_str).unwrap_or_default()
    }
}
