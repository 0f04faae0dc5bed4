/// Compile-time defaults for the exporter.
pub struct ExporterConfig;

impl ExporterConfig {
    // HTTP surface
    pub const DEFAULT_LISTEN_ADDRESS: &'static str = ":9202";
    pub const DEFAULT_TELEMETRY_PATH: &'static str = "/metrics";
    pub const METRICS_CONTENT_TYPE: &'static str = "text/plain; version=0.0.4; charset=utf-8";

    // Diagnostic command
    pub const DEFAULT_SMI_COMMAND: &'static str = "nvidia-smi";
    pub const SMI_ARGS: [&'static str; 2] = ["-q", "-x"];
    pub const DEFAULT_SMI_TIMEOUT_SECS: u64 = 10;

    // Logging
    pub const DEFAULT_LOG_FILTER: &'static str = "nvidia_smi_exporter=info,tower_http=info";
}

/// Addresses to try for a listen address, in order.
///
/// `:port` means every interface: the IPv6 wildcard first, which is
/// dual-stack on most hosts, then the IPv4 wildcard for hosts without IPv6.
pub fn listen_candidates(address: &str) -> Vec<String> {
    if address.starts_with(':') {
        vec![format!("[::]{address}"), format!("0.0.0.0{address}")]
    } else {
        vec![address.to_string()]
    }
}
