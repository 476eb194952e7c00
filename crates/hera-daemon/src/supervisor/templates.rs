use std::path::Path;

/// Values rendered into a tunnel's configuration file.
#[derive(Debug, Clone, Copy)]
pub struct TunnelFileValues<'a> {
    pub hostname: &'a str,
    pub upstream: &'a str,
    pub log_file: &'a Path,
    pub origin_cert: &'a Path,
}

/// Generate the tunnel configuration file (YAML key/value document).
pub fn tunnel_config(values: &TunnelFileValues<'_>) -> String {
    format!(
        r"hostname: {hostname}
url: {upstream}
logfile: {log_file}
origincert: {origin_cert}
no-autoupdate: true
",
        hostname = values.hostname,
        upstream = values.upstream,
        log_file = values.log_file.display(),
        origin_cert = values.origin_cert.display(),
    )
}

/// Generate the executable run script the supervisor launches.
pub fn run_script(tunnel_binary: &str, config_path: &Path) -> String {
    format!(
        r"#!/bin/sh
exec {tunnel_binary} --config {config}
",
        config = config_path.display(),
    )
}
