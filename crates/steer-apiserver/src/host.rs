//! Local clock and hostname

use chrono::Local;

/// Format of every timestamp the server emits
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FALLBACK_HOSTNAME: &str = "localhost";

/// Current local time at second precision
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Name of the machine the server runs on
///
/// Falls back to `$HOSTNAME`, then to `localhost`.
pub fn hostname() -> String {
    system_hostname()
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

fn system_hostname() -> Option<String> {
    let name = gethostname::gethostname();
    let name = name.to_string_lossy().trim_end_matches('\0').to_string();
    if name.is_empty() {
        tracing::debug!("system hostname is empty");
        return None;
    }
    Some(name)
}
