use tracing::debug;

/// Fallback used when the host name cannot be determined.
pub const UNKNOWN_HOST: &str = "unknown";

/// Name of the local host, or `"unknown"`.
///
/// Never fails: formatting a message must not depend on host identity.
#[must_use]
pub fn report_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => match name.into_string() {
            Ok(name) if !name.is_empty() => name,
            _ => UNKNOWN_HOST.to_string(),
        },
        Err(err) => {
            debug!(error = %err, "failed to get system hostname");
            UNKNOWN_HOST.to_string()
        }
    }
}
