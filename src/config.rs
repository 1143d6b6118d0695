//! vCenter connection settings from the environment.
//!
//! | Variable           | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `VMWARE_URL`       | vCenter URL (`https://vc.lab.local/sdk`)  |
//! | `VMWARE_USERNAME`  | Login user                                |
//! | `VMWARE_PASSWORD`  | Login password                            |
//! | `VCENTER_INSECURE` | `true` skips TLS certificate verification |
//!
//! Values already present in the process environment win over a `.env` file.

use secrecy::SecretString;
use std::path::Path;
use tracing::{debug, info};
use url::Url;
use vmprov_vsphere::types::VsphereConfig;
use vmprov_vsphere::{ProvisionError, ProvisionResult};

pub const ENV_URL: &str = "VMWARE_URL";
pub const ENV_USERNAME: &str = "VMWARE_USERNAME";
pub const ENV_PASSWORD: &str = "VMWARE_PASSWORD";
pub const ENV_INSECURE: &str = "VCENTER_INSECURE";

/// Seed the environment from `path`, or `./.env` when no path is given.
///
/// A missing default `.env` is fine; a missing explicit file is not.
pub fn load_env_file(path: Option<&Path>) -> ProvisionResult<bool> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|_| true).map_err(|e| {
            ProvisionError::config(format!("Cannot load env file {}: {e}", p.display()))
        })?,
        None => match dotenvy::dotenv() {
            Ok(p) => {
                debug!(path = %p.display(), "Loaded .env");
                true
            }
            Err(e) if e.not_found() => false,
            Err(e) => return Err(ProvisionError::config(format!("Cannot load .env: {e}"))),
        },
    };
    if !loaded {
        info!(".env file not found, relying on environment variables");
    }
    Ok(loaded)
}

/// Build the connection config from the process environment.
pub fn from_env() -> ProvisionResult<VsphereConfig> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the connection config from any key lookup.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProvisionResult<VsphereConfig> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let (Some(raw_url), Some(username), Some(password)) =
        (get(ENV_URL), get(ENV_USERNAME), lookup(ENV_PASSWORD).filter(|p| !p.is_empty()))
    else {
        return Err(ProvisionError::config(format!(
            "{ENV_URL}, {ENV_USERNAME} and {ENV_PASSWORD} must be set"
        )));
    };

    let url = parse_url(&raw_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| ProvisionError::config(format!("{ENV_URL} has no host: {raw_url}")))?
        .to_string();
    let port = url.port_or_known_default().unwrap_or(443);
    let insecure = get(ENV_INSECURE).as_deref() == Some("true");

    info!(%host, port, %username, insecure, "vCenter connection configured");

    Ok(VsphereConfig {
        host,
        port,
        username,
        password: SecretString::new(password),
        insecure,
        ..Default::default()
    })
}

/// Accepts full URLs and bare host names.
fn parse_url(raw: &str) -> ProvisionResult<Url> {
    match Url::parse(raw) {
        Ok(u) => Ok(u),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}"))
            .map_err(|e| ProvisionError::config(format!("Invalid {ENV_URL} '{raw}': {e}"))),
        Err(e) => Err(ProvisionError::config(format!("Invalid {ENV_URL} '{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;
    use vmprov_vsphere::ProvisionErrorKind;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn full_url_with_port() {
        let cfg = from_lookup(lookup(&[
            (ENV_URL, "https://vc.lab.local:8443/sdk"),
            (ENV_USERNAME, "administrator@vsphere.local"),
            (ENV_PASSWORD, "s3cret"),
            (ENV_INSECURE, "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.host, "vc.lab.local");
        assert_eq!(cfg.port, 8443);
        assert!(cfg.insecure);
        assert_eq!(cfg.password.expose_secret(), "s3cret");
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn bare_host_defaults_to_https() {
        let cfg = from_lookup(lookup(&[
            (ENV_URL, "vc01"),
            (ENV_USERNAME, "svc"),
            (ENV_PASSWORD, "pw"),
        ]))
        .unwrap();
        assert_eq!(cfg.host, "vc01");
        assert_eq!(cfg.port, 443);
        assert!(!cfg.insecure);
    }

    #[test]
    fn insecure_only_for_literal_true() {
        for v in ["TRUE", "1", "yes", ""] {
            let cfg = from_lookup(lookup(&[
                (ENV_URL, "https://vc"),
                (ENV_USERNAME, "u"),
                (ENV_PASSWORD, "p"),
                (ENV_INSECURE, v),
            ]))
            .unwrap();
            assert!(!cfg.insecure, "{v}");
        }
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let err = from_lookup(lookup(&[(ENV_URL, "https://vc"), (ENV_USERNAME, "u")])).unwrap_err();
        assert_eq!(err.kind, ProvisionErrorKind::ConfigError);
        assert!(err.message.contains(ENV_PASSWORD));
    }

    #[test]
    fn explicit_env_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "VMPROV_TEST_ENV_FILE_MARKER=from-file").unwrap();
        assert!(load_env_file(Some(file.path())).unwrap());
        assert_eq!(std::env::var("VMPROV_TEST_ENV_FILE_MARKER").unwrap(), "from-file");
    }

    #[test]
    fn missing_explicit_env_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_env_file(Some(&dir.path().join("absent.env"))).unwrap_err();
        assert_eq!(err.kind, ProvisionErrorKind::ConfigError);
    }
}
