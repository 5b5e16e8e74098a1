//! Filesystem implementation of the `LocatorStore` port.
//!
//! The locator lives at `<app>/.tether-remote.json`; key files and the
//! elevation credentials store sit next to it.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::application::ports::LocatorStore;
use crate::domain::locator::{CREDENTIALS_DIR, LOCATOR_FILE};
use crate::domain::{DispatchError, ElevationCredentials, KeyPair, Locality, Locator};
use crate::infra::keys;

/// File inside the credentials directory.
pub const ELEVATION_FILE: &str = "elevation.json";

/// Parses locator JSON. Only a top-level object is accepted; serde would
/// otherwise read an empty array as a default locator.
fn parse_locator(content: &str) -> Result<Locator, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(serde::de::Error::custom("expected a JSON object"));
    }
    serde_json::from_value(value)
}

/// Production `LocatorStore` backed by plain files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLocatorStore;

impl FsLocatorStore {
    #[must_use]
    pub fn locator_path(app_dir: &Path) -> PathBuf {
        app_dir.join(LOCATOR_FILE)
    }
}

impl LocatorStore for FsLocatorStore {
    fn resolve(&self, app_dir: &Path) -> Locality {
        let path = Self::locator_path(app_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Locality::Local,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read locator");
                return Locality::Invalid(format!("cannot read {}: {e}", path.display()));
            }
        };
        match parse_locator(&content) {
            Ok(locator) if locator.host.is_empty() => {
                warn!(path = %path.display(), "locator has no Host");
                Locality::Invalid(format!("locator {} has no Host", path.display()))
            }
            Ok(locator) => Locality::Remote(locator),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed locator");
                Locality::Invalid(format!("malformed locator {}: {e}", path.display()))
            }
        }
    }

    fn load(&self, app_dir: &Path) -> Result<Locator, DispatchError> {
        let path = Self::locator_path(app_dir);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            DispatchError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        parse_locator(&content).map_err(|e| {
            DispatchError::Serialization(format!("malformed locator {}: {e}", path.display()))
        })
    }

    fn write(
        &self,
        app_dir: &Path,
        locator: &Locator,
        reset: bool,
    ) -> Result<(Locator, KeyPair), DispatchError> {
        std::fs::create_dir_all(app_dir).map_err(|e| fs_error("create", app_dir, &e))?;

        let previous = self.resolve(app_dir).remote().cloned();
        let mut candidates = vec![locator];
        candidates.extend(previous.as_ref());
        let pair = keys::load_or_generate(&candidates, reset)?;

        let public_path = Path::new(&locator.public_key);
        let private_path = Path::new(&locator.private_key);
        write_file(public_path, format!("{}\n", pair.public_key.trim()).as_bytes(), 0o644)?;
        write_file(private_path, pair.private_key.as_bytes(), 0o600)?;

        let json = serde_json::to_string_pretty(locator)
            .map_err(|e| DispatchError::Serialization(format!("cannot encode locator: {e}")))?;
        write_file(&Self::locator_path(app_dir), json.as_bytes(), 0o644)?;

        info!(app = %app_dir.display(), host = %locator.host, new_key = pair.is_new, "locator written");
        Ok((locator.clone(), pair))
    }

    fn write_credentials(
        &self,
        app_dir: &Path,
        credentials: &ElevationCredentials,
    ) -> Result<PathBuf, DispatchError> {
        let dir = app_dir.join(CREDENTIALS_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| fs_error("create", &dir, &e))?;
        set_mode(&dir, 0o700)?;

        let json = serde_json::to_string_pretty(credentials).map_err(|e| {
            DispatchError::Serialization(format!("cannot encode elevation credentials: {e}"))
        })?;
        write_file(&dir.join(ELEVATION_FILE), json.as_bytes(), 0o600)?;
        debug!(dir = %dir.display(), "elevation credentials written");
        Ok(dir)
    }
}

fn write_file(path: &Path, content: &[u8], mode: u32) -> Result<(), DispatchError> {
    std::fs::write(path, content).map_err(|e| fs_error("write", path, &e))?;
    set_mode(path, mode)
}

fn set_mode(path: &Path, _mode: u32) -> Result<(), DispatchError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(_mode))
            .map_err(|e| fs_error("set permissions on", path, &e))?;
    }
    Ok(())
}

fn fs_error(action: &str, path: &Path, err: &std::io::Error) -> DispatchError {
    DispatchError::Filesystem(format!("cannot {action} {}: {err}", path.display()))
}
