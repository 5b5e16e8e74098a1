//! Application service: configuring an app directory for remote operation.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::ports::LocatorStore;
use crate::domain::{
    DispatchError, ElevationCredentials, ElevationKind, KeyPair, Locator, RemoteTarget,
};

/// Remote settings requested on the command line. `None`/empty fields keep
/// the values of the previous locator.
#[derive(Debug, Clone, Default)]
pub struct RemoteSetup {
    pub app: String,
    pub target: Option<RemoteTarget>,
    pub instance_path: String,
    pub elevate: Option<ElevationKind>,
    pub elevation_user: String,
    pub elevation_password: String,
    /// Regenerate the key pair even if a valid one exists.
    pub reset_key: bool,
}

/// Builds the new locator from `request`, merges it over the previous locator
/// (if any), stores elevation credentials separately and writes everything.
///
/// # Errors
///
/// Returns a configuration error if no host is known after merging, or the
/// store's filesystem/serialization error.
pub fn configure_remote(
    store: &impl LocatorStore,
    app_dir: &Path,
    request: &RemoteSetup,
) -> Result<(Locator, KeyPair), DispatchError> {
    // Key paths are stored in the locator and must not depend on the cwd.
    let app_dir = std::path::absolute(app_dir).map_err(|e| {
        DispatchError::Filesystem(format!("cannot resolve {}: {e}", app_dir.display()))
    })?;
    let app_dir = app_dir.as_path();

    let previous = match store.load(app_dir) {
        Ok(locator) => locator,
        Err(err) => {
            debug!(error = %err, "no usable previous locator");
            Locator::default()
        }
    };

    let mut requested = Locator {
        app: request.app.clone(),
        instance_path: request.instance_path.clone(),
        elevate: request.elevate.unwrap_or_default(),
        ..Locator::default()
    };
    if let Some(target) = &request.target {
        requested.host.clone_from(&target.host);
        requested.username = target.username.clone().unwrap_or_default();
        requested.port = target.port.clone().unwrap_or_default();
    }

    let mut locator = requested.merge_from(&previous).with_defaults(app_dir);
    if request.elevate == Some(ElevationKind::None) {
        locator.elevate = ElevationKind::None;
    }
    locator.validate()?;

    if let Some(dir) = store_credentials(store, app_dir, &locator, request)? {
        locator.elevation_credentials = dir.display().to_string();
    }

    store.write(app_dir, &locator, request.reset_key)
}

fn store_credentials(
    store: &impl LocatorStore,
    app_dir: &Path,
    locator: &Locator,
    request: &RemoteSetup,
) -> Result<Option<PathBuf>, DispatchError> {
    if locator.elevate == ElevationKind::None {
        return Ok(None);
    }
    if request.elevation_user.is_empty() && request.elevation_password.is_empty() {
        return Ok(None);
    }
    let credentials = ElevationCredentials {
        kind: locator.elevate,
        user: request.elevation_user.clone(),
        password: request.elevation_password.clone(),
    };
    store.write_credentials(app_dir, &credentials).map(Some)
}
