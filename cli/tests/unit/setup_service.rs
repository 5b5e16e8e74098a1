//! Unit tests for remote setup: locator merge and credential separation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use tether_cli::application::services::setup::{RemoteSetup, configure_remote};
use tether_cli::domain::locator::parse_remote_target;
use tether_cli::domain::{DispatchError, ElevationKind, Locator};

use crate::mocks::{MemoryLocatorStore, remote_locator};

const APP_DIR: &str = "/apps/node";

fn request(target: &str) -> RemoteSetup {
    RemoteSetup {
        target: Some(parse_remote_target(target).unwrap()),
        ..RemoteSetup::default()
    }
}

#[test]
fn test_first_setup_fills_defaults() {
    let store = MemoryLocatorStore::local();

    let (locator, keys) = configure_remote(&store, Path::new(APP_DIR), &request("10.0.0.5")).unwrap();

    assert_eq!(locator.host, "10.0.0.5");
    assert_eq!(locator.port, "22");
    assert_eq!(locator.username, "root");
    assert_eq!(locator.private_key, "/apps/node/.tether-remote-key");
    assert_eq!(locator.public_key, "/apps/node/.tether-remote-key.pub");
    assert!(keys.is_new);
    assert_eq!(store.written().len(), 1);
}

#[test]
fn test_relative_app_dir_yields_absolute_key_paths() {
    let store = MemoryLocatorStore::local();

    let (locator, _) =
        configure_remote(&store, Path::new("apps/node"), &request("10.0.0.5")).unwrap();

    let private = Path::new(&locator.private_key);
    assert!(private.is_absolute(), "{}", locator.private_key);
    assert!(private.ends_with("apps/node/.tether-remote-key"));
    assert!(Path::new(&locator.public_key).is_absolute());
}

#[test]
fn test_target_user_and_port_are_applied() {
    let store = MemoryLocatorStore::local();

    let (locator, _) =
        configure_remote(&store, Path::new(APP_DIR), &request("deploy@db.internal:2222")).unwrap();

    assert_eq!(locator.username, "deploy");
    assert_eq!(locator.host, "db.internal");
    assert_eq!(locator.port, "2222");
    assert_eq!(locator.address(), "db.internal:2222");
}

#[test]
fn test_rerun_keeps_previous_fields() {
    let previous = Locator {
        elevate: ElevationKind::Su,
        ..remote_locator("10.0.0.5")
    };
    let store = MemoryLocatorStore::with_previous(previous);

    let (locator, keys) = configure_remote(&store, Path::new(APP_DIR), &request("10.0.0.9")).unwrap();

    assert_eq!(locator.host, "10.0.0.9");
    assert_eq!(locator.app, "node");
    assert_eq!(locator.instance_path, "/srv/node");
    assert_eq!(locator.elevate, ElevationKind::Su);
    assert!(!keys.is_new);
}

#[test]
fn test_rerun_without_target_keeps_host() {
    let store = MemoryLocatorStore::with_previous(remote_locator("10.0.0.5"));
    let req = RemoteSetup {
        instance_path: "/opt/node".to_string(),
        ..RemoteSetup::default()
    };

    let (locator, _) = configure_remote(&store, Path::new(APP_DIR), &req).unwrap();

    assert_eq!(locator.host, "10.0.0.5");
    assert_eq!(locator.instance_path, "/opt/node");
}

#[test]
fn test_explicit_elevate_none_clears_previous_elevation() {
    let previous = Locator {
        elevate: ElevationKind::Sudo,
        ..remote_locator("10.0.0.5")
    };
    let store = MemoryLocatorStore::with_previous(previous);
    let req = RemoteSetup {
        elevate: Some(ElevationKind::None),
        ..RemoteSetup::default()
    };

    let (locator, _) = configure_remote(&store, Path::new(APP_DIR), &req).unwrap();

    assert_eq!(locator.elevate, ElevationKind::None);
}

#[test]
fn test_reset_key_is_forwarded_to_store() {
    let store = MemoryLocatorStore::with_previous(remote_locator("10.0.0.5"));
    let req = RemoteSetup {
        reset_key: true,
        ..RemoteSetup::default()
    };

    let (_, keys) = configure_remote(&store, Path::new(APP_DIR), &req).unwrap();

    assert!(keys.is_new);
    assert!(store.written()[0].1);
}

#[test]
fn test_elevation_password_goes_to_credentials_store_only() {
    let store = MemoryLocatorStore::local();
    let req = RemoteSetup {
        elevate: Some(ElevationKind::Sudo),
        elevation_user: "admin".to_string(),
        elevation_password: "s3cret".to_string(),
        ..request("10.0.0.5")
    };

    let (locator, _) = configure_remote(&store, Path::new(APP_DIR), &req).unwrap();

    let credentials = store.credentials();
    assert_eq!(credentials.len(), 1);
    assert_eq!(credentials[0].kind, ElevationKind::Sudo);
    assert_eq!(credentials[0].user, "admin");
    assert_eq!(credentials[0].password, "s3cret");
    assert_eq!(locator.elevation_credentials, "/apps/node/.tether-credentials");

    let json = serde_json::to_string(&store.written()[0].0).unwrap();
    assert!(!json.contains("s3cret"));
}

#[test]
fn test_no_credentials_written_without_elevation() {
    let store = MemoryLocatorStore::local();
    let req = RemoteSetup {
        elevation_password: "s3cret".to_string(),
        ..request("10.0.0.5")
    };

    configure_remote(&store, Path::new(APP_DIR), &req).unwrap();

    assert!(store.credentials().is_empty());
}

#[test]
fn test_setup_without_any_host_is_configuration_error() {
    let store = MemoryLocatorStore::local();
    let req = RemoteSetup {
        app: "node".to_string(),
        ..RemoteSetup::default()
    };

    let err = configure_remote(&store, Path::new(APP_DIR), &req).unwrap_err();

    assert!(matches!(err, DispatchError::Configuration(_)));
    assert!(store.written().is_empty());
}
