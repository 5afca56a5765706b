//! Configures the Docker daemon to authenticate against Artifact Registry and
//! to pull through the project's regional virtual repository.

use crate::command::CommandRunner;
use crate::error::{self, Result};
use log::{debug, error, info};
use serde_json::{Map, Value};
use snafu::ResultExt;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

const REGISTRY_MIRRORS_KEY: &str = "registry-mirrors";
const IPV6_KEY: &str = "ipv6";

/// Registers registry credentials, merges the mirror and network settings
/// into the daemon configuration, and returns the virtual repository URL the
/// runner image is pulled from.
///
/// Unrelated keys already present in the configuration file are preserved.
pub(crate) fn configure(
    runner: &dyn CommandRunner,
    region: &str,
    project_id: &str,
    config_dir: &Path,
    credential_config_dir: &Path,
) -> Result<String> {
    // The client credential store defaults to a directory under /root, which
    // is read-only on the host image; point it at scratch space instead.
    env::set_var("DOCKER_CONFIG", credential_config_dir);
    fs::create_dir_all(credential_config_dir).context(error::MkdirSnafu {
        dir: credential_config_dir,
    })?;

    // Register the credential helper for the generic registry host and the
    // regional Artifact Registry host.
    let registries = format!("gcr.io,{}-docker.pkg.dev", region);
    runner.run(
        constants::DOCKER_CREDENTIAL_GCR_BIN,
        &["configure-docker", "--registries", &registries],
    )?;

    match fs::create_dir_all(config_dir) {
        Ok(()) => debug!("Created Docker directory: {}", config_dir.display()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            error!(
                "Permission denied creating {} directory",
                config_dir.display()
            );
            return Err(e).context(error::MkdirSnafu { dir: config_dir });
        }
        Err(e) => return Err(e).context(error::MkdirSnafu { dir: config_dir }),
    }

    let config_path = config_dir.join(constants::DOCKER_DAEMON_CONFIG);
    let mut daemon_config = if config_path.exists() {
        let existing = fs::read_to_string(&config_path).context(error::ConfigReadSnafu {
            path: &config_path,
        })?;
        let daemon_config: Map<String, Value> =
            serde_json::from_str(&existing).context(error::ConfigParseSnafu {
                path: &config_path,
            })?;
        info!("Loaded existing daemon.json configuration");
        daemon_config
    } else {
        info!("Creating new daemon.json configuration...");
        Map::new()
    };

    let virtual_repo = format!("{}-docker.pkg.dev/{}/virtual", region, project_id);
    let mirrors = daemon_config
        .entry(REGISTRY_MIRRORS_KEY)
        .or_insert_with(|| Value::Array(Vec::new()));
    match mirrors.as_array_mut() {
        Some(list) => list.push(Value::String(virtual_repo.clone())),
        None => {
            return error::ConfigKeyTypeSnafu {
                key: REGISTRY_MIRRORS_KEY,
            }
            .fail()
        }
    }

    daemon_config.insert(IPV6_KEY.to_string(), Value::Bool(true));

    let serialized =
        serde_json::to_string_pretty(&daemon_config).context(error::ConfigSerializeSnafu)?;
    fs::write(&config_path, serialized).context(error::ConfigWriteSnafu { path: &config_path })?;

    info!(
        "Successfully configured Docker registry mirrors: {}",
        virtual_repo
    );

    Ok(virtual_repo)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::test_support::FakeRunner;
    use serde_json::json;
    use tempfile::TempDir;

    fn read_config(config_dir: &Path) -> Value {
        let contents =
            fs::read_to_string(config_dir.join(constants::DOCKER_DAEMON_CONFIG)).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    #[test]
    fn fresh_configuration() {
        let t = TempDir::new().unwrap();
        let config_dir = t.path().join("etc/docker");
        let cred_dir = t.path().join("scratch/.docker");
        let runner = FakeRunner::new();

        let virtual_repo =
            configure(&runner, "us-central1", "proj", &config_dir, &cred_dir).unwrap();

        assert_eq!(virtual_repo, "us-central1-docker.pkg.dev/proj/virtual");
        assert!(cred_dir.is_dir());
        assert_eq!(
            runner.recorded(),
            vec![format!(
                "{} configure-docker --registries gcr.io,us-central1-docker.pkg.dev",
                constants::DOCKER_CREDENTIAL_GCR_BIN
            )]
        );

        let written = read_config(&config_dir);
        assert_eq!(
            written[REGISTRY_MIRRORS_KEY],
            json!(["us-central1-docker.pkg.dev/proj/virtual"])
        );
        assert_eq!(written[IPV6_KEY], json!(true));
    }

    #[test]
    fn unrelated_keys_preserved() {
        let t = TempDir::new().unwrap();
        let config_dir = t.path().join("etc/docker");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(constants::DOCKER_DAEMON_CONFIG),
            r#"{"debug": true}"#,
        )
        .unwrap();
        let runner = FakeRunner::new();

        configure(
            &runner,
            "europe-west4",
            "proj",
            &config_dir,
            &t.path().join(".docker"),
        )
        .unwrap();

        let written = read_config(&config_dir);
        assert_eq!(written["debug"], json!(true));
        assert_eq!(
            written[REGISTRY_MIRRORS_KEY],
            json!(["europe-west4-docker.pkg.dev/proj/virtual"])
        );
        assert_eq!(written[IPV6_KEY], json!(true));
    }

    #[test]
    fn rerun_appends_duplicate_mirror() {
        // The append is deliberately unconditional: the bootstrap runs once
        // per VM lifetime, so a duplicate only appears if it is re-run by
        // hand against the same disk.
        let t = TempDir::new().unwrap();
        let config_dir = t.path().join("etc/docker");
        let cred_dir = t.path().join(".docker");
        let runner = FakeRunner::new();

        configure(&runner, "us-east1", "p1", &config_dir, &cred_dir).unwrap();
        configure(&runner, "us-east1", "p1", &config_dir, &cred_dir).unwrap();

        let written = read_config(&config_dir);
        assert_eq!(
            written[REGISTRY_MIRRORS_KEY],
            json!([
                "us-east1-docker.pkg.dev/p1/virtual",
                "us-east1-docker.pkg.dev/p1/virtual"
            ])
        );
    }

    #[test]
    fn malformed_mirror_key_is_fatal() {
        let t = TempDir::new().unwrap();
        let config_dir = t.path().join("etc/docker");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join(constants::DOCKER_DAEMON_CONFIG),
            r#"{"registry-mirrors": "not-a-list"}"#,
        )
        .unwrap();
        let runner = FakeRunner::new();

        assert!(configure(
            &runner,
            "us-east1",
            "p1",
            &config_dir,
            &t.path().join(".docker"),
        )
        .is_err());
    }

    #[test]
    fn credential_helper_failure_stops_before_config_write() {
        let t = TempDir::new().unwrap();
        let config_dir = t.path().join("etc/docker");
        let runner = FakeRunner::failing_on(constants::DOCKER_CREDENTIAL_GCR_BIN);

        assert!(configure(
            &runner,
            "us-east1",
            "p1",
            &config_dir,
            &t.path().join(".docker"),
        )
        .is_err());
        assert!(!config_dir.join(constants::DOCKER_DAEMON_CONFIG).exists());
    }
}
