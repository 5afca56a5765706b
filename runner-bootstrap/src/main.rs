/*!
# Background

runner-bootstrap prepares a freshly booted GCE VM to run exactly one GitHub
Actions job, then hands control to systemd.

It configures the system by:

* resolving the project ID and region from the metadata server
* provisioning a persistent work directory on the stateful partition and
  bind-mounting it where the runner container expects it
* registering Artifact Registry credentials and merging the project's
  regional virtual repository into the Docker daemon's mirror list
* installing and starting a one-shot `gha-runner.service` unit that runs the
  runner container with its just-in-time configuration and powers the VM off
  when the container exits

Nothing here retries.  Any failure aborts the bootstrap with a non-zero exit,
and the autoscaler replaces the VM instead of repairing it.
*/

#![deny(rust_2018_idioms)]

mod command;
mod docker;
mod error;
mod logger;
mod provision;
mod systemd;
mod unit;

use crate::command::{CommandRunner, SystemRunner};
use crate::error::Result;
use crate::logger::CloudLogger;
use crate::systemd::{daemon_reload, SystemdUnit};
use log::{error, info, LevelFilter};
use snafu::ResultExt;
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, process};

/// Stores user-supplied arguments.
struct Args {
    log_level: LevelFilter,
}

/// The fixed locations the bootstrap touches, gathered in one place so tests
/// can redirect them under a temporary directory.
pub(crate) struct Paths {
    pub(crate) persistent_work_dir: PathBuf,
    pub(crate) runtime_work_dir: PathBuf,
    pub(crate) docker_config_dir: PathBuf,
    pub(crate) docker_credential_dir: PathBuf,
    pub(crate) docker_socket: PathBuf,
    pub(crate) unit_path: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            persistent_work_dir: PathBuf::from(constants::PERSISTENT_WORK_DIR),
            runtime_work_dir: PathBuf::from(constants::RUNTIME_WORK_DIR),
            docker_config_dir: PathBuf::from(constants::DOCKER_CONFIG_DIR),
            docker_credential_dir: PathBuf::from(constants::DOCKER_CREDENTIAL_CONFIG_DIR),
            docker_socket: PathBuf::from(constants::DOCKER_SOCKET),
            unit_path: PathBuf::from(constants::SYSTEMD_UNIT_DIR).join(constants::RUNNER_UNIT),
        }
    }
}

/// Runs the bootstrap pipeline in order.  pub(crate) for testing.
pub(crate) async fn bootstrap(
    client: &mdsclient::Client,
    runner: &dyn CommandRunner,
    paths: &Paths,
) -> Result<()> {
    info!("Starting GitHub Actions runner setup...");
    provision::provision_work_dir(runner, &paths.persistent_work_dir, &paths.runtime_work_dir)?;

    let project_id = client
        .fetch_project_id()
        .await
        .context(error::FetchIdentitySnafu)?;
    let region = client
        .fetch_region()
        .await
        .context(error::FetchIdentitySnafu)?;

    info!("Configuring Docker registry mirrors...");
    let virtual_repo = match docker::configure(
        runner,
        &region,
        &project_id,
        &paths.docker_config_dir,
        &paths.docker_credential_dir,
    ) {
        Ok(virtual_repo) => virtual_repo,
        Err(e) => {
            error!("Error configuring Docker registry mirrors: {}", e);
            return Err(e);
        }
    };

    info!("Opening up docker for the world, I am so sorry");
    provision::open_docker_socket(runner, &paths.docker_socket)?;

    info!("Reloading docker configuration...");
    if let Err(e) = SystemdUnit::new(constants::DOCKER_UNIT).reload(runner) {
        error!("Error reloading Docker: {}", e);
        return Err(e);
    }
    info!("Docker configuration reloaded successfully");

    info!("Runner setup complete, creating systemd unit and starting runner...");
    let installed: Result<()> = async {
        unit::write_unit(client, &paths.unit_path, &virtual_repo).await?;
        daemon_reload(runner)?;
        SystemdUnit::new(constants::RUNNER_UNIT).enable_now(runner)
    }
    .await;
    if let Err(e) = installed {
        error!(
            "Failed to start {} via systemd: {}",
            constants::RUNNER_UNIT,
            e
        );
        return Err(e);
    }
    info!("{} enabled and started", constants::RUNNER_UNIT);

    Ok(())
}

/// Main entry point.
async fn run() -> Result<()> {
    let args = parse_args(env::args());
    CloudLogger::init(args.log_level).context(error::LoggerSnafu)?;

    let client = mdsclient::Client::new();
    bootstrap(&client, &SystemRunner, &Paths::default()).await
}

/// Print a usage message in the event a bad argument is given.
fn usage() -> ! {
    let program_name = env::args().next().unwrap_or_else(|| "program".to_string());
    eprintln!(
        r"Usage: {}
            [ --log-level trace|debug|info|warn|error ]",
        program_name,
    );
    process::exit(2);
}

/// Prints a more specific message before exiting through usage().
fn usage_msg<S: AsRef<str>>(msg: S) -> ! {
    eprintln!("{}\n", msg.as_ref());
    usage();
}

/// Parses the arguments to the program and returns a representative `Args`.
fn parse_args(args: env::Args) -> Args {
    let mut log_level = None;

    let mut iter = args.skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--log-level" => {
                let log_level_str = iter
                    .next()
                    .unwrap_or_else(|| usage_msg("Did not give argument to --log-level"));
                log_level = Some(LevelFilter::from_str(&log_level_str).unwrap_or_else(|_| {
                    usage_msg(format!("Invalid log level '{}'", log_level_str))
                }));
            }

            _ => usage(),
        }
    }

    Args {
        log_level: log_level.unwrap_or(LevelFilter::Info),
    }
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", e);
        process::exit(1);
    }
}
