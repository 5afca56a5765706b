//! Renders and installs the systemd unit that supervises the runner container
//! and powers the VM off when the job ends.

use crate::error::{self, Result};
use log::info;
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};

/// Builds the runner image reference inside the virtual repository.
fn image_reference(virtual_repo: &str) -> String {
    format!("{}/actions/actions-runner:latest", virtual_repo)
}

/// Renders the unit definition for the runner container.
///
/// The container runs in the foreground under `Type=exec`.  When it exits the
/// VM powers off, and `RemainAfterExit` keeps the unit from being marked
/// failed once the one-shot process is gone.  There is no restart directive:
/// the container exiting is the end of this VM's life.
pub(crate) fn render_unit(virtual_repo: &str, jit_config: &str) -> String {
    let docker_run = format!(
        "{docker} run \
         --name {container} \
         --log-driver=gcplogs \
         --log-opt mode=non-blocking \
         --log-opt max-buffer-size=4m \
         --env DOCKER_BUILDKIT=1 \
         --volume {socket}:{socket} \
         --volume {work_dir}:{work_mount} \
         {image} ./run.sh --jitconfig {jit}",
        docker = constants::DOCKER_BIN,
        container = constants::RUNNER_CONTAINER_NAME,
        socket = constants::DOCKER_SOCKET,
        work_dir = constants::RUNTIME_WORK_DIR,
        work_mount = constants::RUNNER_WORK_MOUNT,
        image = image_reference(virtual_repo),
        jit = jit_config,
    );

    format!(
        r#"[Unit]
Description=GitHub Actions runner (container)
After={docker_unit}
Requires={docker_unit}

[Service]
Type=exec
Environment="DOCKER_CONFIG={docker_config}"

# Run the job container in the foreground
ExecStart={docker_run}

# Power off when the job is done
ExecStopPost={systemctl} poweroff

# The one-shot process exiting does not fail the unit, and never restarts it
RemainAfterExit=yes

[Install]
WantedBy=multi-user.target
"#,
        docker_unit = constants::DOCKER_UNIT,
        docker_config = constants::DOCKER_CREDENTIAL_CONFIG_DIR,
        docker_run = docker_run,
        systemctl = constants::SYSTEMCTL_BIN,
    )
}

/// Fetches the runner's JIT configuration and writes the rendered unit,
/// overwriting any previous definition.
pub(crate) async fn write_unit(
    client: &mdsclient::Client,
    unit_path: &Path,
    virtual_repo: &str,
) -> Result<PathBuf> {
    let jit_config = client
        .fetch_jit_config()
        .await
        .context(error::FetchJitConfigSnafu)?;
    let contents = render_unit(virtual_repo, &jit_config);
    fs::write(unit_path, contents).context(error::UnitWriteSnafu { path: unit_path })?;
    info!("Wrote systemd unit: {}", unit_path.display());
    Ok(unit_path.to_path_buf())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rendered_unit_contract() {
        let rendered = render_unit("us-central1-docker.pkg.dev/proj/virtual", "TOKEN123");

        assert!(rendered
            .contains("us-central1-docker.pkg.dev/proj/virtual/actions/actions-runner:latest"));
        assert!(rendered.contains("./run.sh --jitconfig TOKEN123"));
        assert!(rendered.contains("ExecStopPost=/usr/bin/systemctl poweroff"));
        assert!(rendered.contains("RemainAfterExit=yes"));
        assert!(rendered.contains("After=docker.service"));
        assert!(rendered.contains("Requires=docker.service"));
        assert!(rendered.contains(r#"Environment="DOCKER_CONFIG=/tmp/.docker""#));
        assert!(rendered.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn container_runs_against_bound_work_dir() {
        let rendered = render_unit("us-east1-docker.pkg.dev/p1/virtual", "abc");

        assert!(rendered.contains("--volume /var/run/docker.sock:/var/run/docker.sock"));
        assert!(rendered.contains("--volume /var/lib/github:/runner/_work"));
        assert!(rendered.contains("--log-driver=gcplogs"));
        assert!(rendered.contains("--log-opt mode=non-blocking"));
        assert!(rendered.contains("--log-opt max-buffer-size=4m"));
        assert!(rendered.contains("--env DOCKER_BUILDKIT=1"));
    }
}
