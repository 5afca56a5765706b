/*!
This crate contains constants shared across the runner bootstrap crates
*/

// Persistent storage for the runner's work directory.  The stateful partition
// survives the reboot cycles that the rest of the root filesystem does not.
pub const PERSISTENT_WORK_DIR: &str = "/mnt/stateful_partition/var/lib/github";
pub const RUNTIME_WORK_DIR: &str = "/var/lib/github";

// Docker daemon configuration
pub const DOCKER_CONFIG_DIR: &str = "/etc/docker";
pub const DOCKER_DAEMON_CONFIG: &str = "daemon.json";
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";
// /root is read-only on the host image, so the client credential store lives
// in scratch space instead.
pub const DOCKER_CREDENTIAL_CONFIG_DIR: &str = "/tmp/.docker";

// Service units
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";
pub const DOCKER_UNIT: &str = "docker.service";
pub const RUNNER_UNIT: &str = "gha-runner.service";
pub const RUNNER_CONTAINER_NAME: &str = "gha-runner";
pub const RUNNER_WORK_MOUNT: &str = "/runner/_work";

// Shared binaries' locations
pub const SYSTEMCTL_BIN: &str = "/usr/bin/systemctl";
pub const DOCKER_BIN: &str = "/usr/bin/docker";
pub const INSTALL_BIN: &str = "/usr/bin/install";
pub const MOUNT_BIN: &str = "/usr/bin/mount";
pub const CHMOD_BIN: &str = "/usr/bin/chmod";
pub const DOCKER_CREDENTIAL_GCR_BIN: &str = "/usr/bin/docker-credential-gcr";
