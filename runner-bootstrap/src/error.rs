//! Provides the list of errors for `runner-bootstrap`.

use snafu::Snafu;
use std::io;
use std::path::PathBuf;
use std::process::Output;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("'{}' failed - stderr: {}",
                    bin_path, String::from_utf8_lossy(&output.stderr)))]
    CommandFailure { bin_path: String, output: Output },

    #[snafu(display("Existing configuration key '{}' is not a list", key))]
    ConfigKeyType { key: String },

    #[snafu(display("Failed to parse configuration file {}: {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to read configuration file {}: {}", path.display(), source))]
    ConfigRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to serialize Docker configuration: {}", source))]
    ConfigSerialize { source: serde_json::Error },

    #[snafu(display("Failed to write configuration file {}: {}", path.display(), source))]
    ConfigWrite { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to execute '{}': {}", bin_path, source))]
    ExecutionFailure { bin_path: String, source: io::Error },

    #[snafu(display("Failed to fetch instance identity from metadata server: {}", source))]
    FetchIdentity { source: mdsclient::Error },

    #[snafu(display("Failed to fetch JIT configuration from metadata server: {}", source))]
    FetchJitConfig { source: mdsclient::Error },

    #[snafu(display("Logger setup error: {}", source))]
    Logger { source: log::SetLoggerError },

    #[snafu(display("Failed to create directory '{}': '{}'", dir.display(), source))]
    Mkdir { dir: PathBuf, source: io::Error },

    #[snafu(display("Failed to write unit file {}: {}", path.display(), source))]
    UnitWrite { path: PathBuf, source: io::Error },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
