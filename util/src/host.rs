//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable pointing at the root of the software installation.
pub const SW_ROOT_ENV_VAR: &str = "BTA_SW_ROOT";

/// Get the root directory of the software, as given by the `BTA_SW_ROOT`
/// environment variable.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
