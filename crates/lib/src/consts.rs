//! Crate-wide constants.

/// Application name used for data directories and environment variables.
pub const APP_NAME: &str = "devup";

/// Project file searched for when no explicit config path is given.
pub const CONFIG_FILENAME: &str = "devup.json";

/// Environment variable pointing at an explicit project file.
pub const CONFIG_ENV: &str = "DEVUP_CONFIG";

/// Environment variable overriding the whole data directory.
pub const HOME_ENV: &str = "DEVUP_HOME";

/// The only project file schema version the engine understands.
pub const CONFIG_VERSION: u32 = 1;

/// Version of the persisted state document.
pub const STATE_VERSION: u32 = 1;

/// Length of the truncated hex digest used for object hashes.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;
