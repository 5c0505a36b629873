pub const APP_NAME: &str = "buildrules";

/// File name of the installed-state ledger inside an install root.
pub const LEDGER_FILENAME: &str = "installed_units.yml";

/// Configuration document that selects deployers; read for every target.
pub const DEPLOYMENT_CONFIG: &str = "deployment_config.yaml";

/// Number of fingerprint characters used in install paths.
pub const FINGERPRINT_SHORT_LEN: usize = 8;

/// Stderr lines kept as the diagnostic of a failed process rule.
pub const STDERR_TAIL_LINES: usize = 20;

/// Block size used when streaming files through the hasher.
pub const HASH_BLOCK_SIZE: usize = 8192;
