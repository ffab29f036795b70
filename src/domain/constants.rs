pub const DEFAULT_CONFIG_FILE: &str = "cli-driver.toml";
pub const CONFIG_PATH_ENV: &str = "CLI_DRIVER_CONFIG";

pub const REGISTRY_URL_ENV: &str = "REGISTRY_URL";
pub const REGISTRY_USER_ENV: &str = "REGISTRY_USER";
pub const REGISTRY_TOKEN_ENV: &str = "REGISTRY_TOKEN";

/// Returned by `account del` while the account is still enabled.
pub const ACCOUNT_DELETE_WHILE_ENABLED: &str =
    "Invalid account state change requested. Cannot go from state enabled to state deleting";
/// Returned by `image del` (without `--force`) for the newest image of a subscribed tag.
pub const IMAGE_DELETE_LATEST_TAG: &str =
    "cannot delete image that is the latest of its tags, and has active subscription";
pub const REGISTRY_ALREADY_EXISTS: &str = "registry already exists in DB";
pub const UNAUTHORIZED: &str = "Unauthorized";

pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_NOT_FOUND: u16 = 404;

/// Generic verdict values for checks that only assert "the call worked".
pub const STATE_OK: &str = "ok";
pub const STATE_NOT_OK: &str = "notok";

pub const SUMMARY_RULE: &str = "==============================";
