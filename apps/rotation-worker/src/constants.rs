pub const SERVICE: &str = "rotation-worker";
pub const ENV: &str = "ENV";

pub const LOCAL_ENV: &str = "local";

pub const CONFIG_PATH: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/secret-rotation/config.yaml";

// The only event type that triggers a rotation; everything else is dropped.
pub const ROTATE_EVENT_TYPE: &str = "SECRET_ROTATE";

// Notification attribute keys
pub const ATTR_SECRET_ID: &str = "secretId";
pub const ATTR_EVENT_TYPE: &str = "eventType";
pub const ATTR_DATE_FORMAT: &str = "dateFormat";
pub const ATTR_TIMESTAMP: &str = "timestamp";
pub const ATTR_VERSION_ID: &str = "versionId";
pub const ATTR_DELETE_TYPE: &str = "deleteType";
