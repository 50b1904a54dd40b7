mod types;

pub use types::{ConfigError, ControllerKind, KaasConfig};
