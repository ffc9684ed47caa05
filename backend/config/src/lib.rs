//! `armdeck-config` — runtime configuration.
//!
//! YAML file with camelCase keys, loaded once at startup. A missing file is
//! not an error; every section has working defaults. String values may
//! reference environment variables as `${VAR_NAME}`, resolved at load time.

pub mod env;
pub mod io;
pub mod schema;

pub use env::MissingEnvVarError;
pub use io::{config_file_path, load_config};
pub use schema::{
    ArmdeckConfig, BrokerConfig, ClassifierConfig, DevicesConfig, GatewayConfig, LoggingConfig,
};
