use config::{Config, Environment, File};

use super::models::AppConfig;

/// Load configuration in layers: built-in defaults, then an optional TOML
/// file, then `RIDEHAIL__`-prefixed environment overrides
/// (e.g. `RIDEHAIL__DISPATCHER__TICK_INTERVAL_MS=200`).
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("RIDEHAIL").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}
