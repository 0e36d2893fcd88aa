//! Layered configuration loading (`§6`, AMBIENT STACK).
//!
//! Defaults come from [`facas_core::config::EngineConfig`]'s `Default` impl,
//! overridden by an optional TOML file and then by `FACAS_*` environment
//! variables (double underscore as the nesting separator, e.g.
//! `FACAS_SCORING__MAX_SCORE`).

use anyhow::Context;
use facas_core::config::EngineConfig;

pub fn load(config_file: Option<&str>) -> anyhow::Result<EngineConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&EngineConfig::default()).context("serializing default config")?);

    if let Some(path) = config_file {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix("FACAS").separator("__"));

    let settings = builder.build().context("building layered configuration")?;
    settings.try_deserialize().context("deserializing engine configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_with_no_file_falls_back_to_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.default_unit, "mm");
    }

    #[test]
    fn env_override_takes_effect() {
        std::env::set_var("FACAS_DEFAULT_UNIT", "in");
        let config = load(None).unwrap();
        std::env::remove_var("FACAS_DEFAULT_UNIT");
        assert_eq!(config.default_unit, "in");
    }
}
