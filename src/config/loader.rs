use std::path::Path;

use clap::{Arg, Command};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};

use super::{Config, ConfigError, defaults};

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Load configuration for the binary, honouring `-c/--config`
pub fn initialize_configuration() -> Result<Config, ConfigError> {
    let matches = Command::new("sparql-mirror")
        .version(env!("CARGO_PKG_VERSION"))
        .about("SPARQL protocol mirror")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file (.toml format)"),
        )
        .get_matches();

    let custom_config_path = matches.get_one::<String>("config").map(String::as_str);
    load_configuration(custom_config_path)
}

/// Layered sources, lowest priority first: typed defaults, `config.toml` in the
/// working directory, then the custom file.
pub fn load_configuration(custom_config_path: Option<&str>) -> Result<Config, ConfigError> {
    let mut figment = defaults_figment();

    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
    }

    if let Some(config_path) = custom_config_path {
        if !Path::new(config_path).exists() {
            return Err(ConfigError::MissingConfig(config_path.to_string()));
        }
        figment = figment.merge(Toml::file(config_path));
    }

    extract(figment)
}

fn defaults_figment() -> Figment {
    Figment::from(Serialized::defaults(defaults::config()))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    let config: Config = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
