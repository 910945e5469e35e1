use std::{fs, path::Path};

use serde::Deserialize;

/// Options passed to an [`Engine`](crate::engine::Engine) when it is built.
/// Every field is optional in TOML; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fold constant arithmetic before generating bytecode.
    pub fold: bool,
    /// Log the disassembly of every compiled program at debug level.
    pub dump: bool,
    /// How deep the call stack may grow before the VM gives up.
    pub max_frames: usize,
    /// Arguments made available to programs through `args()`.
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            fold: false,
            dump: false,
            max_frames: 100_000,
            args: vec![],
        }
    }
}

impl Config {
    pub fn parse(source: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn load(path: &Path) -> Result<Config, String> {
        let source = fs::read_to_string(path)
            .map_err(|e| format!("The config file {} could not be read: {}", path.display(), e))?;
        Config::parse(&source)
            .map_err(|e| format!("Could not parse the config file {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn partial() {
        let config = Config::parse("fold = true\nargs = ['a', 'b']\n").unwrap();
        assert!(config.fold);
        assert!(!config.dump);
        assert_eq!(config.max_frames, 100_000);
        assert_eq!(config.args, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(Config::parse("max_frames = 'lots'").is_err());
    }
}
