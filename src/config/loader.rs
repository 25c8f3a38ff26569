use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::AgoraConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["agora.toml", "config/agora.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("missing contract address for {0}")]
    MissingContract(&'static str),
}

pub fn load_config(path: Option<PathBuf>) -> Result<AgoraConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            config.validate()?;
            return Ok(config);
        }
    }

    Ok(AgoraConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<AgoraConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AgoraConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some(PathBuf::from("/definitely/not/here/agora.toml")));
        // An explicit path that does not exist is skipped, not an error.
        let config = config.expect("defaults");
        assert!(config.global.rpc_urls().is_empty());
        assert_eq!(config.fees.gas_fee_estimation_factor, 0.625);
    }

    #[test]
    fn config_file_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[global]\nrpc_urls = [\"https://rpc.example\"]\nchain_id = 11155111\n\n[fees]\ngas_fee_estimation_factor = 0.5\n"
        )
        .expect("write");
        let config = load_config(Some(file.path().to_path_buf())).expect("load");
        assert_eq!(config.global.chain_id, 11_155_111);
        assert_eq!(config.fees.gas_fee_estimation_factor, 0.5);
    }

    #[test]
    fn invalid_file_is_rejected_at_load_time() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[fees]\ngas_fee_estimation_factor = 2.0\n").expect("write");
        let err = load_config(Some(file.path().to_path_buf())).expect_err("factor out of range");
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }
}
