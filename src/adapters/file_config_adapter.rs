//! INI file configuration adapter.

use crate::domain::error::ClosecastError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use std::str::FromStr;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClosecastError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| ClosecastError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ClosecastError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ClosecastError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Trimmed value with any trailing ` ;` or ` #` comment removed. Blank
    /// values count as unset.
    fn raw(&self, section: &str, key: &str) -> Option<String> {
        let value = self.config.get(section, key)?;
        let value = match value.find(" ;").or_else(|| value.find(" #")) {
            Some(at) => &value[..at],
            None => value.as_str(),
        };
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.raw(section, key).and_then(|v| v.parse().ok())
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

/// Split a window list on commas or whitespace. The first token that is not a
/// non-negative integer is returned as the error.
fn parse_usize_list(raw: &str) -> Result<Vec<usize>, String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<usize>().map_err(|_| t.to_string()))
        .collect()
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.raw(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.raw(section, key)
            .and_then(|v| Self::parse_bool(&v))
            .unwrap_or(default)
    }

    fn get_usize_list(&self, section: &str, key: &str) -> Option<Result<Vec<usize>, String>> {
        self.raw(section, key).map(|v| parse_usize_list(&v))
    }
}
