//! Backend module - search databases the harness can drive (memory, infinity)

mod bm25;
mod infinity;
mod memory;
mod traits;

#[cfg(test)]
pub mod testing;

pub use infinity::InfinityBackend;
pub use memory::MemoryBackend;
pub use traits::{Backend, Hit, SearchKind, SearchRequest};

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::config::BackendSettings;

/// Supported backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Infinity,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "infinity" => Ok(BackendKind::Infinity),
            other => anyhow::bail!("Unknown backend: {} (expected memory or infinity)", other),
        }
    }
}

impl BackendKind {
    /// Tables live only as long as this process
    pub fn is_in_process(self) -> bool {
        self == BackendKind::Memory
    }

    /// Connect to a backend of this kind
    pub fn connect(self, settings: &BackendSettings) -> anyhow::Result<Arc<dyn Backend>> {
        match self {
            BackendKind::Memory => {
                info!("Using in-process memory backend");
                Ok(Arc::new(MemoryBackend::new()))
            }
            BackendKind::Infinity => {
                info!(
                    "Connecting to infinity at {} (database '{}')",
                    settings.address, settings.database
                );
                let backend = InfinityBackend::new(&settings.address, &settings.database)?;
                Ok(Arc::new(backend))
            }
        }
    }
}

/// Parsed full-text option string, e.g. `topn=10;default_field=body`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOptions {
    pub topn: Option<usize>,
    pub default_field: Option<String>,
}

impl MatchOptions {
    pub fn parse(options: &str) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        for pair in options.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Malformed match option: {}", pair))?;
            match key.trim() {
                "topn" => parsed.topn = Some(value.trim().parse()?),
                "default_field" => parsed.default_field = Some(value.trim().to_string()),
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Render options in the `key=value;key=value` form
    pub fn format(topn: usize, default_field: &str) -> String {
        format!("topn={};default_field={}", topn, default_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("Infinity".parse::<BackendKind>().unwrap(), BackendKind::Infinity);
        assert!("elastic".parse::<BackendKind>().is_err());
        assert!(BackendKind::Memory.is_in_process());
        assert!(!BackendKind::Infinity.is_in_process());
    }

    #[test]
    fn test_match_options() {
        let opts = MatchOptions::parse(&MatchOptions::format(10, "body")).unwrap();
        assert_eq!(opts.topn, Some(10));
        assert_eq!(opts.default_field.as_deref(), Some("body"));

        let opts = MatchOptions::parse("").unwrap();
        assert_eq!(opts, MatchOptions::default());

        assert!(MatchOptions::parse("topn").is_err());
        assert!(MatchOptions::parse("topn=ten").is_err());
    }
}
