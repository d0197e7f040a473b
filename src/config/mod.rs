//! Parser options and stored layer definitions, loaded from YAML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::filter::DistanceUnit;

pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Options shared by the CQL reader and writer.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ParserOptions {
    /// Deepest predicate tree accepted when reading or writing.
    pub max_depth: usize,
    /// Unit applied to DWITHIN when the text names none.
    pub default_unit: DistanceUnit,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_unit: DistanceUnit::Meters,
        }
    }
}

impl ParserOptions {
    /// Defaults, overridden by `path` when given, then by `CQLFILTER_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("CQLFILTER")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;
        let options: ParserOptions = settings.try_deserialize()?;
        if options.max_depth == 0 {
            anyhow::bail!("Config: max_depth must be at least 1");
        }
        Ok(options)
    }
}

/// Stored layer definitions, each optionally carrying a CQL filter.
#[derive(Debug, Deserialize, Serialize)]
pub struct LayersConfig {
    pub layers: BTreeMap<String, LayerConfig>,
}

impl LayersConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LayerConfig {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default = "default_geometry_property")]
    pub geometry_property: String,
}

fn default_geometry_property() -> String {
    "geom".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parser_options_defaults() {
        let options = ParserOptions::default();
        assert_eq!(options.max_depth, 128);
        assert_eq!(options.default_unit, DistanceUnit::Meters);
    }

    #[test]
    fn test_parser_options_from_file() {
        let file = yaml_file("max_depth: 16\ndefault_unit: kilometers\n");
        let options = ParserOptions::load(Some(file.path())).unwrap();
        assert_eq!(options.max_depth, 16);
        assert_eq!(options.default_unit, DistanceUnit::Kilometers);
    }

    #[test]
    fn test_parser_options_partial_file_keeps_defaults() {
        let file = yaml_file("default_unit: feet\n");
        let options = ParserOptions::load(Some(file.path())).unwrap();
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(options.default_unit, DistanceUnit::Feet);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let file = yaml_file("max_depth: 0\n");
        assert!(ParserOptions::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_layers_config() {
        let file = yaml_file(
            "layers:\n  roads:\n    filter: \"lanes >= 2\"\n  parcels:\n    geometry_property: shape\n",
        );
        let config = LayersConfig::load(file.path()).unwrap();
        assert_eq!(config.layers.len(), 2);
        let roads = &config.layers["roads"];
        assert_eq!(roads.filter.as_deref(), Some("lanes >= 2"));
        assert_eq!(roads.geometry_property, "geom");
        let parcels = &config.layers["parcels"];
        assert_eq!(parcels.filter, None);
        assert_eq!(parcels.geometry_property, "shape");
    }
}
