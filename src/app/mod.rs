//! Command-line interface: subcommands and the feature filtering pass.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use geo_types::Geometry;
use geojson::GeoJson;
use geozero::ToGeo;
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::{LayersConfig, ParserOptions};
use crate::cql::Cql;
use crate::filter::{self, Predicate};
use crate::sinks::{DataSink, GeoJsonlSink};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Parser options file (YAML)
    #[arg(short, long, global = true, env = "CQLFILTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of threads (default: all cores)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse CQL and print the predicate tree
    Parse {
        /// CQL filter text
        cql: String,

        #[arg(long, value_enum, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Parse CQL and print its canonical form
    Format {
        /// CQL filter text
        cql: String,
    },

    /// Read a JSON predicate tree and print it as CQL
    Write {
        /// Tree file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Validate the filters stored on every layer
    Lint {
        /// Layer configuration file (YAML)
        layers: PathBuf,
    },

    /// Write the features of a GeoJSON file that match a filter
    Filter {
        /// Input GeoJSON file (FeatureCollection or Feature)
        #[arg(short, long)]
        input: PathBuf,

        /// CQL filter text
        #[arg(long)]
        cql: Option<String>,

        /// Output file (.geojsonl), or - for stdout
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Only keep features intersecting this WKT geometry
        #[arg(long)]
        within: Option<String>,

        /// Geometry property the area restriction applies to
        #[arg(long, default_value = "geom")]
        geometry_property: String,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Outcome of a command that can fail without an error, such as lint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

pub fn run(cli: &Cli, options: ParserOptions) -> Result<Outcome> {
    let cql = Cql::new(options);
    match &cli.command {
        Command::Parse { cql: text, output_format } => {
            let tree = read_filter(&cql, text)?;
            println!("{}", render_tree(tree.as_ref(), *output_format)?);
            Ok(Outcome::Success)
        }
        Command::Format { cql: text } => {
            let tree = read_filter(&cql, text)?;
            let canonical = match tree {
                Some(tree) => cql.write(&tree).context("CQL: Failed to write filter")?,
                None => String::new(),
            };
            println!("{canonical}");
            Ok(Outcome::Success)
        }
        Command::Write { input } => {
            let json = read_input(input)?;
            let tree: Predicate =
                serde_json::from_str(&json).context("CLI: Invalid predicate tree")?;
            println!("{}", cql.write(&tree).context("CQL: Failed to write filter")?);
            Ok(Outcome::Success)
        }
        Command::Lint { layers } => lint_layers(&cql, layers),
        Command::Filter {
            input,
            cql: text,
            output,
            within,
            geometry_property,
        } => {
            let filter = match text {
                Some(text) => read_filter(&cql, text)?,
                None => None,
            };
            let predicate = match within {
                Some(wkt) => Some(filter::restrict_to_area(
                    filter,
                    geometry_property,
                    parse_area(wkt)?,
                )),
                None => filter,
            };
            let mut sink = init_sink(output)?;
            let count = filter_features(input, predicate.as_ref(), sink.as_mut())?;
            sink.finish().context("Pipeline: Failed to finalize sink")?;
            tracing::info!("Done! Written {} features", count);
            Ok(Outcome::Success)
        }
    }
}

fn read_filter(cql: &Cql, text: &str) -> Result<Option<Predicate>> {
    cql.read(text)
        .with_context(|| format!("CQL: Failed to parse filter '{text}'"))
}

pub fn render_tree(tree: Option<&Predicate>, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&tree)?,
        OutputFormat::Yaml => serde_yaml::to_string(&tree)?,
    };
    Ok(rendered.trim_end().to_string())
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("CLI: Failed to read stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("CLI: Failed to read {:?}", input))
    }
}

fn parse_area(wkt: &str) -> Result<Geometry<f64>> {
    geozero::wkt::Wkt(wkt)
        .to_geo()
        .map_err(|err| anyhow!("CLI: Invalid --within geometry: {}", err))
}

pub fn lint_layers(cql: &Cql, path: &Path) -> Result<Outcome> {
    let config = LayersConfig::load(path)
        .with_context(|| format!("Config: Failed to load layers from {:?}", path))?;

    let mut failures = 0usize;
    for (name, layer) in &config.layers {
        match cql.read_optional(layer.filter.as_deref()) {
            Ok(Some(tree)) => {
                for property in spatial_properties(&tree) {
                    if property != layer.geometry_property {
                        tracing::warn!(
                            "Layer {}: spatial filter on '{}' but geometry property is '{}'",
                            name,
                            property,
                            layer.geometry_property
                        );
                    }
                }
                match cql.write(&tree) {
                    Ok(canonical) => println!("{name}: {canonical}"),
                    Err(err) => {
                        failures += 1;
                        eprintln!("{name}: {err}");
                    }
                }
            }
            Ok(None) => println!("{name}: (no filter)"),
            Err(err) => {
                failures += 1;
                eprintln!("{name}: {err}");
            }
        }
    }

    tracing::info!(
        "Lint: {} layers, {} failed",
        config.layers.len(),
        failures
    );
    Ok(if failures == 0 {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}

fn spatial_properties(tree: &Predicate) -> Vec<&str> {
    let mut found = Vec::new();
    let mut pending = vec![tree];
    while let Some(node) = pending.pop() {
        match node {
            Predicate::Spatial { property, .. } => found.push(property.as_str()),
            Predicate::Not { child } => pending.push(child.as_ref()),
            Predicate::And { children } | Predicate::Or { children } => {
                pending.extend(children.iter())
            }
            _ => {}
        }
    }
    found
}

pub fn init_sink(output: &Path) -> Result<Box<dyn DataSink + Send>> {
    if output == Path::new("-") {
        tracing::info!("Sink: geojsonl -> stdout");
        Ok(Box::new(GeoJsonlSink::stdout()?))
    } else {
        tracing::info!("Sink: geojsonl -> {:?}", output);
        Ok(Box::new(GeoJsonlSink::new(output).with_context(|| {
            format!("Pipeline: Failed to create {:?}", output)
        })?))
    }
}

fn load_features(input: &Path) -> Result<Vec<geojson::Feature>> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Pipeline: Failed to read {:?}", input))?;
    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("Pipeline: Invalid GeoJSON in {:?}", input))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => anyhow::bail!("Pipeline: {:?} holds a bare geometry", input),
    }
}

/// Evaluate `predicate` over every feature in `input` and write the matches
/// to `sink` in input order. No predicate keeps every feature.
pub fn filter_features(
    input: &Path,
    predicate: Option<&Predicate>,
    sink: &mut dyn DataSink,
) -> Result<u64> {
    let features = load_features(input)?;
    tracing::info!("Loaded {} features from {:?}", features.len(), input);

    let keep: Vec<bool> = features
        .par_iter()
        .enumerate()
        .map(|(index, feature)| -> Result<bool> {
            let Some(predicate) = predicate else {
                return Ok(true);
            };
            let feature = filter::Feature::try_from(feature.clone())
                .with_context(|| format!("Pipeline: Invalid geometry in feature {index}"))?;
            Ok(filter::evaluate(predicate, &feature))
        })
        .collect::<Result<_>>()?;

    let mut written = 0u64;
    for (feature, keep) in features.iter().zip(keep) {
        if keep {
            sink.add_feature(feature)?;
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_spatial_properties_walks_combinators() {
        let tree = Cql::default()
            .read("a = 1 AND NOT(BBOX(shape, 0, 0, 1, 1)) OR INTERSECTS(geom, POINT(1 1))")
            .unwrap()
            .unwrap();
        let mut found = spatial_properties(&tree);
        found.sort();
        assert_eq!(found, vec!["geom", "shape"]);
    }

    #[test]
    fn test_render_tree_formats() {
        let tree = Cql::default().read("a = 1").unwrap();
        let json = render_tree(tree.as_ref(), OutputFormat::Json).unwrap();
        assert!(json.contains("\"comparison\""));
        let yaml = render_tree(tree.as_ref(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("type: comparison"));
        assert_eq!(render_tree(None, OutputFormat::Json).unwrap(), "null");
    }

    #[test]
    fn test_lint_reports_failure() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(b"layers:\n  ok:\n    filter: \"a = 1\"\n  bad:\n    filter: \"a = \"\n")
            .unwrap();
        let outcome = lint_layers(&Cql::default(), file.path()).unwrap();
        assert_eq!(outcome, Outcome::Failure);
    }

    #[test]
    fn test_parse_area() {
        assert!(matches!(parse_area("POINT(1 2)").unwrap(), Geometry::Point(_)));
        assert!(parse_area("POINT(1").is_err());
    }
}
