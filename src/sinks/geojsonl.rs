use super::DataSink;
use anyhow::Result;
use geojson::Feature;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one GeoJSON feature per line.
pub struct GeoJsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
    written: u64,
}

impl GeoJsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn stdout() -> Result<Self> {
        Ok(Self::from_writer(Box::new(std::io::stdout())))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DataSink for GeoJsonlSink {
    fn add_feature(&mut self, feature: &Feature) -> Result<()> {
        serde_json::to_writer(&mut self.writer, feature)?;
        writeln!(self.writer)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_one_feature_per_line() {
        let file = tempfile::NamedTempFile::with_suffix(".geojsonl").unwrap();
        let mut sink = GeoJsonlSink::new(file.path()).unwrap();

        let geometry = geojson::Geometry::new(geojson::Value::Point(vec![1.0, 2.0]));
        let mut feature = Feature::from(geometry);
        feature.set_property("name", "a");
        sink.add_feature(&feature).unwrap();
        sink.add_feature(&feature).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.written(), 2);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["type"], "Feature");
        assert_eq!(parsed["properties"]["name"], "a");
    }
}
