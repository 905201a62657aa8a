use fxhash::FxHashSet;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::constants::FORMAT_VERSION;
use super::error::WriterError;
use super::series::{DerivedValue, NamedSeries};

/// How points without a real value are represented on export
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SentinelPolicy {
    /// Leave them out
    Skip,
    /// Write this number in their place
    Legacy(f64),
}

/// A series as the export collaborator sees it: plain (timestamp, value) pairs
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSeries {
    pub name: String,
    pub display_name: String,
    pub style_index: u32,
    pub points: Vec<(f64, f64)>,
}

/// The rendering/export collaborator
pub trait SeriesSink {
    fn write_series(&mut self, series: &ExportedSeries) -> Result<(), WriterError>;

    /// Called once after the last series
    fn close(&mut self) -> Result<(), WriterError> {
        Ok(())
    }
}

impl<S: SeriesSink + ?Sized> SeriesSink for Box<S> {
    fn write_series(&mut self, series: &ExportedSeries) -> Result<(), WriterError> {
        (**self).write_series(series)
    }

    fn close(&mut self) -> Result<(), WriterError> {
        (**self).close()
    }
}

/// SeriesWriter is the boundary between the pipeline and a SeriesSink.
///
/// It does no arithmetic. The only thing it decides is how points that are not
/// Valid are represented, according to its SentinelPolicy.
#[derive(Debug)]
pub struct SeriesWriter<S: SeriesSink> {
    sink: S,
    policy: SentinelPolicy,
    names: FxHashSet<String>,
}

impl<S: SeriesSink> SeriesWriter<S> {
    pub fn new(sink: S, policy: SentinelPolicy) -> Self {
        Self {
            sink,
            policy,
            names: FxHashSet::default(),
        }
    }

    pub fn write(&mut self, series: &NamedSeries) -> Result<(), WriterError> {
        if !self.names.insert(series.name().to_string()) {
            return Err(WriterError::DuplicateSeries(series.name().to_string()));
        }
        let points = series
            .points()
            .iter()
            .filter_map(|p| match (p.value, self.policy) {
                (DerivedValue::Valid(v), _) => Some((p.timestamp, v)),
                (_, SentinelPolicy::Legacy(sentinel)) => Some((p.timestamp, sentinel)),
                (_, SentinelPolicy::Skip) => None,
            })
            .collect();
        self.sink.write_series(&ExportedSeries {
            name: series.name().to_string(),
            display_name: series.display_name().to_string(),
            style_index: series.style_index(),
            points,
        })
    }

    /// Close the sink and hand it back
    pub fn close(mut self) -> Result<S, WriterError> {
        self.sink.close()?;
        spdlog::info!("{} series written.", self.names.len());
        Ok(self.sink)
    }
}

/// Keeps every series in memory, for embedding the pipeline in other programs
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub series: Vec<ExportedSeries>,
}

impl SeriesSink for MemorySink {
    fn write_series(&mut self, series: &ExportedSeries) -> Result<(), WriterError> {
        self.series.push(series.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SeriesIndexEntry {
    name: String,
    display_name: String,
    style_index: u32,
    points: usize,
    file: String,
}

#[derive(Debug, Serialize)]
struct SeriesIndex {
    version: String,
    series: Vec<SeriesIndexEntry>,
}

/// Writes one `<name>.csv` per series into a directory, plus a `series.yml` index of
/// the presentation hints.
#[derive(Debug)]
pub struct CsvSink {
    directory: PathBuf,
    index: Vec<SeriesIndexEntry>,
}

impl CsvSink {
    pub fn new(directory: &Path) -> Result<Self, WriterError> {
        std::fs::create_dir_all(directory)?;
        Ok(Self {
            directory: directory.to_path_buf(),
            index: Vec::new(),
        })
    }
}

impl SeriesSink for CsvSink {
    fn write_series(&mut self, series: &ExportedSeries) -> Result<(), WriterError> {
        let file = format!("{}.csv", series.name);
        let mut writer = csv::Writer::from_path(self.directory.join(&file))?;
        writer.write_record(["timestamp", "value"])?;
        for (timestamp, value) in series.points.iter() {
            writer.serialize((timestamp, value))?;
        }
        writer.flush()?;
        self.index.push(SeriesIndexEntry {
            name: series.name.clone(),
            display_name: series.display_name.clone(),
            style_index: series.style_index,
            points: series.points.len(),
            file,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriterError> {
        let index = SeriesIndex {
            version: format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION),
            series: std::mem::take(&mut self.index),
        };
        std::fs::write(
            self.directory.join("series.yml"),
            serde_yaml::to_string(&index)?,
        )?;
        Ok(())
    }
}
