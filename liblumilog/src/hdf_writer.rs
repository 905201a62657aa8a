use hdf5::types::VarLenUnicode;
use hdf5::File;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::constants::FORMAT_VERSION;
use super::error::WriterError;
use super::series_writer::{ExportedSeries, SeriesSink};

const SERIES_NAME: &str = "series";
const OUTPUT_FILE_NAME: &str = "series.h5";

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file and writes each series as an N x 2 dataset of
/// (timestamp, value) rows.
#[derive(Debug)]
pub struct HDFSink {
    file_handle: File, // The groups are only valid while the file is open
    file_path: PathBuf,
    series_group: hdf5::Group,
    n_series: u32,
}
// Structure
// series - n_series, version
// |---- <name>(dset) - display_name, style_index

impl HDFSink {
    /// Create the sink, opening `series.h5` inside the output directory
    pub fn new(directory: &Path) -> Result<Self, WriterError> {
        std::fs::create_dir_all(directory)?;
        let file_path = directory.join(OUTPUT_FILE_NAME);
        let file_handle = File::create(&file_path)?;

        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);

        let series_group = file_handle.create_group(SERIES_NAME)?;
        series_group.new_attr::<u32>().create("n_series")?;
        series_group
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(&VarLenUnicode::from_str(&version)?)?;

        Ok(Self {
            file_handle,
            file_path,
            series_group,
            n_series: 0,
        })
    }
}

impl SeriesSink for HDFSink {
    fn write_series(&mut self, series: &ExportedSeries) -> Result<(), WriterError> {
        let mut data_matrix = Array2::<f64>::zeros([series.points.len(), 2]);
        for (row, (timestamp, value)) in series.points.iter().enumerate() {
            data_matrix[[row, 0]] = *timestamp;
            data_matrix[[row, 1]] = *value;
        }
        let dset = self
            .series_group
            .new_dataset_builder()
            .with_data(&data_matrix)
            .create(series.name.as_str())?;
        dset.new_attr::<VarLenUnicode>()
            .create("display_name")?
            .write_scalar(&VarLenUnicode::from_str(&series.display_name)?)?;
        dset.new_attr::<u32>()
            .create("style_index")?
            .write_scalar(&series.style_index)?;
        self.n_series += 1;
        Ok(())
    }

    /// Write meta information on the number of series
    fn close(&mut self) -> Result<(), WriterError> {
        self.series_group
            .attr("n_series")?
            .write_scalar(&self.n_series)?;
        self.file_handle.flush()?;
        spdlog::info!(
            "{} series written to {}.",
            self.n_series,
            self.file_path.to_string_lossy()
        );
        Ok(())
    }
}
