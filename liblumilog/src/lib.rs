//! # lumilog
//!
//! lumilog turns beam-current and facility instrumentation logs into named time series,
//! written in Rust. It takes two column CSV logs (a value and a timestamp per row), puts
//! every channel on a common "seconds since reference date" axis, derives the HER beam
//! current, bunch currents, bunch current product and luminosity from the LER beam
//! current, and writes the resulting series for plotting.
//!
//! ## Installation
//!
//! Currently the only method of install is from source.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./lumilog_cli` from the top
//! level lumilog repository. HDF5 output is optional; build with
//! `cargo install --path ./lumilog_cli --features hdf5` to enable it. This requires an
//! HDF5 installation which the hdf5-rust library can find (see `HDF5_DIR`).
//!
//! ## Configuration
//!
//! A configuration file is YAML. Use `lumilog_cli new -p config.yml` to write a template:
//!
//! ```yml
//! reference_date: '1995-01-01'
//! output_path: ./output
//! output_format: csv
//! n_threads: 1
//! alignment: independent
//! collision_gating: tag
//! legacy_sentinel: null
//! input_filter:
//!   extension: csv
//!   min_size_bytes: 1
//! physics:
//!   her_to_ler_ratio: 0.7093023255813954
//!   nominal_bunch_count: 2346.0
//!   filling_bunch_count: 393.0
//!   filling_current_threshold: 0.0
//!   collision_start: '2024-10-22'
//!   luminosity_normalization: 1.0e+35
//!   nominal_model: !exponential
//!     amplitude: 4.77727
//!     rate: -2.4878
//!     offset: 4.33312
//!     scale: 1.0e+31
//!   filling_model: null
//! channels:
//! - name: ler
//!   path: ./data/ler.csv
//!   role: beam_current
//!   timestamp_format: date_only
//!   column_order: value_first
//!   skip_zero: false
//!   display_name: LER
//!   style_index: 2
//! ```
//!
//! - `reference_date`: all timestamps are seconds since midnight UTC of this date.
//! - `output_format`: `csv` writes one `<name>.csv` per series plus a `series.yml`
//! index, `hdf5` writes a single `series.h5`.
//! - `n_threads`: channels are loaded on this many worker threads. Must be at least 1.
//! - `alignment`: `independent` keeps each series on its own timestamps,
//! `intersection` keeps only timestamps every series has, `union` puts every series on
//! every timestamp.
//! - `collision_gating`: `tag` keeps pre-collision points of the bunch current product
//! and luminosity as "not colliding", `drop` removes them.
//! - `legacy_sentinel`: if set, points without a value are written as this number
//! (older tooling expects -100) instead of being left out. With the default of `null`
//! the "not colliding" points are left out of the written files, so `luminosity.csv`
//! and `bunch_current_product.csv` have fewer rows than the beam current series even
//! with `tag` gating. Set a sentinel when every file must have the same row count.
//! - A value column reading `NaN` or `inf` is a bad value and fails the run.
//! - `input_filter`: files without the extension or below the size are excluded. An
//! excluded channel is reported and skipped; it does not stop the run.
//! - `physics.filling_current_threshold`: LER currents below this use the filling
//! scheme bunch count and `filling_model`. Set to 0 to always use the nominal count.
//! - `channels`: exactly one `beam_current` channel; any number of `auxiliary`
//! channels. A `path` may be a directory, in which case every matching file in it is
//! read in name order. `timestamp_format` is `date_only` (`YYYY-MM-DD`) or
//! `date_time_fraction` (`YYYY/MM/DD HH:MM:SS.ffffff`). `skip_zero` drops zero readings.
//!
//! ## Output
//!
//! From the beam current channel: the channel itself, `her`, `ler_bunch_current`,
//! `her_bunch_current`, `bunch_current_product` (mA^2) and `luminosity`
//! (1e35 cm^-2 s^-1). Every auxiliary channel is written as-is under its own name.
pub mod aligner;
pub mod calculator;
pub mod config;
pub mod constants;
pub mod error;
#[cfg(feature = "hdf5")]
pub mod hdf_writer;
pub mod ingest;
pub mod input;
pub mod loader;
pub mod process;
pub mod series;
pub mod series_writer;
pub mod timestamp;
pub mod worker_status;
