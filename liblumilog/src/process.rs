use std::sync::mpsc::Sender;

use super::aligner::MultiSeriesAligner;
use super::calculator::{bunch_current, scale_her_from_ler, LuminosityCalculator};
use super::config::{ChannelConfig, ChannelRole, Config, OutputFormat};
use super::constants::*;
use super::error::{ChannelError, ProcessorError};
use super::loader::ChannelLoader;
use super::series::{Channel, DerivedSample, NamedSeries};
use super::series_writer::{CsvSink, SeriesSink, SeriesWriter};
use super::timestamp::TimestampNormalizer;
use super::worker_status::{Stage, WorkerStatus};

/// The result of a run: what was produced and which channels were left out
#[derive(Debug)]
pub struct ProcessOutcome {
    pub series: Vec<NamedSeries>,
    /// Channels whose input failed the file-selection policy
    pub skipped: Vec<ChannelError>,
}

/// Divide the channel indices into a set of subsets (per thread/worker)
pub fn create_subsets(n_channels: usize, n_threads: i32) -> Vec<Vec<usize>> {
    let mut subsets: Vec<Vec<usize>> = vec![Vec::new(); n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for idx in 0..n_channels {
        subsets[idx % n_subsets].push(idx)
    }

    subsets
}

type LoadResult = (usize, Result<Channel, ChannelError>);

/// Load a subset of the channels on one worker
fn load_subset(
    config: &Config,
    loader: ChannelLoader<'_>,
    subset: Vec<usize>,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<Vec<LoadResult>, ProcessorError> {
    let n_total = subset.len();
    let mut results = Vec::with_capacity(n_total);
    for (count, idx) in subset.into_iter().enumerate() {
        let channel_config = &config.channels[idx];
        tx.send(WorkerStatus::new(
            count as f32 / n_total as f32,
            &channel_config.name,
            worker_id,
            Stage::Loading,
        ))?;
        results.push((idx, loader.load(channel_config)));
    }
    if let Some((idx, _)) = results.last() {
        tx.send(WorkerStatus::new(
            1.0,
            &config.channels[*idx].name,
            worker_id,
            Stage::Loading,
        ))?;
    }
    Ok(results)
}

/// Load every configured channel, returning the results in configuration order.
///
/// With more than one thread the channels are spread round-robin over scoped workers;
/// channels share nothing, so the only synchronization is waiting for all of them.
pub fn load_channels(
    config: &Config,
    normalizer: &TimestampNormalizer,
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<Result<Channel, ChannelError>>, ProcessorError> {
    let loader = ChannelLoader::new(&config.input_filter, normalizer);
    let subsets = create_subsets(config.channels.len(), config.n_threads);

    let mut loaded: Vec<LoadResult> = Vec::with_capacity(config.channels.len());
    if subsets.len() == 1 {
        for subset in subsets {
            loaded.extend(load_subset(config, loader, subset, tx, 0)?);
        }
    } else {
        let worker_results = std::thread::scope(|scope| {
            let handles: Vec<_> = subsets
                .into_iter()
                .enumerate()
                .filter(|(_, subset)| !subset.is_empty()) // Dont make empty workers
                .map(|(worker_id, subset)| {
                    let tx = tx.clone();
                    scope.spawn(move || load_subset(config, loader, subset, &tx, worker_id))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        });
        for result in worker_results {
            match result {
                Ok(worker) => loaded.extend(worker?),
                Err(_) => return Err(ProcessorError::WorkerPanicked),
            }
        }
    }

    loaded.sort_by_key(|(idx, _)| *idx);
    Ok(loaded.into_iter().map(|(_, result)| result).collect())
}

/// Build every series derived from the beam current channel.
///
/// Bunch currents are always normalized by the nominal bunch count; only the
/// product and luminosity follow the filling scheme regime.
pub fn derive_beam_series(
    config: &Config,
    channel_config: &ChannelConfig,
    calculator: &LuminosityCalculator,
    ler: &Channel,
) -> Vec<NamedSeries> {
    let ratio = config.physics.her_to_ler_ratio;
    let nb = config.physics.nominal_bunch_count;

    let her = ler.map_values(HER_NAME, |i| scale_her_from_ler(i, ratio));
    let ler_bunch = ler.map_values(LER_BUNCH_NAME, |i| bunch_current(i, nb));
    let her_bunch = her.map_values(HER_BUNCH_NAME, |i| bunch_current(i, nb));

    let (product, luminosity): (Vec<DerivedSample>, Vec<DerivedSample>) = ler
        .samples()
        .iter()
        .zip(her.samples())
        .map(|(l, h)| {
            let (product, luminosity) =
                calculator.luminosity_and_product(l.value, h.value, l.timestamp);
            (
                DerivedSample::new(l.timestamp, product),
                DerivedSample::new(l.timestamp, luminosity),
            )
        })
        .unzip();

    vec![
        NamedSeries::from_channel(ler, &channel_config.display_name, channel_config.style_index),
        NamedSeries::from_channel(&her, "HER", HER_STYLE),
        NamedSeries::from_channel(
            &ler_bunch,
            &format!("{} bunch current", channel_config.display_name),
            channel_config.style_index,
        ),
        NamedSeries::from_channel(&her_bunch, "HER bunch current", HER_STYLE),
        NamedSeries::new(PRODUCT_NAME, "Bunch current product", PRODUCT_STYLE, product),
        NamedSeries::new(LUMINOSITY_NAME, "Luminosity", LUMINOSITY_STYLE, luminosity),
    ]
}

/// Input exclusions are recorded and the run goes on; anything else stops it
fn skip_or_fail(e: ChannelError, skipped: &mut Vec<ChannelError>) -> Result<(), ProcessorError> {
    if !e.is_input_exclusion() {
        return Err(ProcessorError::ChannelError(e));
    }
    spdlog::warn!("{e}");
    spdlog::warn!("Skipping channel {}...", e.channel());
    skipped.push(e);
    Ok(())
}

/// The main loop of lumilog.
///
/// Loads every channel, derives the beam series, aligns everything and hands it to the sink.
/// Channels whose input is missing, empty or filtered out are skipped and reported;
/// any other failure stops the run.
pub fn process<S: SeriesSink>(
    config: &Config,
    sink: S,
    tx: &Sender<WorkerStatus>,
) -> Result<ProcessOutcome, ProcessorError> {
    config.validate()?;
    let normalizer = TimestampNormalizer::new(config.reference_epoch()?);
    let calculator = config.physics.build_calculator(&normalizer)?;

    let loaded = load_channels(config, &normalizer, tx)?;

    let mut series: Vec<NamedSeries> = Vec::new();
    let mut skipped: Vec<ChannelError> = Vec::new();
    for (channel_config, result) in config.channels.iter().zip(loaded) {
        match result {
            Ok(channel) => match channel_config.role {
                ChannelRole::BeamCurrent => series.extend(derive_beam_series(
                    config,
                    channel_config,
                    &calculator,
                    &channel,
                )),
                ChannelRole::Auxiliary => series.push(NamedSeries::from_channel(
                    &channel,
                    &channel_config.display_name,
                    channel_config.style_index,
                )),
            },
            Err(e) => skip_or_fail(e, &mut skipped)?,
        }
    }

    let aligned = MultiSeriesAligner::new(config.alignment, config.collision_gating).align(series);

    let mut writer = SeriesWriter::new(sink, config.sentinel_policy());
    let n_series = aligned.len();
    for (idx, s) in aligned.iter().enumerate() {
        writer.write(s)?;
        tx.send(WorkerStatus::new(
            (idx + 1) as f32 / n_series as f32,
            s.name(),
            0,
            Stage::Writing,
        ))?;
    }
    writer.close()?;

    Ok(ProcessOutcome {
        series: aligned,
        skipped,
    })
}

/// Create the sink selected by the configured output format
pub fn create_sink(config: &Config) -> Result<Box<dyn SeriesSink>, ProcessorError> {
    match config.output_format {
        OutputFormat::Csv => Ok(Box::new(CsvSink::new(&config.output_path)?)),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => Ok(Box::new(super::hdf_writer::HDFSink::new(
            &config.output_path,
        )?)),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(ProcessorError::ConfigError(
            super::error::ConfigError::InvalidValue {
                key: String::from("output_format"),
                reason: String::from("hdf5 output requires the hdf5 feature"),
            },
        )),
    }
}

/// The function to be called by a separate thread (typically the CLI).
/// Creates the configured sink and runs the pipeline
pub fn run(config: Config, tx: Sender<WorkerStatus>) -> Result<ProcessOutcome, ProcessorError> {
    let sink = create_sink(&config)?;
    process(&config, sink, &tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::{Alignment, CollisionGating};
    use crate::error::InputError;
    use crate::ingest::ColumnOrder;
    use crate::series::DerivedValue;
    use crate::series_writer::MemorySink;
    use crate::timestamp::TimestampFormat;
    use approx::assert_relative_eq;
    use std::path::Path;
    use std::sync::mpsc;

    fn write_inputs(dir: &Path) -> Config {
        std::fs::write(
            dir.join("ler.csv"),
            "current,date\n1.2345,2024-10-20\n1.2345,2024-10-25\n2.0,2024-10-26\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("vacuum.csv"),
            "time,pressure\n2024/10/25 00:00:00.000000,2.0e-7\n2024/10/25 00:00:10.000000,0\n2024/10/26 00:00:00.500000,3.0e-7\n",
        )
        .unwrap();
        let mut config = Config::default();
        config.output_path = dir.join("out");
        config.physics.collision_start = String::from("2024-10-21");
        config.channels[0].path = dir.join("ler.csv");
        config.channels.push(ChannelConfig {
            name: String::from("vacuum"),
            path: dir.join("vacuum.csv"),
            role: ChannelRole::Auxiliary,
            timestamp_format: TimestampFormat::DateTimeFraction,
            column_order: ColumnOrder::TimestampFirst,
            skip_zero: true,
            display_name: String::from("Vacuum"),
            style_index: 6,
        });
        config
    }

    fn find<'a>(series: &'a [NamedSeries], name: &str) -> &'a NamedSeries {
        series
            .iter()
            .find(|s| s.name() == name)
            .unwrap_or_else(|| panic!("no series named {name}"))
    }

    #[test]
    fn test_create_subsets() {
        assert_eq!(
            create_subsets(5, 2),
            vec![vec![0, 2, 4], vec![1, 3]]
        );
        assert_eq!(create_subsets(1, 3), vec![vec![0], vec![], vec![]]);
        assert_eq!(create_subsets(2, 0), vec![vec![0, 1]]);
    }

    #[test]
    fn test_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_inputs(dir.path());
        let (tx, rx) = mpsc::channel();
        let outcome = process(&config, MemorySink::default(), &tx).unwrap();
        assert!(outcome.skipped.is_empty());

        let names: Vec<&str> = outcome.series.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "ler",
                HER_NAME,
                LER_BUNCH_NAME,
                HER_BUNCH_NAME,
                PRODUCT_NAME,
                LUMINOSITY_NAME,
                "vacuum"
            ]
        );

        let product = find(&outcome.series, PRODUCT_NAME);
        assert_eq!(product.len(), 3);
        assert_eq!(product.points()[0].value, DerivedValue::NotColliding);
        assert_relative_eq!(
            product.points()[1].value.value().unwrap(),
            0.196_407_268_923_100_68,
            max_relative = 1e-9
        );
        let lumi = find(&outcome.series, LUMINOSITY_NAME);
        assert_eq!(lumi.points()[0].value, DerivedValue::NotColliding);
        assert_eq!(lumi.style_index(), LUMINOSITY_STYLE);

        let ler_bunch = find(&outcome.series, LER_BUNCH_NAME);
        assert_eq!(ler_bunch.display_name(), "LER bunch current");
        assert_relative_eq!(
            ler_bunch.points()[0].value.value().unwrap(),
            0.526_214_833_759_590_8,
            max_relative = 1e-9
        );

        let vacuum = find(&outcome.series, "vacuum");
        assert_eq!(vacuum.len(), 2);
        assert_eq!(vacuum.points()[1].timestamp, 940_896_000.0 + 86400.0);

        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert!(statuses.iter().any(|s| s.stage == Stage::Loading));
        assert!(statuses
            .iter()
            .any(|s| s.stage == Stage::Writing && s.progress == 1.0));
    }

    #[test]
    fn test_threaded_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_inputs(dir.path());
        let (tx, _rx) = mpsc::channel();
        let sequential = process(&config, MemorySink::default(), &tx).unwrap();
        config.n_threads = 4;
        let threaded = process(&config, MemorySink::default(), &tx).unwrap();
        assert_eq!(sequential.series, threaded.series);
    }

    #[test]
    fn test_excluded_channels_do_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_inputs(dir.path());
        std::fs::write(dir.path().join("empty.csv"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "time,value\n").unwrap();
        let mut empty = config.channels[1].clone();
        empty.name = String::from("empty");
        empty.path = dir.path().join("empty.csv");
        let mut wrong = config.channels[1].clone();
        wrong.name = String::from("notes");
        wrong.path = dir.path().join("notes.txt");
        config.channels.push(empty);
        config.channels.push(wrong);

        let (tx, _rx) = mpsc::channel();
        let outcome = process(&config, MemorySink::default(), &tx).unwrap();
        assert_eq!(outcome.series.len(), 7);
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.skipped[0].channel(), "empty");
        assert!(matches!(
            outcome.skipped[1],
            ChannelError::Input {
                source: InputError::WrongExtension { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_missing_beam_input_keeps_auxiliary() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_inputs(dir.path());
        config.channels[0].path = dir.path().join("missing.csv");
        let (tx, _rx) = mpsc::channel();
        let outcome = process(&config, MemorySink::default(), &tx).unwrap();
        assert_eq!(outcome.series.len(), 1);
        assert_eq!(outcome.series[0].name(), "vacuum");
        assert_eq!(outcome.skipped[0].channel(), "ler");
    }

    #[test]
    fn test_malformed_input_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_inputs(dir.path());
        std::fs::write(dir.path().join("ler.csv"), "current,date\n1.2345\n").unwrap();
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            process(&config, MemorySink::default(), &tx),
            Err(ProcessorError::ChannelError(ChannelError::Ingest { .. }))
        ));
    }

    #[test]
    fn test_input_io_failure_fails_run() {
        let mut skipped = Vec::new();
        let denied = ChannelError::Input {
            channel: String::from("ler"),
            source: InputError::IOError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )),
        };
        assert!(matches!(
            skip_or_fail(denied, &mut skipped),
            Err(ProcessorError::ChannelError(ChannelError::Input {
                source: InputError::IOError(_),
                ..
            }))
        ));
        assert!(skipped.is_empty());

        let missing = ChannelError::Input {
            channel: String::from("ler"),
            source: InputError::Missing(Path::new("missing.csv").to_path_buf()),
        };
        skip_or_fail(missing, &mut skipped).unwrap();
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_non_finite_value_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_inputs(dir.path());
        std::fs::write(dir.path().join("ler.csv"), "current,date
NaN,2024-10-25
").unwrap();
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            process(&config, MemorySink::default(), &tx),
            Err(ProcessorError::ChannelError(ChannelError::BadValue { line: 2, .. }))
        ));
    }

    #[test]
    fn test_drop_gating_and_union() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_inputs(dir.path());
        config.collision_gating = CollisionGating::Drop;
        config.alignment = Alignment::Union;
        let (tx, _rx) = mpsc::channel();
        let outcome = process(&config, MemorySink::default(), &tx).unwrap();
        // vacuum samples land on two of the three ler days
        for s in outcome.series.iter() {
            assert_eq!(s.len(), 3);
        }
        let lumi = find(&outcome.series, LUMINOSITY_NAME);
        assert_eq!(lumi.points()[0].value, DerivedValue::Absent);
        assert!(lumi
            .points()
            .iter()
            .all(|p| p.value != DerivedValue::NotColliding));
        let vacuum = find(&outcome.series, "vacuum");
        assert_eq!(vacuum.points()[0].value, DerivedValue::Absent);
    }

    #[test]
    fn test_run_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_inputs(dir.path());
        config.legacy_sentinel = Some(LEGACY_SENTINEL);
        let (tx, _rx) = mpsc::channel();
        let outcome = run(config.clone(), tx).unwrap();
        assert_eq!(outcome.series.len(), 7);
        let lumi = std::fs::read_to_string(config.output_path.join("luminosity.csv")).unwrap();
        let lines: Vec<&str> = lumi.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "timestamp,value");
        assert_eq!(lines[1], "940464000.0,-100.0");
        assert!(config.output_path.join("series.yml").exists());
    }
}
