use super::config::ChannelConfig;
use super::error::ChannelError;
use super::ingest::CsvIngester;
use super::input::InputFilter;
use super::series::{Channel, Sample};
use super::timestamp::TimestampNormalizer;

/// ChannelLoader turns a configured input into an immutable Channel.
///
/// It selects the input files, ingests every row, parses the value and timestamp
/// columns in the declared order and format, and applies the zero-reading filter.
/// A row which cannot be parsed fails the whole channel; there is no partial success.
#[derive(Debug, Clone, Copy)]
pub struct ChannelLoader<'a> {
    filter: &'a InputFilter,
    normalizer: &'a TimestampNormalizer,
}

impl<'a> ChannelLoader<'a> {
    pub fn new(filter: &'a InputFilter, normalizer: &'a TimestampNormalizer) -> Self {
        Self { filter, normalizer }
    }

    pub fn load(&self, config: &ChannelConfig) -> Result<Channel, ChannelError> {
        let name = &config.name;
        let stack = self
            .filter
            .select(&config.path)
            .map_err(|source| ChannelError::Input {
                channel: name.clone(),
                source,
            })?;
        spdlog::info!(
            "Loading channel {} from {} file(s) with total size {}",
            name,
            stack.files().len(),
            human_bytes::human_bytes(stack.total_size_bytes() as f64)
        );

        let mut samples: Vec<Sample> = Vec::new();
        let mut zero_count: usize = 0;
        for path in stack.files() {
            spdlog::debug!("Channel {} reading {}", name, path.to_string_lossy());
            let ingester = CsvIngester::open(path).map_err(|source| ChannelError::Ingest {
                channel: name.clone(),
                source,
            })?;
            for record in ingester {
                let record = record.map_err(|source| ChannelError::Ingest {
                    channel: name.clone(),
                    source,
                })?;
                let (value_text, timestamp_text) = record.fields(config.column_order);
                // NaN and inf parse as f64 but are not readings
                let value = value_text
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ChannelError::BadValue {
                        channel: name.clone(),
                        line: record.line,
                        text: value_text.to_string(),
                    })?;
                let timestamp = self
                    .normalizer
                    .normalize(timestamp_text, config.timestamp_format)
                    .map_err(|source| ChannelError::Timestamp {
                        channel: name.clone(),
                        line: record.line,
                        source,
                    })?;
                // Only well formed records get here, so a skip is always deliberate
                if config.skip_zero && value == 0.0 {
                    zero_count += 1;
                    continue;
                }
                samples.push(Sample::new(timestamp, value));
            }
        }
        if zero_count > 0 {
            spdlog::debug!("Channel {} skipped {} zero readings", name, zero_count);
        }

        let channel = Channel::new(name, samples)?;
        spdlog::info!("Loaded {} samples for channel {}", channel.len(), name);
        Ok(channel)
    }
}
