use super::error::ChannelError;

/// A single measurement on the common time axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the reference epoch
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Channel is a named, time ordered sequence of Samples read from one input.
///
/// Channels cannot be modified once built. Construction checks that timestamps never
/// decrease, as inputs are trusted to be in file order and are never re-sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    name: String,
    samples: Vec<Sample>,
}

impl Channel {
    pub fn new(name: &str, samples: Vec<Sample>) -> Result<Self, ChannelError> {
        for (index, pair) in samples.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(ChannelError::OutOfOrder {
                    channel: name.to_string(),
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                    previous: pair[0].timestamp,
                });
            }
        }
        Ok(Self {
            name: name.to_string(),
            samples,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Build a new channel on the same time axis with transformed values
    pub fn map_values<F>(&self, name: &str, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            name: name.to_string(),
            samples: self
                .samples
                .iter()
                .map(|s| Sample::new(s.timestamp, f(s.value)))
                .collect(),
        }
    }
}

/// A derived quantity, or the reason there isn't one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivedValue {
    Valid(f64),
    /// The sample precedes the start of collisions
    NotColliding,
    /// No sample exists at this slot of an aligned axis
    Absent,
}

impl DerivedValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Valid(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedSample {
    pub timestamp: f64,
    pub value: DerivedValue,
}

impl DerivedSample {
    pub fn new(timestamp: f64, value: DerivedValue) -> Self {
        Self { timestamp, value }
    }
}

/// A finished series ready to be handed to a SeriesWriter.
///
/// The style index only exists so renderers can pick a color per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSeries {
    name: String,
    display_name: String,
    style_index: u32,
    points: Vec<DerivedSample>,
}

impl NamedSeries {
    pub fn new(
        name: &str,
        display_name: &str,
        style_index: u32,
        points: Vec<DerivedSample>,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            style_index,
            points,
        }
    }

    /// Every sample of the channel becomes a valid point
    pub fn from_channel(channel: &Channel, display_name: &str, style_index: u32) -> Self {
        let points = channel
            .samples()
            .iter()
            .map(|s| DerivedSample::new(s.timestamp, DerivedValue::Valid(s.value)))
            .collect();
        Self::new(channel.name(), display_name, style_index, points)
    }

    /// Same name and presentation hints, different points
    pub fn with_points(&self, points: Vec<DerivedSample>) -> Self {
        Self {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            style_index: self.style_index,
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn style_index(&self) -> u32 {
        self.style_index
    }

    pub fn points(&self) -> &[DerivedSample] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_rejects_out_of_order() {
        let samples = vec![
            Sample::new(0.0, 1.0),
            Sample::new(10.0, 1.0),
            Sample::new(5.0, 1.0),
        ];
        match Channel::new("ler", samples) {
            Err(ChannelError::OutOfOrder {
                channel,
                index,
                timestamp,
                previous,
            }) => {
                assert_eq!(channel, "ler");
                assert_eq!(index, 2);
                assert_eq!(timestamp, 5.0);
                assert_eq!(previous, 10.0);
            }
            other => panic!("expected OutOfOrder, got {other:?}"),
        }
    }

    #[test]
    fn test_channel_allows_repeated_timestamps() {
        let samples = vec![Sample::new(0.0, 1.0), Sample::new(0.0, 2.0)];
        let channel = Channel::new("ler", samples).unwrap();
        assert_eq!(channel.len(), 2);
        assert!(Channel::new("empty", vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_map_values_keeps_axis() {
        let channel = Channel::new("ler", vec![Sample::new(1.0, 2.0), Sample::new(2.0, 4.0)])
            .unwrap();
        let her = channel.map_values("her", |v| v * 0.5);
        assert_eq!(her.name(), "her");
        assert_eq!(her.samples(), &[Sample::new(1.0, 1.0), Sample::new(2.0, 2.0)]);
        assert_eq!(channel.samples()[0].value, 2.0);
    }

    #[test]
    fn test_series_from_channel() {
        let channel = Channel::new("ler", vec![Sample::new(1.0, 2.0)]).unwrap();
        let series = NamedSeries::from_channel(&channel, "LER", 2);
        assert_eq!(series.name(), "ler");
        assert_eq!(series.display_name(), "LER");
        assert_eq!(series.style_index(), 2);
        assert_eq!(series.points()[0].value, DerivedValue::Valid(2.0));
        assert_eq!(DerivedValue::NotColliding.value(), None);
    }
}
