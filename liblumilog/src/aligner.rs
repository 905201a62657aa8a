use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::series::{DerivedSample, DerivedValue, NamedSeries};

/// How series built from separate files are put on a common axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Every series keeps its own timestamps
    #[default]
    Independent,
    /// Only timestamps present in every series are kept
    Intersection,
    /// Every series is placed on the sorted union of all timestamps. Slots a series
    /// has no sample for are Absent; at a repeated timestamp its first sample is used.
    Union,
}

/// What happens to points which precede the start of collisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionGating {
    /// Keep them, tagged NotColliding, so point counts line up across series
    #[default]
    Tag,
    /// Leave them out entirely
    Drop,
}

/// Timestamps are whole seconds, so bitwise equality is exact equality
fn key(timestamp: f64) -> u64 {
    timestamp.to_bits()
}

/// MultiSeriesAligner applies the gating and alignment policies to a set of series.
///
/// Input order within each series is preserved; nothing is re-sorted.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSeriesAligner {
    alignment: Alignment,
    gating: CollisionGating,
}

impl MultiSeriesAligner {
    pub fn new(alignment: Alignment, gating: CollisionGating) -> Self {
        Self { alignment, gating }
    }

    pub fn align(&self, series: Vec<NamedSeries>) -> Vec<NamedSeries> {
        let gated: Vec<NamedSeries> = series.into_iter().map(|s| self.gate(s)).collect();
        match self.alignment {
            Alignment::Independent => gated,
            Alignment::Intersection => Self::intersect(gated),
            Alignment::Union => Self::union(gated),
        }
    }

    fn gate(&self, series: NamedSeries) -> NamedSeries {
        match self.gating {
            CollisionGating::Tag => series,
            CollisionGating::Drop => {
                let points = series
                    .points()
                    .iter()
                    .filter(|p| p.value != DerivedValue::NotColliding)
                    .copied()
                    .collect();
                series.with_points(points)
            }
        }
    }

    fn intersect(series: Vec<NamedSeries>) -> Vec<NamedSeries> {
        let mut common: Option<FxHashSet<u64>> = None;
        for s in series.iter() {
            let keys: FxHashSet<u64> = s.points().iter().map(|p| key(p.timestamp)).collect();
            common = Some(match common {
                Some(c) => c.intersection(&keys).copied().collect(),
                None => keys,
            });
        }
        let common = common.unwrap_or_default();
        series
            .iter()
            .map(|s| {
                let points = s
                    .points()
                    .iter()
                    .filter(|p| common.contains(&key(p.timestamp)))
                    .copied()
                    .collect();
                s.with_points(points)
            })
            .collect()
    }

    fn union(series: Vec<NamedSeries>) -> Vec<NamedSeries> {
        let mut axis: Vec<f64> = series
            .iter()
            .flat_map(|s| s.points().iter().map(|p| p.timestamp))
            .collect();
        axis.sort_by(|a, b| a.total_cmp(b));
        axis.dedup();

        series
            .iter()
            .map(|s| {
                let mut lookup: FxHashMap<u64, DerivedValue> = FxHashMap::default();
                for p in s.points() {
                    lookup.entry(key(p.timestamp)).or_insert(p.value);
                }
                let points = axis
                    .iter()
                    .map(|t| {
                        let value = lookup
                            .get(&key(*t))
                            .copied()
                            .unwrap_or(DerivedValue::Absent);
                        DerivedSample::new(*t, value)
                    })
                    .collect();
                s.with_points(points)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, points: &[(f64, DerivedValue)]) -> NamedSeries {
        NamedSeries::new(
            name,
            name,
            1,
            points
                .iter()
                .map(|(t, v)| DerivedSample::new(*t, *v))
                .collect(),
        )
    }

    fn timestamps(s: &NamedSeries) -> Vec<f64> {
        s.points().iter().map(|p| p.timestamp).collect()
    }

    use DerivedValue::{Absent, NotColliding, Valid};

    #[test]
    fn test_independent_is_passthrough() {
        let input = vec![
            series("a", &[(1.0, Valid(1.0)), (3.0, NotColliding)]),
            series("b", &[(2.0, Valid(2.0))]),
        ];
        let output = MultiSeriesAligner::default().align(input.clone());
        assert_eq!(output, input);
    }

    #[test]
    fn test_drop_gating() {
        let aligner = MultiSeriesAligner::new(Alignment::Independent, CollisionGating::Drop);
        let output = aligner.align(vec![series(
            "lumi",
            &[(1.0, NotColliding), (2.0, NotColliding), (3.0, Valid(0.3))],
        )]);
        assert_eq!(output[0].points(), &[DerivedSample::new(3.0, Valid(0.3))]);
        assert_eq!(output[0].name(), "lumi");
    }

    #[test]
    fn test_intersection() {
        let aligner = MultiSeriesAligner::new(Alignment::Intersection, CollisionGating::Tag);
        let output = aligner.align(vec![
            series("a", &[(1.0, Valid(1.0)), (2.0, Valid(2.0)), (3.0, Valid(3.0))]),
            series("b", &[(2.0, NotColliding), (3.0, Valid(30.0)), (4.0, Valid(40.0))]),
        ]);
        assert_eq!(timestamps(&output[0]), vec![2.0, 3.0]);
        assert_eq!(timestamps(&output[1]), vec![2.0, 3.0]);
        assert_eq!(output[1].points()[0].value, NotColliding);
        assert!(MultiSeriesAligner::new(Alignment::Intersection, CollisionGating::Tag)
            .align(vec![])
            .is_empty());
    }

    #[test]
    fn test_union() {
        let aligner = MultiSeriesAligner::new(Alignment::Union, CollisionGating::Drop);
        let output = aligner.align(vec![
            series("a", &[(1.0, Valid(1.0)), (3.0, Valid(3.0))]),
            series("b", &[(0.0, NotColliding), (2.0, Valid(20.0)), (3.0, Valid(30.0))]),
        ]);
        assert_eq!(timestamps(&output[0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(timestamps(&output[1]), vec![1.0, 2.0, 3.0]);
        let a: Vec<DerivedValue> = output[0].points().iter().map(|p| p.value).collect();
        let b: Vec<DerivedValue> = output[1].points().iter().map(|p| p.value).collect();
        assert_eq!(a, vec![Valid(1.0), Absent, Valid(3.0)]);
        assert_eq!(b, vec![Absent, Valid(20.0), Valid(30.0)]);
    }
}
