//! Collapse detectors.
//!
//! A *collapse* is a degeneracy where parameters stop varying within a
//! tolerance over a sliding window of monitor history: single parameters
//! pinned to a value ([`collapse_at`]), pairs tracking each other
//! ([`collapse_as`]), product-measure weights vanishing
//! ([`collapse_weight`]) or product-measure positions coalescing
//! ([`collapse_position`]).
//!
//! Detectors consume a [`MonitorReader`] snapshot and return a
//! [`CollapseResult`]. A mask is a prior result of the same family; it is
//! subtracted from the outcome and its variant selects the return variant,
//! so detector output from one iteration feeds back as the mask for the
//! next without conversion. Detectors return the empty container (never an
//! error) when nothing collapsed or when the monitor holds fewer than the
//! requested number of generations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::DetectorError;
use crate::monitor::MonitorReader;

/// Default sliding-window length, in generations.
pub const DEFAULT_GENERATIONS: usize = 50;

/// Default collapse tolerance.
pub const DEFAULT_TOLERANCE: f64 = 0.005;

/// Result of a collapse detector, doubling as the mask type.
///
/// The serialized (JSON) form of this enum is the payload of collapse stop
/// reasons; see [`crate::message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollapseResult {
    /// Collapsed parameter indices.
    Indices(BTreeSet<usize>),
    /// Pairwise-collapsed parameter index pairs, stored with `i < j`.
    Pairs(BTreeSet<(usize, usize)>),
    /// Collapsed weight indices keyed by measure.
    ByMeasure(BTreeMap<usize, BTreeSet<usize>>),
    /// Collapsed weights as explicit `(measure, index)` entries.
    MeasureIndex(BTreeSet<(usize, usize)>),
    /// Collapsed position pairs keyed by measure.
    ByMeasurePairs(BTreeMap<usize, BTreeSet<(usize, usize)>>),
    /// Collapsed positions as explicit `(measure, pair)` entries.
    MeasurePair(BTreeSet<(usize, (usize, usize))>),
    /// "Where" representation: parallel vectors of measures and indices.
    Where {
        measures: Vec<usize>,
        indices: Vec<usize>,
    },
    /// "Where" representation for position pairs.
    WherePairs {
        measures: Vec<usize>,
        pairs: Vec<(usize, usize)>,
    },
}

impl CollapseResult {
    pub fn is_empty(&self) -> bool {
        match self {
            CollapseResult::Indices(s) => s.is_empty(),
            CollapseResult::Pairs(s) => s.is_empty(),
            CollapseResult::ByMeasure(m) => m.is_empty(),
            CollapseResult::MeasureIndex(s) => s.is_empty(),
            CollapseResult::ByMeasurePairs(m) => m.is_empty(),
            CollapseResult::MeasurePair(s) => s.is_empty(),
            CollapseResult::Where { measures, .. } => measures.is_empty(),
            CollapseResult::WherePairs { measures, .. } => measures.is_empty(),
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            CollapseResult::Indices(_) => "Indices",
            CollapseResult::Pairs(_) => "Pairs",
            CollapseResult::ByMeasure(_) => "ByMeasure",
            CollapseResult::MeasureIndex(_) => "MeasureIndex",
            CollapseResult::ByMeasurePairs(_) => "ByMeasurePairs",
            CollapseResult::MeasurePair(_) => "MeasurePair",
            CollapseResult::Where { .. } => "Where",
            CollapseResult::WherePairs { .. } => "WherePairs",
        }
    }
}

/// Collapse target for [`collapse_at`]: a single value or one per index.
#[derive(Debug, Clone)]
pub enum Target {
    Scalar(f64),
    PerIndex(Vec<f64>),
}

impl From<f64> for Target {
    fn from(v: f64) -> Self {
        Target::Scalar(v)
    }
}

impl Target {
    fn at(&self, i: usize) -> f64 {
        match self {
            Target::Scalar(t) => *t,
            Target::PerIndex(v) => v[i],
        }
    }

    fn check_len(&self, dim: usize) -> Result<(), DetectorError> {
        match self {
            Target::PerIndex(v) if v.len() != dim => Err(DetectorError::TargetLength {
                expected: dim,
                got: v.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Collapse tolerance: a single value or one per index.
#[derive(Debug, Clone)]
pub enum Tolerance {
    Scalar(f64),
    PerIndex(Vec<f64>),
}

impl From<f64> for Tolerance {
    fn from(v: f64) -> Self {
        Tolerance::Scalar(v)
    }
}

impl Tolerance {
    fn at(&self, i: usize) -> f64 {
        match self {
            Tolerance::Scalar(t) => *t,
            Tolerance::PerIndex(v) => v[i],
        }
    }

    fn check_len(&self, dim: usize) -> Result<(), DetectorError> {
        match self {
            Tolerance::PerIndex(v) if v.len() != dim => Err(DetectorError::ToleranceLength {
                expected: dim,
                got: v.len(),
            }),
            _ => Ok(()),
        }
    }
}

fn ordered(pair: (usize, usize)) -> (usize, usize) {
    if pair.0 <= pair.1 {
        pair
    } else {
        (pair.1, pair.0)
    }
}

fn unsupported(detector: &'static str, mask: &CollapseResult) -> DetectorError {
    DetectorError::UnsupportedMask {
        detector,
        variant: mask.variant_name(),
    }
}

/// Indices whose trajectory stayed within `tolerance` of a fixed value over
/// the last `generations` monitor entries.
///
/// With no target the criterion is `max - min <= tolerance` per index; with
/// a target it is `max |x - target| <= tolerance`. Masked indices are
/// removed from the result. Accepts only an `Indices` mask.
pub fn collapse_at(
    monitor: &MonitorReader,
    target: Option<&Target>,
    tolerance: &Tolerance,
    generations: usize,
    mask: Option<&CollapseResult>,
) -> Result<CollapseResult, DetectorError> {
    let no_mask = BTreeSet::new();
    let masked = match mask {
        None => &no_mask,
        Some(CollapseResult::Indices(s)) => s,
        Some(other) => return Err(unsupported("collapse_at", other)),
    };

    if monitor.len() < generations {
        return Ok(CollapseResult::Indices(BTreeSet::new()));
    }
    let window = monitor.solutions(Some(generations));
    let dim = window.ncols();
    tolerance.check_len(dim)?;
    if let Some(target) = target {
        target.check_len(dim)?;
    }

    let mut collapsed = BTreeSet::new();
    for i in 0..dim {
        let column = window.column(i);
        let spread = match target {
            None => {
                let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
                max - min
            }
            Some(t) => column
                .iter()
                .map(|&v| (v - t.at(i)).abs())
                .fold(f64::NEG_INFINITY, f64::max),
        };
        if spread <= tolerance.at(i) && !masked.contains(&i) {
            collapsed.insert(i);
        }
    }
    Ok(CollapseResult::Indices(collapsed))
}

/// Index pairs `(i, j)` with `i < j` whose trajectories tracked each other
/// within `tolerance` over the last `generations` entries.
///
/// With `offset = false` the criterion is `max |x_i - x_j| <= tolerance`
/// (same position); with `offset = true` it is
/// `ptp(x_i - x_j) <= tolerance` (tracking at a fixed distance). An
/// `Indices` mask removes every pair touching the given indices; a `Pairs`
/// mask removes exactly the given (unordered) pairs.
pub fn collapse_as(
    monitor: &MonitorReader,
    offset: bool,
    tolerance: f64,
    generations: usize,
    mask: Option<&CollapseResult>,
) -> Result<CollapseResult, DetectorError> {
    match mask {
        None | Some(CollapseResult::Indices(_)) | Some(CollapseResult::Pairs(_)) => {}
        Some(other) => return Err(unsupported("collapse_as", other)),
    }

    if monitor.len() < generations {
        return Ok(CollapseResult::Pairs(BTreeSet::new()));
    }
    let window = monitor.solutions(Some(generations));
    let dim = window.ncols();

    let mut collapsed = BTreeSet::new();
    for i in 0..dim {
        for j in (i + 1)..dim {
            let mut max = f64::NEG_INFINITY;
            let mut min = f64::INFINITY;
            for k in 0..window.nrows() {
                let d = window[[k, i]] - window[[k, j]];
                max = max.max(d);
                min = min.min(d);
            }
            let spread = if offset {
                max - min
            } else {
                max.abs().max(min.abs())
            };
            if spread <= tolerance {
                collapsed.insert((i, j));
            }
        }
    }

    match mask {
        None => {}
        Some(CollapseResult::Indices(idxs)) => {
            collapsed.retain(|&(i, j)| !idxs.contains(&i) && !idxs.contains(&j));
        }
        Some(CollapseResult::Pairs(pairs)) => {
            let pairs: BTreeSet<(usize, usize)> = pairs.iter().map(|&p| ordered(p)).collect();
            collapsed.retain(|&p| !pairs.contains(&p));
        }
        Some(_) => unreachable!(),
    }
    Ok(CollapseResult::Pairs(collapsed))
}

// Weight collapses in `(measure, index)` terms, before formatting.
fn vanished_weights(
    weights: &[Vec<ndarray::Array1<f64>>],
    tolerance: f64,
) -> BTreeSet<(usize, usize)> {
    let mut out = BTreeSet::new();
    let measures = weights.iter().map(|g| g.len()).min().unwrap_or(0);
    for m in 0..measures {
        let npts = weights.iter().map(|g| g[m].len()).min().unwrap_or(0);
        for i in 0..npts {
            let max = weights
                .iter()
                .map(|g| g[m][i])
                .fold(f64::NEG_INFINITY, f64::max);
            if max <= tolerance {
                out.insert((m, i));
            }
        }
    }
    out
}

/// Product-measure weight indices that stayed at or below `tolerance` over
/// the last `generations` entries.
///
/// The mask variant selects the output shape: `ByMeasure` (the default for
/// no mask), `MeasureIndex` pairs, or the `Where` parallel-vector form.
pub fn collapse_weight(
    monitor: &MonitorReader,
    tolerance: f64,
    generations: usize,
    mask: Option<&CollapseResult>,
) -> Result<CollapseResult, DetectorError> {
    match mask {
        None
        | Some(CollapseResult::ByMeasure(_))
        | Some(CollapseResult::MeasureIndex(_)) => {}
        Some(CollapseResult::Where { measures, indices }) => {
            if measures.len() != indices.len() {
                return Err(DetectorError::RaggedWhereMask {
                    measures: measures.len(),
                    entries: indices.len(),
                });
            }
        }
        Some(other) => return Err(unsupported("collapse_weight", other)),
    }

    let weights = monitor.weights(Some(generations));
    let vanished = if weights.len() < generations {
        BTreeSet::new()
    } else {
        vanished_weights(&weights, tolerance)
    };

    Ok(match mask {
        None => by_measure(vanished, &BTreeMap::new()),
        Some(CollapseResult::ByMeasure(masked)) => by_measure(vanished, masked),
        Some(CollapseResult::MeasureIndex(masked)) => {
            CollapseResult::MeasureIndex(vanished.difference(masked).cloned().collect())
        }
        Some(CollapseResult::Where { measures, indices }) => {
            let masked: BTreeSet<(usize, usize)> = measures
                .iter()
                .zip(indices.iter())
                .map(|(&m, &i)| (m, i))
                .collect();
            let (measures, indices) = vanished
                .into_iter()
                .filter(|entry| !masked.contains(entry))
                .unzip();
            CollapseResult::Where { measures, indices }
        }
        Some(_) => unreachable!(),
    })
}

fn by_measure(
    entries: BTreeSet<(usize, usize)>,
    masked: &BTreeMap<usize, BTreeSet<usize>>,
) -> CollapseResult {
    let mut out: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for (m, i) in entries {
        if masked.get(&m).is_some_and(|s| s.contains(&i)) {
            continue;
        }
        out.entry(m).or_default().insert(i);
    }
    CollapseResult::ByMeasure(out)
}

/// Product-measure position pairs (within each measure) that coalesced to
/// within `tolerance` over the last `generations` entries.
///
/// The mask variant selects the output shape: `ByMeasurePairs` (the default
/// for no mask), `MeasurePair` entries, or the `WherePairs` form. Pair
/// masks are matched unordered.
pub fn collapse_position(
    monitor: &MonitorReader,
    tolerance: f64,
    generations: usize,
    mask: Option<&CollapseResult>,
) -> Result<CollapseResult, DetectorError> {
    match mask {
        None
        | Some(CollapseResult::ByMeasurePairs(_))
        | Some(CollapseResult::MeasurePair(_)) => {}
        Some(CollapseResult::WherePairs { measures, pairs }) => {
            if measures.len() != pairs.len() {
                return Err(DetectorError::RaggedWhereMask {
                    measures: measures.len(),
                    entries: pairs.len(),
                });
            }
        }
        Some(other) => return Err(unsupported("collapse_position", other)),
    }

    let positions = monitor.positions(Some(generations));
    let mut coalesced: BTreeSet<(usize, (usize, usize))> = BTreeSet::new();
    if positions.len() >= generations {
        let measures = positions.iter().map(|g| g.len()).min().unwrap_or(0);
        for m in 0..measures {
            let npts = positions.iter().map(|g| g[m].len()).min().unwrap_or(0);
            for i in 0..npts {
                for j in (i + 1)..npts {
                    let max = positions
                        .iter()
                        .map(|g| (g[m][i] - g[m][j]).abs())
                        .fold(f64::NEG_INFINITY, f64::max);
                    if max <= tolerance {
                        coalesced.insert((m, (i, j)));
                    }
                }
            }
        }
    }

    Ok(match mask {
        None => by_measure_pairs(coalesced, &BTreeMap::new()),
        Some(CollapseResult::ByMeasurePairs(masked)) => by_measure_pairs(coalesced, masked),
        Some(CollapseResult::MeasurePair(masked)) => {
            let masked: BTreeSet<(usize, (usize, usize))> =
                masked.iter().map(|&(m, p)| (m, ordered(p))).collect();
            CollapseResult::MeasurePair(
                coalesced
                    .into_iter()
                    .filter(|entry| !masked.contains(entry))
                    .collect(),
            )
        }
        Some(CollapseResult::WherePairs { measures, pairs }) => {
            let masked: BTreeSet<(usize, (usize, usize))> = measures
                .iter()
                .zip(pairs.iter())
                .map(|(&m, &p)| (m, ordered(p)))
                .collect();
            let (measures, pairs) = coalesced
                .into_iter()
                .filter(|entry| !masked.contains(entry))
                .unzip();
            CollapseResult::WherePairs { measures, pairs }
        }
        Some(_) => unreachable!(),
    })
}

fn by_measure_pairs(
    entries: BTreeSet<(usize, (usize, usize))>,
    masked: &BTreeMap<usize, BTreeSet<(usize, usize)>>,
) -> CollapseResult {
    let mut out: BTreeMap<usize, BTreeSet<(usize, usize)>> = BTreeMap::new();
    for (m, pair) in entries {
        let hidden = masked
            .get(&m)
            .is_some_and(|s| s.contains(&pair) || s.contains(&(pair.1, pair.0)));
        if !hidden {
            out.entry(m).or_default().insert(pair);
        }
    }
    CollapseResult::ByMeasurePairs(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Monitor;
    use ndarray::array;

    // 60 entries; column 0 pinned at 0.5, column 1 wandering, column 2
    // pinned at 0.0
    fn pinned_monitor() -> Monitor {
        let monitor = Monitor::new();
        for k in 0..60 {
            let wander = (k as f64 * 0.7).sin();
            monitor.record_step(&array![0.5, wander, 0.0], wander.abs());
        }
        monitor
    }

    #[test]
    fn test_collapse_at_without_target() {
        let reader = pinned_monitor().reader();
        let result =
            collapse_at(&reader, None, &Tolerance::Scalar(1e-9), 50, None).unwrap();
        assert_eq!(result, CollapseResult::Indices(BTreeSet::from([0, 2])));
    }

    #[test]
    fn test_collapse_at_with_target_zero() {
        let reader = pinned_monitor().reader();
        let result = collapse_at(
            &reader,
            Some(&Target::Scalar(0.0)),
            &Tolerance::Scalar(1e-3),
            50,
            None,
        )
        .unwrap();
        assert_eq!(result, CollapseResult::Indices(BTreeSet::from([2])));
    }

    #[test]
    fn test_collapse_at_per_index_tolerance() {
        let reader = pinned_monitor().reader();
        // generous tolerance on column 1 only
        let tol = Tolerance::PerIndex(vec![1e-9, 10.0, 1e-9]);
        let result = collapse_at(&reader, None, &tol, 50, None).unwrap();
        assert_eq!(result, CollapseResult::Indices(BTreeSet::from([0, 1, 2])));
    }

    #[test]
    fn test_collapse_at_mask_subtraction() {
        let reader = pinned_monitor().reader();
        let tol = Tolerance::Scalar(1e-9);
        let first = collapse_at(&reader, None, &tol, 50, None).unwrap();
        let second = collapse_at(&reader, None, &tol, 50, Some(&first)).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_collapse_at_short_history_is_empty() {
        let monitor = Monitor::new();
        monitor.record_step(&array![0.0], 0.0);
        let result =
            collapse_at(&monitor.reader(), None, &Tolerance::Scalar(1.0), 50, None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_collapse_at_rejects_pair_mask() {
        let reader = pinned_monitor().reader();
        let mask = CollapseResult::Pairs(BTreeSet::new());
        let err = collapse_at(&reader, None, &Tolerance::Scalar(1.0), 50, Some(&mask))
            .unwrap_err();
        assert_eq!(
            err,
            DetectorError::UnsupportedMask {
                detector: "collapse_at",
                variant: "Pairs"
            }
        );
    }

    #[test]
    fn test_tolerance_monotonicity() {
        let reader = pinned_monitor().reader();
        let loose = collapse_at(&reader, None, &Tolerance::Scalar(10.0), 50, None).unwrap();
        let tight = collapse_at(&reader, None, &Tolerance::Scalar(1e-9), 50, None).unwrap();
        let (CollapseResult::Indices(loose), CollapseResult::Indices(tight)) = (loose, tight)
        else {
            panic!("expected index results");
        };
        assert!(tight.is_subset(&loose));
    }

    // columns 0 and 1 track at distance 1.0; columns 0 and 2 coincide
    fn tracking_monitor() -> Monitor {
        let monitor = Monitor::new();
        for k in 0..60 {
            let base = (k as f64 * 0.3).cos();
            monitor.record_step(&array![base, base + 1.0, base], 0.0);
        }
        monitor
    }

    #[test]
    fn test_collapse_as_same_position() {
        let reader = tracking_monitor().reader();
        let result = collapse_as(&reader, false, 1e-9, 50, None).unwrap();
        assert_eq!(result, CollapseResult::Pairs(BTreeSet::from([(0, 2)])));
    }

    #[test]
    fn test_collapse_as_with_offset() {
        let reader = tracking_monitor().reader();
        let result = collapse_as(&reader, true, 1e-9, 50, None).unwrap();
        assert_eq!(
            result,
            CollapseResult::Pairs(BTreeSet::from([(0, 1), (0, 2), (1, 2)]))
        );
    }

    #[test]
    fn test_collapse_as_bare_index_mask_widens() {
        let reader = tracking_monitor().reader();
        let mask = CollapseResult::Indices(BTreeSet::from([0]));
        let result = collapse_as(&reader, true, 1e-9, 50, Some(&mask)).unwrap();
        assert_eq!(result, CollapseResult::Pairs(BTreeSet::from([(1, 2)])));
    }

    #[test]
    fn test_collapse_as_pair_mask_is_unordered() {
        let reader = tracking_monitor().reader();
        let mask = CollapseResult::Pairs(BTreeSet::from([(2, 0)]));
        let result = collapse_as(&reader, false, 1e-9, 50, Some(&mask)).unwrap();
        assert!(result.is_empty());
    }

    // two measures; measure 0 has weight index 1 vanishing, measure 1 has
    // positions 0 and 2 coalesced
    fn product_monitor() -> Monitor {
        let monitor = Monitor::new();
        for k in 0..60 {
            let t = k as f64 * 0.1;
            monitor.record_measures(
                &array![0.9, 0.0, 0.5, 0.5],
                0.0,
                vec![array![0.9 + 0.05 * t.sin(), 1e-4], array![0.5, 0.5]],
                vec![
                    array![t.sin(), 2.0 + t.cos()],
                    array![1.0, -1.0 + t.sin(), 1.0],
                ],
            );
        }
        monitor
    }

    #[test]
    fn test_collapse_weight_default_format() {
        let reader = product_monitor().reader();
        let result = collapse_weight(&reader, 0.005, 50, None).unwrap();
        assert_eq!(
            result,
            CollapseResult::ByMeasure(BTreeMap::from([(0, BTreeSet::from([1]))]))
        );
    }

    #[test]
    fn test_collapse_weight_mask_selects_format() {
        let reader = product_monitor().reader();

        let set_mask = CollapseResult::MeasureIndex(BTreeSet::new());
        let as_set = collapse_weight(&reader, 0.005, 50, Some(&set_mask)).unwrap();
        assert_eq!(
            as_set,
            CollapseResult::MeasureIndex(BTreeSet::from([(0, 1)]))
        );

        let where_mask = CollapseResult::Where {
            measures: vec![],
            indices: vec![],
        };
        let as_where = collapse_weight(&reader, 0.005, 50, Some(&where_mask)).unwrap();
        assert_eq!(
            as_where,
            CollapseResult::Where {
                measures: vec![0],
                indices: vec![1],
            }
        );
    }

    #[test]
    fn test_collapse_weight_feedback_masking() {
        let reader = product_monitor().reader();
        let first = collapse_weight(&reader, 0.005, 50, None).unwrap();
        let second = collapse_weight(&reader, 0.005, 50, Some(&first)).unwrap();
        assert_eq!(second, CollapseResult::ByMeasure(BTreeMap::new()));
    }

    #[test]
    fn test_collapse_weight_without_product_data_is_empty() {
        let reader = pinned_monitor().reader();
        let result = collapse_weight(&reader, 0.005, 50, None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_collapse_weight_ragged_where_mask() {
        let reader = product_monitor().reader();
        let mask = CollapseResult::Where {
            measures: vec![0, 1],
            indices: vec![0],
        };
        let err = collapse_weight(&reader, 0.005, 50, Some(&mask)).unwrap_err();
        assert_eq!(
            err,
            DetectorError::RaggedWhereMask {
                measures: 2,
                entries: 1
            }
        );
    }

    #[test]
    fn test_collapse_position_default_format() {
        let reader = product_monitor().reader();
        let result = collapse_position(&reader, 1e-9, 50, None).unwrap();
        assert_eq!(
            result,
            CollapseResult::ByMeasurePairs(BTreeMap::from([(
                1,
                BTreeSet::from([(0, 2)])
            )]))
        );
    }

    #[test]
    fn test_collapse_position_pair_mask_is_unordered() {
        let reader = product_monitor().reader();
        let mask = CollapseResult::MeasurePair(BTreeSet::from([(1, (2, 0))]));
        let result = collapse_position(&reader, 1e-9, 50, Some(&mask)).unwrap();
        assert_eq!(result, CollapseResult::MeasurePair(BTreeSet::new()));
    }

    #[test]
    fn test_collapse_position_scalar_telemetry_is_empty() {
        // monitor records plain vectors, no product-measure positions
        let reader = pinned_monitor().reader();
        let result = collapse_position(&reader, 1e-9, 50, None).unwrap();
        assert!(result.is_empty());
    }
}
