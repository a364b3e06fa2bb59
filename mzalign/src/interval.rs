use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A total ordering over `f64` so that interval bounds can key an ordered map
#[derive(Debug, Clone, Copy)]
struct OrderedMz(f64);

impl PartialEq for OrderedMz {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedMz {}

impl PartialOrd for OrderedMz {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedMz {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/** An inclusive m/z interval owning `value`
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MzInterval<V> {
    pub low: f64,
    pub high: f64,
    pub value: V,
}

impl<V> MzInterval<V> {
    pub fn contains(&self, mz: f64) -> bool {
        self.low <= mz && mz <= self.high
    }
}

/// A set of non-overlapping m/z intervals, keyed on their lower bounds.
///
/// Adjacent intervals may share an endpoint. A query at that endpoint
/// resolves to the interval on the higher m/z side.
#[derive(Debug, Clone)]
pub struct MzIntervalMap<V> {
    intervals: BTreeMap<OrderedMz, (f64, V)>,
}

impl<V> Default for MzIntervalMap<V> {
    fn default() -> Self {
        Self {
            intervals: BTreeMap::new(),
        }
    }
}

impl<V: Copy> MzIntervalMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// The interval with the greatest lower bound `<= mz`, whether or not it
    /// contains `mz`
    pub fn predecessor(&self, mz: f64) -> Option<MzInterval<V>> {
        self.intervals
            .range(..=OrderedMz(mz))
            .next_back()
            .map(|(low, (high, value))| MzInterval {
                low: low.0,
                high: *high,
                value: *value,
            })
    }

    /// The interval with the smallest lower bound `> mz`
    pub fn successor(&self, mz: f64) -> Option<MzInterval<V>> {
        self.intervals
            .range((Bound::Excluded(OrderedMz(mz)), Bound::Unbounded))
            .next()
            .map(|(low, (high, value))| MzInterval {
                low: low.0,
                high: *high,
                value: *value,
            })
    }

    /// The interval containing `mz`, if any
    pub fn get(&self, mz: f64) -> Option<MzInterval<V>> {
        self.predecessor(mz).filter(|iv| iv.contains(mz))
    }

    /// Insert `[low, high]` without checking for overlap with its neighbours
    pub fn insert(&mut self, low: f64, high: f64, value: V) {
        self.intervals.insert(OrderedMz(low), (high, value));
    }

    /// Iterate over intervals in ascending m/z order
    pub fn iter(&self) -> impl Iterator<Item = MzInterval<V>> + '_ {
        self.intervals
            .iter()
            .map(|(low, (high, value))| MzInterval {
                low: low.0,
                high: *high,
                value: *value,
            })
    }
}
