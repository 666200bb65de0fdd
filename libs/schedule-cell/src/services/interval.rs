use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        TimeRange::new(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Sort and merge touching/overlapping ranges into an ordered disjoint set.
pub fn normalize(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    if ranges.is_empty() {
        return ranges;
    }
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Remove every busy range from the open set. Both inputs may be unordered;
/// the result is ordered and disjoint.
pub fn subtract(open: Vec<TimeRange>, busy: &[TimeRange]) -> Vec<TimeRange> {
    let busy = normalize(busy.to_vec());
    let mut result = Vec::new();

    for range in normalize(open) {
        let mut cursor = range.start;
        for b in busy.iter().filter(|b| b.overlaps(&range)) {
            if b.start > cursor {
                if let Some(free) = TimeRange::new(cursor, b.start.min(range.end)) {
                    result.push(free);
                }
            }
            cursor = cursor.max(b.end);
            if cursor >= range.end {
                break;
            }
        }
        if let Some(free) = TimeRange::new(cursor, range.end) {
            result.push(free);
        }
    }
    result
}

/// Pairwise intersection of two ordered disjoint sets.
pub fn intersect_sets(a: &[TimeRange], b: &[TimeRange]) -> Vec<TimeRange> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if let Some(common) = a[i].intersect(&b[j]) {
            result.push(common);
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

/// The joint free intervals for a booking request, plus the required service
/// duration and the organization's slot step. Candidate start times are not
/// materialized: [`FreeWindows::candidates`] walks them lazily and can be
/// called again to restart the sequence.
#[derive(Debug, Clone)]
pub struct FreeWindows {
    windows: Vec<TimeRange>,
    duration: Duration,
    step: Duration,
}

impl FreeWindows {
    pub fn new(windows: Vec<TimeRange>, duration: Duration, step: Duration) -> Self {
        Self {
            windows: normalize(windows),
            duration,
            step,
        }
    }

    pub fn windows(&self) -> &[TimeRange] {
        &self.windows
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Ascending candidate start times. Each candidate window of
    /// `self.duration` fits entirely inside one free interval.
    pub fn candidates(&self) -> Candidates<'_> {
        Candidates {
            windows: &self.windows,
            index: 0,
            cursor: self.windows.first().map(|w| w.start),
            duration: self.duration,
            step: self.step,
        }
    }

    /// Whether a booking of the required duration starting at `start` lies
    /// entirely inside one free interval. Used to validate requested times
    /// that need not sit on a step boundary.
    pub fn fits(&self, start: DateTime<Utc>) -> bool {
        match TimeRange::new(start, start + self.duration) {
            Some(wanted) => self.windows.iter().any(|w| w.contains(&wanted)),
            None => false,
        }
    }
}

pub struct Candidates<'a> {
    windows: &'a [TimeRange],
    index: usize,
    cursor: Option<DateTime<Utc>>,
    duration: Duration,
    step: Duration,
}

impl Iterator for Candidates<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        loop {
            let window = self.windows.get(self.index)?;
            let cursor = self.cursor.unwrap_or(window.start);

            if cursor + self.duration <= window.end {
                self.cursor = Some(cursor + self.step);
                return Some(cursor);
            }

            self.index += 1;
            self.cursor = self.windows.get(self.index).map(|w| w.start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn range(sh: u32, sm: u32, eh: u32, em: u32) -> TimeRange {
        TimeRange::new(at(sh, sm), at(eh, em)).unwrap()
    }

    #[test]
    fn subtract_splits_around_busy_ranges() {
        let open = vec![range(8, 0, 12, 0)];
        let busy = vec![range(9, 0, 9, 30), range(10, 0, 11, 0)];

        let free = subtract(open, &busy);
        assert_eq!(
            free,
            vec![range(8, 0, 9, 0), range(9, 30, 10, 0), range(11, 0, 12, 0)]
        );
    }

    #[test]
    fn subtract_drops_fully_covered_intervals() {
        let open = vec![range(8, 0, 10, 0)];
        let busy = vec![range(7, 0, 11, 0)];
        assert!(subtract(open, &busy).is_empty());
    }

    #[test]
    fn intersect_sets_keeps_common_time_only() {
        let a = vec![range(8, 0, 12, 0), range(14, 0, 18, 0)];
        let b = vec![range(10, 0, 15, 0)];
        assert_eq!(
            intersect_sets(&a, &b),
            vec![range(10, 0, 12, 0), range(14, 0, 15, 0)]
        );
    }

    #[test]
    fn candidates_walk_shift_blocks_at_step_boundaries() {
        // Two shift blocks, 60-minute service, 15-minute step: the last
        // morning candidate ends exactly at 12:00, the last afternoon one
        // at 18:00.
        let windows = vec![range(8, 0, 12, 0), range(14, 0, 18, 0)];
        let free = FreeWindows::new(windows, Duration::minutes(60), Duration::minutes(15));

        let slots: Vec<_> = free.candidates().collect();
        assert_eq!(slots.first(), Some(&at(8, 0)));
        assert!(slots.contains(&at(11, 0)));
        assert!(!slots.contains(&at(11, 15)));
        assert_eq!(slots.last(), Some(&at(17, 0)));
        assert_eq!(slots.len(), 13 + 13);

        // Restartable: a second walk yields the same sequence.
        let again: Vec<_> = free.candidates().collect();
        assert_eq!(slots, again);
    }

    #[test]
    fn candidates_empty_when_duration_exceeds_every_window() {
        let windows = vec![range(8, 0, 8, 45)];
        let free = FreeWindows::new(windows, Duration::minutes(60), Duration::minutes(15));
        assert_eq!(free.candidates().count(), 0);
    }

    #[test]
    fn fits_accepts_off_step_starts_inside_a_window() {
        let windows = vec![range(8, 0, 12, 0)];
        let free = FreeWindows::new(windows, Duration::minutes(60), Duration::minutes(15));

        assert!(free.fits(at(8, 7)));
        assert!(free.fits(at(11, 0)));
        assert!(!free.fits(at(11, 1)));
        assert!(!free.fits(at(12, 0)));
    }
}
