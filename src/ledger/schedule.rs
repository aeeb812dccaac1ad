use std::sync::Arc;

use chrono::Days;

use crate::model::{CarId, DateRange};

/// Booked ranges of one car, in start order. Cheap to clone and can be
/// iterated any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub car_id: CarId,
    ranges: Arc<[DateRange]>,
}

impl Schedule {
    pub(crate) fn new(car_id: CarId, ranges: Vec<DateRange>) -> Self {
        Self {
            car_id,
            ranges: ranges.into(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = DateRange> + '_ {
        self.ranges.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Merge overlapping and back-to-back ranges into disjoint busy blocks.
    pub fn busy_blocks(&self) -> Vec<DateRange> {
        let mut merged: Vec<DateRange> = Vec::new();
        for range in self.iter() {
            if let Some(last) = merged.last_mut()
                && last.end.checked_add_days(Days::new(1)).is_none_or(|next| range.start <= next)
            {
                last.end = last.end.max(range.end);
                continue;
            }
            merged.push(range);
        }
        merged
    }

    /// Days of `window` not covered by any booking.
    pub fn free_within(&self, window: DateRange) -> Vec<DateRange> {
        let mut free = Vec::new();
        let mut cursor = Some(window.start);
        for block in self.busy_blocks() {
            let Some(from) = cursor else { break };
            if block.end < from {
                continue;
            }
            if block.start > window.end {
                break;
            }
            if block.start > from
                && let Some(until) = block.start.checked_sub_days(Days::new(1))
            {
                free.push(DateRange::new(from, until.min(window.end)));
            }
            cursor = block.end.checked_add_days(Days::new(1));
        }
        if let Some(from) = cursor
            && from <= window.end
        {
            free.push(DateRange::new(from, window.end));
        }
        free
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = DateRange;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, DateRange>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn r(a: &str, b: &str) -> DateRange {
        DateRange::new(a.parse::<NaiveDate>().unwrap(), b.parse::<NaiveDate>().unwrap())
    }

    #[test]
    fn iteration_is_restartable() {
        let s = Schedule::new(Ulid::new(), vec![r("2024-06-01", "2024-06-02"), r("2024-06-05", "2024-06-06")]);
        let first: Vec<_> = s.iter().collect();
        let second: Vec<_> = (&s).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn busy_blocks_merge_adjacent_and_overlapping() {
        let s = Schedule::new(
            Ulid::new(),
            vec![
                r("2024-06-01", "2024-06-03"),
                r("2024-06-04", "2024-06-05"),
                r("2024-06-10", "2024-06-12"),
            ],
        );
        assert_eq!(
            s.busy_blocks(),
            vec![r("2024-06-01", "2024-06-05"), r("2024-06-10", "2024-06-12")]
        );
    }

    #[test]
    fn free_within_window() {
        let s = Schedule::new(
            Ulid::new(),
            vec![r("2024-06-03", "2024-06-04"), r("2024-06-08", "2024-06-09")],
        );
        assert_eq!(
            s.free_within(r("2024-06-01", "2024-06-10")),
            vec![
                r("2024-06-01", "2024-06-02"),
                r("2024-06-05", "2024-06-07"),
                r("2024-06-10", "2024-06-10"),
            ]
        );
    }

    #[test]
    fn free_within_fully_booked() {
        let s = Schedule::new(Ulid::new(), vec![r("2024-05-20", "2024-06-20")]);
        assert!(s.free_within(r("2024-06-01", "2024-06-10")).is_empty());
    }

    #[test]
    fn free_within_empty_schedule() {
        let s = Schedule::new(Ulid::new(), Vec::new());
        let window = r("2024-06-01", "2024-06-10");
        assert!(s.is_empty());
        assert_eq!(s.free_within(window), vec![window]);
    }
}
