//! Selection of the currently effective record among time-ranged candidates.

use chrono::{DateTime, Utc};

/// A record valid over `[start, end)`, or from `start` onwards when `end` is unset.
pub trait Effective {
    fn effective_start(&self) -> DateTime<Utc>;

    fn effective_end(&self) -> Option<DateTime<Utc>>;

    fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        let start = self.effective_start();
        match self.effective_end() {
            Some(end) => start <= now && now < end,
            None => start <= now,
        }
    }
}

/// Returns the candidate effective at `now`. When several qualify the one
/// with the latest start wins; `None` when nothing qualifies.
pub fn active_among<'a, T, I>(now: DateTime<Utc>, candidates: I) -> Option<&'a T>
where
    T: Effective + 'a,
    I: IntoIterator<Item = &'a T>,
{
    candidates
        .into_iter()
        .filter(|c| c.is_effective_at(now))
        .fold(None, |best: Option<&'a T>, c| match best {
            Some(b) if b.effective_start() >= c.effective_start() => Some(b),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[derive(Debug, PartialEq)]
    struct Window {
        name: &'static str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    }

    impl Effective for Window {
        fn effective_start(&self) -> DateTime<Utc> {
            self.start
        }

        fn effective_end(&self) -> Option<DateTime<Utc>> {
            self.end
        }
    }

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn window(name: &'static str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Window {
        Window { name, start, end }
    }

    #[test]
    fn adjacent_intervals_switch_at_boundary() {
        let candidates = vec![
            window("first", t(1), Some(t(10))),
            window("second", t(10), Some(t(20))),
        ];

        for now in [t(1), t(5), t(10) - Duration::seconds(1)] {
            assert_eq!(active_among(now, &candidates).unwrap().name, "first");
        }
        assert_eq!(active_among(t(10), &candidates).unwrap().name, "second");
        assert!(active_among(t(20), &candidates).is_none());
    }

    #[test]
    fn open_ended_candidate_is_active_from_start() {
        let candidates = vec![window("open", t(5), None)];
        assert!(active_among(t(4), &candidates).is_none());
        assert_eq!(active_among(t(5), &candidates).unwrap().name, "open");
        assert_eq!(active_among(t(28), &candidates).unwrap().name, "open");
    }

    #[test]
    fn overlap_prefers_latest_start() {
        let candidates = vec![
            window("old", t(1), None),
            window("newer", t(3), Some(t(30))),
            window("future", t(15), None),
        ];
        assert_eq!(active_among(t(10), &candidates).unwrap().name, "newer");
        assert_eq!(active_among(t(16), &candidates).unwrap().name, "future");
    }

    #[test]
    fn empty_candidates_yield_none() {
        let candidates: Vec<Window> = Vec::new();
        assert!(active_among(t(1), &candidates).is_none());
    }
}
