//! Rolling time window over a snapshot.
//!
//! A [`PlaybackCursor`] advances by a fixed step on every refresh tick and wraps
//! back to the oldest timestamp once it passes the newest one. Over bounded
//! historical data this loops; over live data the cursor is dragged forward
//! whenever the oldest row moves past it.

/// Rows that carry a session-relative timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> f64;
}

/// Closed interval `[start, end]` in session seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    #[inline]
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn filter<T: Timestamped + Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .filter(|row| self.contains(row.timestamp()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    position: Option<f64>,
    step: f64,
    width: f64,
}

impl PlaybackCursor {
    pub fn new(step: f64, width: f64) -> Self {
        Self {
            position: None,
            step,
            width,
        }
    }

    pub fn position(&self) -> Option<f64> {
        self.position
    }

    /// Forget the position, e.g. after the viewed driver changed.
    pub fn rewind(&mut self) {
        self.position = None;
    }

    /// Advances one tick against the timestamp range `[min, max]` of the
    /// current data and returns the window to display.
    pub fn advance(&mut self, min: f64, max: f64) -> TimeWindow {
        let mut next = self.position.unwrap_or(min) + self.step;
        if next < min {
            next = min;
        }
        if next >= max {
            next = min;
        }
        self.position = Some(next);
        TimeWindow {
            start: next,
            end: next + self.width,
        }
    }

    /// Advances against the span of `rows` and returns the rows inside the
    /// resulting window. `None` when there is nothing to show.
    pub fn window<T: Timestamped + Clone>(&mut self, rows: &[T]) -> Option<(TimeWindow, Vec<T>)> {
        let (min, max) = span(rows)?;
        let window = self.advance(min, max);
        Some((window, window.filter(rows)))
    }
}

fn span<T: Timestamped>(rows: &[T]) -> Option<(f64, f64)> {
    rows.iter().map(Timestamped::timestamp).fold(None, |acc, t| match acc {
        None => Some((t, t)),
        Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(f64);

    impl Timestamped for Row {
        fn timestamp(&self) -> f64 {
            self.0
        }
    }

    fn rows(range: std::ops::Range<u32>) -> Vec<Row> {
        range.map(|t| Row(t as f64)).collect()
    }

    #[test]
    fn first_tick_starts_one_step_past_min() {
        let mut cursor = PlaybackCursor::new(0.5, 2.0);
        let window = cursor.advance(10.0, 20.0);
        assert_eq!(window, TimeWindow { start: 10.5, end: 12.5 });
    }

    #[test]
    fn cursor_loops_over_bounded_history() {
        let mut cursor = PlaybackCursor::new(1.0, 2.0);
        let data = rows(0..4);
        let starts: Vec<f64> = (0..5)
            .map(|_| cursor.window(&data).unwrap().0.start)
            .collect();
        assert_eq!(starts, vec![1.0, 2.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn cursor_is_clamped_when_live_data_moves_past_it() {
        let mut cursor = PlaybackCursor::new(0.1, 5.0);
        cursor.advance(0.0, 10.0);
        let window = cursor.advance(50.0, 55.0);
        assert_eq!(window.start, 50.0);
    }

    #[test]
    fn window_filters_rows_inclusively() {
        let mut cursor = PlaybackCursor::new(1.0, 2.0);
        let (window, visible) = cursor.window(&rows(0..10)).unwrap();
        assert_eq!(window, TimeWindow { start: 1.0, end: 3.0 });
        assert_eq!(visible, vec![Row(1.0), Row(2.0), Row(3.0)]);
    }

    #[test]
    fn empty_rows_have_no_window() {
        let mut cursor = PlaybackCursor::new(1.0, 2.0);
        assert!(cursor.window::<Row>(&[]).is_none());
        assert_eq!(cursor.position(), None);
    }
}
