//! Time-of-use tariff engine.
//!
//! Splits a charging session over the configured peak/normal/valley windows.
//! A day is represented as a covering of 24 hour slots; a single lookup by
//! `t.hour()` into the precomputed table handles midnight-wrapping windows
//! without special cases in the hot path.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::domain::{TariffPeriod, TariffSegment, TariffWindow};

/// Precomputed hour → window table over one day.
#[derive(Debug, Clone)]
pub struct TariffTable {
    by_hour: [TariffWindow; 24],
}

impl TariffTable {
    /// Build the table from configured windows. Hours not covered by any
    /// window fall back to the default `normal` window; later windows win on
    /// overlap.
    pub fn new(windows: &[TariffWindow]) -> Self {
        let mut by_hour: [TariffWindow; 24] =
            std::array::from_fn(|_| TariffWindow::default_normal());

        for window in windows {
            let (start, end) = (window.start_hour % 24, window.end_hour.min(24));
            if window.start_hour < window.end_hour {
                for slot in by_hour.iter_mut().take(end as usize).skip(start as usize) {
                    *slot = window.clone();
                }
            } else {
                // wraps midnight: [start..24) and [0..end)
                for (hour, slot) in by_hour.iter_mut().enumerate() {
                    if hour as u32 >= start || (hour as u32) < window.end_hour % 24 {
                        *slot = window.clone();
                    }
                }
            }
        }

        Self { by_hour }
    }

    pub fn window_at_hour(&self, hour: u32) -> &TariffWindow {
        &self.by_hour[(hour % 24) as usize]
    }

    /// Unit electric fee of a period as configured (falls back to the
    /// default normal rate if the period never appears in the table).
    pub fn unit_price(&self, period: TariffPeriod) -> f64 {
        self.by_hour
            .iter()
            .find(|w| w.period == period)
            .map(|w| w.electric_fee)
            .unwrap_or_else(|| TariffWindow::default_normal().electric_fee)
    }

    /// Split `[start, end]` with total energy `energy` into ordered segments
    /// covering the interval with no gap or overlap.
    ///
    /// Energy is apportioned proportional to time, so Σ segment energy equals
    /// `energy` exactly (the last segment absorbs the remainder). Degenerate
    /// input yields a single zero-cost `normal` segment.
    pub fn split(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        energy: f64,
    ) -> Vec<TariffSegment> {
        if end <= start || energy <= 0.0 {
            return vec![TariffSegment {
                period: TariffPeriod::Normal,
                start_time: start,
                end_time: start,
                duration_hours: 0.0,
                energy: 0.0,
                electric_fee: self.unit_price(TariffPeriod::Normal),
                service_fee: TariffWindow::default_normal().service_fee,
                electric_cost: 0.0,
                service_cost: 0.0,
            }];
        }

        let total_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        let mut segments = Vec::new();
        let mut cursor = start;
        let mut allocated = 0.0;

        while cursor < end {
            let window = self.window_at_hour(cursor.hour()).clone();

            // advance hour by hour until the window's period changes
            let mut boundary = next_hour(cursor);
            while boundary < end && self.window_at_hour(boundary.hour()).period == window.period {
                boundary += Duration::hours(1);
            }
            let seg_end = boundary.min(end);

            let seg_secs = (seg_end - cursor).num_milliseconds() as f64 / 1000.0;
            let seg_energy = if seg_end == end {
                // absorb rounding remainder so the energies sum exactly
                energy - allocated
            } else {
                energy * seg_secs / total_secs
            };
            allocated += seg_energy;

            segments.push(TariffSegment {
                period: window.period,
                start_time: cursor,
                end_time: seg_end,
                duration_hours: seg_secs / 3600.0,
                energy: seg_energy,
                electric_fee: window.electric_fee,
                service_fee: window.service_fee,
                electric_cost: seg_energy * window.electric_fee,
                service_cost: seg_energy * window.service_fee,
            });

            cursor = seg_end;
        }

        segments
    }

    /// Period with the largest total duration; ties broken
    /// peak > normal > valley.
    pub fn dominant_period(segments: &[TariffSegment]) -> TariffPeriod {
        let mut totals: Vec<(TariffPeriod, f64)> = Vec::new();
        for seg in segments {
            match totals.iter_mut().find(|(p, _)| *p == seg.period) {
                Some((_, d)) => *d += seg.duration_hours,
                None => totals.push((seg.period, seg.duration_hours)),
            }
        }
        totals
            .into_iter()
            .max_by(|(pa, da), (pb, db)| {
                da.partial_cmp(db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // on equal duration the lower rank (peak first) wins
                    .then(pb.rank().cmp(&pa.rank()))
            })
            .map(|(p, _)| p)
            .unwrap_or(TariffPeriod::Normal)
    }
}

fn next_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = t
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t);
    truncated + Duration::hours(1)
}

// ── Tests ──────────────────────────────────────────────────────
