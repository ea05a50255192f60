use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};
use crate::record::Record;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Tumbling window layout: boundaries at `anchor + k * width` for integer `k`.
///
/// Windows are left-closed, so a record exactly on a boundary belongs to the
/// window that starts there. Records earlier than the anchor fall into
/// windows with negative `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    anchor: DateTime<Utc>,
    width: Duration,
}

impl WindowSpec {
    pub fn new(anchor: DateTime<Utc>, width: Duration) -> CoreResult<Self> {
        if width.is_zero() {
            return Err(StructError::from(CoreReason::WindowSpec)
                .with_detail("window width must be > 0"));
        }
        // Window ids carry no sub-second part.
        if width.subsec_nanos() != 0 {
            return Err(StructError::from(CoreReason::WindowSpec)
                .with_detail(format!("window width {width:?} is not a whole number of seconds")));
        }
        Ok(Self { anchor, width })
    }

    /// Start of the window containing `ts`:
    /// `anchor + floor((ts - anchor) / width) * width`.
    pub fn window_start(&self, ts: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
        let delta = ts.signed_duration_since(self.anchor);
        let offset_nanos =
            delta.num_seconds() as i128 * NANOS_PER_SEC + delta.subsec_nanos() as i128;
        let width_nanos = self.width.as_nanos() as i128;
        let k = offset_nanos.div_euclid(width_nanos);
        let start_offset = k * width_nanos;

        let nanos = start_offset.rem_euclid(NANOS_PER_SEC) as u32;
        i64::try_from(start_offset.div_euclid(NANOS_PER_SEC))
            .ok()
            .and_then(|secs| TimeDelta::new(secs, nanos))
            .and_then(|d| self.anchor.checked_add_signed(d))
            .ok_or_else(|| {
                StructError::from(CoreReason::DataFormat)
                    .with_detail(format!("window start for {ts} is out of range"))
            })
    }

    /// Assign every record to its window. The result is ordered by window
    /// start; record order within a window is arrival order.
    pub fn group(&self, records: impl IntoIterator<Item = Record>) -> CoreResult<Vec<Window>> {
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<Record>> = BTreeMap::new();
        for record in records {
            let start = self.window_start(record.timestamp)?;
            buckets.entry(start).or_default().push(record);
        }
        Ok(buckets
            .into_iter()
            .map(|(start, records)| Window {
                start,
                width: self.width,
                records,
            })
            .collect())
    }
}

/// A materialized time window `[start, start + width)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub width: Duration,
    pub records: Vec<Record>,
}

impl Window {
    /// Fixed-width time-of-day label, `HHMMSS` in UTC.
    pub fn id(&self) -> String {
        self.start.format("%H%M%S").to_string()
    }
}
