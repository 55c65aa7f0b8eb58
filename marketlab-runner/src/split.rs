//! Train/validation splitting of a historical span.
//!
//! One training window covering `train_ratio` of the span, followed by N
//! equal validation windows. Windows are expressed as query spans, so a
//! `MemoryDatabase` can be restricted to each window without losing or
//! duplicating a bar at the boundaries.

use chrono::{DateTime, Duration, Utc};
use marketlab_core::data::QuerySpan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("train_ratio must be in (0, 1), got {0}")]
    BadRatio(f64),

    #[error("at least one validation set is required")]
    NoValidationSets,

    #[error("stop must be after start")]
    EmptySpan,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SplitSpec {
    pub train_ratio: f64,
    pub validation_sets: usize,
}

/// One labelled window of a split ("train", "val0", "val1", ...).
#[derive(Debug, Clone, PartialEq)]
pub struct DataWindow {
    pub label: String,
    pub span: QuerySpan,
}

/// Split `(start, stop]` into a training window and N equal validation
/// windows. Adjacent windows share a boundary; the half-open span
/// semantics assign each boundary bar to exactly one window.
pub fn split_span(
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    spec: SplitSpec,
) -> Result<Vec<DataWindow>, SplitError> {
    if !(spec.train_ratio > 0.0 && spec.train_ratio < 1.0) {
        return Err(SplitError::BadRatio(spec.train_ratio));
    }
    if spec.validation_sets == 0 {
        return Err(SplitError::NoValidationSets);
    }
    if stop <= start {
        return Err(SplitError::EmptySpan);
    }

    let total_ms = (stop - start).num_milliseconds();
    let train_ms = (total_ms as f64 * spec.train_ratio) as i64;
    let train_end = start + Duration::milliseconds(train_ms);
    let val_ms = (total_ms - train_ms) / spec.validation_sets as i64;

    let mut windows = vec![DataWindow {
        label: "train".to_string(),
        span: QuerySpan::between(None, Some(train_end)),
    }];

    let mut cursor = train_end;
    for n in 0..spec.validation_sets {
        let end = if n + 1 == spec.validation_sets {
            stop // absorb rounding into the last window
        } else {
            cursor + Duration::milliseconds(val_ms)
        };
        windows.push(DataWindow {
            label: format!("val{n}"),
            span: QuerySpan::between(Some(cursor), Some(end)),
        });
        cursor = end;
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marketlab_core::data::{Database, MemoryDatabase};
    use marketlab_core::domain::{Bar, Granularity};

    fn span() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn train_plus_validations_cover_the_span() {
        let (start, stop) = span();
        let windows =
            split_span(start, stop, SplitSpec { train_ratio: 0.6, validation_sets: 2 }).unwrap();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].label, "train");
        assert_eq!(windows[1].label, "val0");
        assert_eq!(windows[2].label, "val1");

        // 60% of 10 days = 6 days of training.
        let train_end = Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap();
        assert_eq!(windows[0].span.until, Some(train_end));
        assert_eq!(windows[1].span.after, Some(train_end));
        assert_eq!(windows[2].span.until, Some(stop));
    }

    #[test]
    fn windows_partition_a_database() {
        let (start, stop) = span();
        let granularity = Granularity::days(1);
        let bars: Vec<Bar> = (0..10)
            .map(|i| {
                let ts = start + Duration::days(i + 1);
                Bar::plain(ts, 1.0, 2.0, 0.5, 1.5, 100.0)
            })
            .collect();
        let mut db = MemoryDatabase::new();
        db.insert("EURUSD", granularity, bars);

        let windows =
            split_span(start, stop, SplitSpec { train_ratio: 0.6, validation_sets: 2 }).unwrap();
        let counts: Vec<usize> = windows
            .iter()
            .map(|w| {
                db.restricted(&w.span)
                    .query("EURUSD", granularity, &marketlab_core::data::QuerySpan::all())
                    .unwrap()
                    .len()
            })
            .collect();

        assert_eq!(counts.iter().sum::<usize>(), 10);
        assert_eq!(counts[0], 6);
        assert_eq!(counts[1], 2);
        assert_eq!(counts[2], 2);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let (start, stop) = span();
        assert_eq!(
            split_span(start, stop, SplitSpec { train_ratio: 1.0, validation_sets: 1 })
                .unwrap_err(),
            SplitError::BadRatio(1.0)
        );
        assert_eq!(
            split_span(start, stop, SplitSpec { train_ratio: 0.5, validation_sets: 0 })
                .unwrap_err(),
            SplitError::NoValidationSets
        );
        assert_eq!(
            split_span(stop, start, SplitSpec { train_ratio: 0.5, validation_sets: 1 })
                .unwrap_err(),
            SplitError::EmptySpan
        );
    }
}
