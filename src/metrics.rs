use crate::analytics::slice_range;
use crate::data_structures::{
    CompareMetrics, InMemoryData, PricePoint, PriceRecord, SummaryStats, to_points,
};
use rayon::prelude::*;

// Rolling window sizes, in trading days
const MA_WINDOW: usize = 7;
const WINDOW_52W: usize = 252;
const VOLATILITY_WINDOW: usize = 30;

// Window of stored rows the pairwise comparison metrics are computed over
const COMPARE_WINDOW: usize = 30;

#[derive(Debug, PartialEq)]
pub enum AnalyticsError {
    InsufficientData,
    InvalidBaseline,
}

/// Return over the whole supplied series: `(last - first) / first`. Errors
/// when fewer than two points exist or the baseline close is non-positive.
pub fn series_return(series: &[PricePoint]) -> Result<f64, AnalyticsError> {
    if series.len() < 2 {
        return Err(AnalyticsError::InsufficientData);
    }
    let first = series[0].close;
    if first <= 0.0 {
        return Err(AnalyticsError::InvalidBaseline);
    }
    let last = series[series.len() - 1].close;
    Ok((last - first) / first)
}

/// Fill the derived columns of a chronological series in place: per-day
/// return, 7-day moving average, rolling 52-week high/low, and 30-day
/// volatility (sample std-dev of daily returns). All windows tolerate a
/// shorter head of the series, shrinking instead of emitting nothing.
pub fn enrich(records: &mut [PriceRecord]) {
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();

    for i in 0..records.len() {
        let open = records[i].open;
        records[i].daily_return = if open != 0.0 {
            Some((records[i].close - open) / open)
        } else {
            None
        };

        let ma_start = i.saturating_sub(MA_WINDOW - 1);
        let ma_window = &closes[ma_start..=i];
        records[i].ma_7 = Some(ma_window.iter().sum::<f64>() / ma_window.len() as f64);

        let yr_start = i.saturating_sub(WINDOW_52W - 1);
        let yr_window = &closes[yr_start..=i];
        records[i].high_52w = yr_window.iter().copied().reduce(f64::max);
        records[i].low_52w = yr_window.iter().copied().reduce(f64::min);
    }

    let returns: Vec<Option<f64>> = records.iter().map(|r| r.daily_return).collect();
    for i in 0..records.len() {
        let start = i.saturating_sub(VOLATILITY_WINDOW - 1);
        let samples: Vec<f64> = returns[start..=i].iter().filter_map(|r| *r).collect();
        records[i].volatility_30d = Some(sample_std_dev(&samples));
    }
}

/// Enrich every stored series; independent per symbol, so fanned out across
/// the rayon pool.
pub fn enrich_all(data: &mut InMemoryData) {
    data.par_iter_mut().for_each(|(_, records)| enrich(records));
}

fn sample_std_dev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Aggregate summary over the full stored series: highest rolling 52w high,
/// lowest rolling 52w low, mean close.
pub fn summary(symbol: &str, records: &[PriceRecord]) -> Result<SummaryStats, AnalyticsError> {
    let high_52w = records
        .iter()
        .filter_map(|r| r.high_52w)
        .reduce(f64::max)
        .ok_or(AnalyticsError::InsufficientData)?;
    let low_52w = records
        .iter()
        .filter_map(|r| r.low_52w)
        .reduce(f64::min)
        .ok_or(AnalyticsError::InsufficientData)?;
    let avg_close = records.iter().map(|r| r.close).sum::<f64>() / records.len() as f64;

    Ok(SummaryStats {
        symbol: symbol.to_string(),
        high_52w,
        low_52w,
        avg_close,
    })
}

/// Comparison metrics over the last 30 stored rows: window return plus the
/// mean of the present 30-day volatility values (0.0 when none are present).
pub fn compare_metrics(
    symbol: &str,
    records: &[PriceRecord],
) -> Result<CompareMetrics, AnalyticsError> {
    let window = slice_range(records, COMPARE_WINDOW);
    let return_30d = series_return(&to_points(window))?;

    let vols: Vec<f64> = window.iter().filter_map(|r| r.volatility_30d).collect();
    let avg_volatility_30d = if vols.is_empty() {
        0.0
    } else {
        vols.iter().sum::<f64>() / vols.len() as f64
    };

    Ok(CompareMetrics {
        symbol: symbol.to_string(),
        return_30d,
        avg_volatility_30d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn record(i: usize, open: f64, close: f64) -> PriceRecord {
        PriceRecord {
            symbol: "TEST.NS".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64),
            open,
            high: close.max(open),
            low: close.min(open),
            close,
            adjusted_close: None,
            volume: Some(1000.0),
            daily_return: None,
            ma_7: None,
            high_52w: None,
            low_52w: None,
            volatility_30d: None,
        }
    }

    fn records(closes: &[f64]) -> Vec<PriceRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| record(i, c, c))
            .collect()
    }

    #[test]
    fn test_series_return_guards() {
        let empty: Vec<PricePoint> = Vec::new();
        assert_eq!(series_return(&empty), Err(AnalyticsError::InsufficientData));

        let single = vec![PricePoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            close: 10.0,
        }];
        assert_eq!(series_return(&single), Err(AnalyticsError::InsufficientData));

        let zero_base = to_points(&records(&[0.0, 10.0]));
        assert_eq!(series_return(&zero_base), Err(AnalyticsError::InvalidBaseline));

        let ok = to_points(&records(&[100.0, 110.0]));
        assert!((series_return(&ok).unwrap() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_enrich_moving_average_shrinks_at_head() {
        let mut rows = records(&[1.0, 2.0, 3.0]);
        enrich(&mut rows);

        assert!((rows[0].ma_7.unwrap() - 1.0).abs() < 1e-9);
        assert!((rows[1].ma_7.unwrap() - 1.5).abs() < 1e-9);
        assert!((rows[2].ma_7.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_enrich_moving_average_window_is_seven() {
        let closes: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let mut rows = records(&closes);
        enrich(&mut rows);

        // Last row averages closes 4..=10
        assert!((rows[9].ma_7.unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_enrich_rolling_52w_extremes() {
        let mut rows = records(&[5.0, 9.0, 3.0, 7.0]);
        enrich(&mut rows);

        assert_eq!(rows[3].high_52w, Some(9.0));
        assert_eq!(rows[3].low_52w, Some(3.0));
        assert_eq!(rows[0].high_52w, Some(5.0));
    }

    #[test]
    fn test_enrich_daily_return_and_volatility() {
        let mut rows = vec![
            record(0, 100.0, 110.0), // +0.10
            record(1, 100.0, 90.0),  // -0.10
            record(2, 100.0, 100.0), // 0.0
        ];
        enrich(&mut rows);

        assert!((rows[0].daily_return.unwrap() - 0.10).abs() < 1e-9);
        assert!((rows[1].daily_return.unwrap() + 0.10).abs() < 1e-9);

        // Single sample has no spread
        assert_eq!(rows[0].volatility_30d, Some(0.0));
        // std of [0.10, -0.10, 0.0] with ddof 1 = 0.1
        assert!((rows[2].volatility_30d.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_enrich_zero_open_has_no_return() {
        let mut rows = vec![record(0, 0.0, 10.0)];
        enrich(&mut rows);
        assert_eq!(rows[0].daily_return, None);
    }

    #[test]
    fn test_summary_aggregates() {
        let mut rows = records(&[10.0, 20.0, 30.0]);
        enrich(&mut rows);

        let stats = summary("TEST.NS", &rows).unwrap();
        assert_eq!(stats.high_52w, 30.0);
        assert_eq!(stats.low_52w, 10.0);
        assert!((stats.avg_close - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_requires_data() {
        assert_eq!(
            summary("TEST.NS", &[]),
            Err(AnalyticsError::InsufficientData)
        );
    }

    #[test]
    fn test_compare_metrics_uses_last_thirty_rows() {
        // 40 rows; the comparison window starts at row 10
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let mut rows = records(&closes);
        enrich(&mut rows);

        let metrics = compare_metrics("TEST.NS", &rows).unwrap();
        // (139 - 110) / 110
        assert!((metrics.return_30d - 29.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_compare_metrics_guards() {
        let mut rows = records(&[100.0]);
        enrich(&mut rows);
        assert_eq!(
            compare_metrics("TEST.NS", &rows),
            Err(AnalyticsError::InsufficientData)
        );
    }
}
