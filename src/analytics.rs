use crate::data_structures::PricePoint;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of future calendar days extrapolated past the last observed close.
pub const FORECAST_HORIZON: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Fitted trend line and its extrapolated future points. `points` is either
/// empty (fewer than two observations) or exactly `FORECAST_HORIZON` long.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Forecast {
    pub slope: f64,
    pub intercept: f64,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    fn empty() -> Self {
        Self {
            slope: 0.0,
            intercept: 0.0,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// History and prediction aligned on a shared label axis. `None` entries are
/// serialized as JSON nulls, which the chart renders as gaps rather than
/// zeros.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<NaiveDate>,
    pub history: Vec<Option<f64>>,
    pub prediction: Vec<Option<f64>>,
}

/// Trim a chronological series to its most recent `window_days` elements.
/// A window at least as long as the series returns it unchanged.
pub fn slice_range<T>(series: &[T], window_days: usize) -> &[T] {
    if series.is_empty() || window_days >= series.len() {
        return series;
    }
    &series[series.len() - window_days..]
}

/// Fit an ordinary-least-squares trend line over the series (position index
/// as x, close as y) and extrapolate `FORECAST_HORIZON` calendar days past
/// the last observed date. Weekends and holidays are not skipped.
///
/// Fewer than two observations yield an empty forecast with zero slope and
/// intercept; the degenerate denominator never reaches the division.
pub fn forecast(series: &[PricePoint]) -> Forecast {
    let n = series.len();
    if n < 2 {
        return Forecast::empty();
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, point) in series.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += point.close;
        sum_xy += x * point.close;
        sum_xx += x * x;
    }

    let n_f = n as f64;
    // Nonzero for distinct integer x with n >= 2
    let denominator = n_f * sum_xx - sum_x * sum_x;
    let slope = (n_f * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n_f;

    let last_date = series[n - 1].date;
    let points = (1..=FORECAST_HORIZON)
        .map(|i| {
            let future_index = (n - 1 + i) as f64;
            ForecastPoint {
                date: last_date + ChronoDuration::days(i as i64),
                value: slope * future_index + intercept,
            }
        })
        .collect();

    Forecast {
        slope,
        intercept,
        points,
    }
}

/// Merge observed closes and forecast values into two gap-padded sequences
/// over one label axis. The prediction series repeats the last observed close
/// as a bridging point so the two plotted lines join at the boundary.
pub fn assemble(series: &[PricePoint], forecast: &Forecast) -> ChartSeries {
    let n = series.len();
    if n == 0 {
        return ChartSeries {
            labels: Vec::new(),
            history: Vec::new(),
            prediction: Vec::new(),
        };
    }

    let mut labels: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
    labels.extend(forecast.points.iter().map(|p| p.date));

    let mut history: Vec<Option<f64>> = series.iter().map(|p| Some(p.close)).collect();
    history.extend(std::iter::repeat_n(None, forecast.points.len()));

    let mut prediction: Vec<Option<f64>> = vec![None; n - 1];
    prediction.push(Some(series[n - 1].close));
    prediction.extend(forecast.points.iter().map(|p| Some(p.value)));

    ChartSeries {
        labels,
        history,
        prediction,
    }
}

/// Convenience pipeline for the chart endpoint: slice, fit, assemble.
pub fn chart_for_range(series: &[PricePoint], window_days: usize) -> ChartSeries {
    let sliced = slice_range(series, window_days);
    let fit = forecast(sliced);
    assemble(sliced, &fit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + ChronoDuration::days(i as i64),
                close,
            })
            .collect()
    }

    #[test]
    fn test_slice_identity_when_window_covers_series() {
        let s = series(&[1.0, 2.0, 3.0]);
        assert_eq!(slice_range(&s, 3), &s[..]);
        assert_eq!(slice_range(&s, 30), &s[..]);
    }

    #[test]
    fn test_slice_empty_series() {
        let s: Vec<PricePoint> = Vec::new();
        assert!(slice_range(&s, 10).is_empty());
    }

    #[test]
    fn test_slice_returns_most_recent_window() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let sliced = slice_range(&s, 2);
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced[0].close, 4.0);
        assert_eq!(sliced[1].close, 5.0);
    }

    #[test]
    fn test_forecast_precondition_degrades_to_empty() {
        let empty = forecast(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.slope, 0.0);
        assert_eq!(empty.intercept, 0.0);

        let single = forecast(&series(&[42.0]));
        assert!(single.is_empty());
        assert_eq!(single.intercept, 0.0);
    }

    #[test]
    fn test_forecast_recovers_exact_linear_trend() {
        // close[i] = 3.0 + 0.5 * i
        let closes: Vec<f64> = (0..10).map(|i| 3.0 + 0.5 * i as f64).collect();
        let s = series(&closes);
        let fit = forecast(&s);

        assert!((fit.slope - 0.5).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert_eq!(fit.points.len(), FORECAST_HORIZON);
        for (k, point) in fit.points.iter().enumerate() {
            let expected = 3.0 + 0.5 * (10 - 1 + k + 1) as f64;
            assert!((point.value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_forecast_dates_are_consecutive_calendar_days() {
        let s = series(&[10.0, 11.0]);
        let fit = forecast(&s);
        let last = s[1].date;
        for (i, point) in fit.points.iter().enumerate() {
            assert_eq!(point.date, last + ChronoDuration::days(i as i64 + 1));
        }
    }

    #[test]
    fn test_forecast_known_series() {
        // n = 5, sum_x = 10, sum_y = 60, sum_xy = 129, sum_xx = 30:
        // slope = 45 / 50 = 0.9, intercept = (60 - 9) / 5 = 10.2
        let s = series(&[10.0, 12.0, 11.0, 13.0, 14.0]);
        let fit = forecast(&s);

        assert!((fit.slope - 0.9).abs() < 1e-9);
        assert!((fit.intercept - 10.2).abs() < 1e-9);
        // First future index is 5
        assert!((fit.points[0].value - (0.9 * 5.0 + 10.2)).abs() < 1e-9);
    }

    #[test]
    fn test_assemble_bridges_history_and_prediction() {
        let s = series(&[10.0, 12.0, 11.0, 13.0, 14.0]);
        let fit = forecast(&s);
        let chart = assemble(&s, &fit);

        let n = s.len();
        assert_eq!(chart.labels.len(), n + FORECAST_HORIZON);
        assert_eq!(chart.history.len(), n + FORECAST_HORIZON);
        assert_eq!(chart.prediction.len(), n + FORECAST_HORIZON);

        // Bridging point: both lines share the last observed close
        assert_eq!(chart.prediction[n - 1], chart.history[n - 1]);
        assert_eq!(chart.prediction[n - 1], Some(14.0));

        // History tail and prediction head are gaps, not zeros
        assert!(chart.history[n..].iter().all(Option::is_none));
        assert!(chart.prediction[..n - 1].iter().all(Option::is_none));
        assert_eq!(chart.prediction[n], Some(fit.points[0].value));
    }

    #[test]
    fn test_assemble_empty_series() {
        let chart = assemble(&[], &forecast(&[]));
        assert!(chart.labels.is_empty());
        assert!(chart.history.is_empty());
        assert!(chart.prediction.is_empty());
    }

    #[test]
    fn test_assemble_single_point_degenerates_to_bridge() {
        let s = series(&[42.0]);
        let chart = assemble(&s, &forecast(&s));

        assert_eq!(chart.labels.len(), 1);
        assert_eq!(chart.history, vec![Some(42.0)]);
        assert_eq!(chart.prediction, vec![Some(42.0)]);
    }

    #[test]
    fn test_chart_for_range_slices_before_fitting() {
        // Steep early segment followed by a flat recent window; the slice
        // must drop the early points before the fit.
        let closes = vec![1.0, 100.0, 5.0, 5.0, 5.0, 5.0];
        let s = series(&closes);
        let chart = chart_for_range(&s, 4);

        assert_eq!(chart.labels.len(), 4 + FORECAST_HORIZON);
        // Flat window forecasts flat values
        assert_eq!(chart.prediction.last().copied().flatten(), Some(5.0));
    }
}
