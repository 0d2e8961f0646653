pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{Band, BollingerBands};
pub use macd::{MacdIndicator, MacdSeries};
pub use rsi::RsiIndicator;

use serde::{Deserialize, Serialize};

use common::OhlcvBar;

/// Indicator values attached to one bar. `None` means the indicator's window
/// is not yet satisfied at that bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_diff: Option<f64>,
    pub sma_20: Option<f64>,
    pub ema_12: Option<f64>,
}

/// A bar together with its indicators, serialized as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBar {
    #[serde(flatten)]
    pub bar: OhlcvBar,
    #[serde(flatten)]
    pub indicators: IndicatorSet,
}

/// Computes the standard indicator set over an ascending OHLCV series.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    bands: BollingerBands,
    rsi: RsiIndicator,
    macd: MacdIndicator,
    sma_period: usize,
    ema_period: usize,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            bands: BollingerBands::new(20, 2.0),
            rsi: RsiIndicator::new(14),
            macd: MacdIndicator::new(12, 26, 9),
            sma_period: 20,
            ema_period: 12,
        }
    }
}

impl IndicatorEngine {
    /// Largest window used; shorter series are accepted but leave fields `None`.
    pub fn warmup(&self) -> usize {
        self.bands
            .period
            .max(self.rsi.period + 1)
            .max(self.macd.slow)
            .max(self.sma_period)
    }

    /// Attach indicators to every bar. Output length always equals input length.
    pub fn compute(&self, bars: &[OhlcvBar]) -> Vec<IndicatorBar> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let bands = self.bands.series(&closes);
        let rsi = self.rsi.series(&closes);
        let macd = self.macd.series(&closes);
        let sma = moving_average::sma(&closes, self.sma_period);
        let ema = moving_average::ema(&closes, self.ema_period);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| IndicatorBar {
                bar: bar.clone(),
                indicators: IndicatorSet {
                    bb_mid: bands[i].map(|b| b.mid),
                    bb_upper: bands[i].map(|b| b.upper),
                    bb_lower: bands[i].map(|b| b.lower),
                    rsi: rsi[i],
                    macd: macd.macd[i],
                    macd_signal: macd.signal[i],
                    macd_diff: macd.histogram[i],
                    sma_20: sma[i],
                    ema_12: ema[i],
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                timestamp: start + Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn output_matches_input_length() {
        let input = bars(&(0..30).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let out = IndicatorEngine::default().compute(&input);
        assert_eq!(out.len(), input.len());
        assert_eq!(out[7].bar, input[7]);
    }

    #[test]
    fn leading_bars_are_undefined() {
        let input = bars(&(0..30).map(|i| 100.0 + (i % 5) as f64).collect::<Vec<_>>());
        let out = IndicatorEngine::default().compute(&input);

        assert!(out[18].indicators.bb_mid.is_none());
        assert!(out[19].indicators.bb_mid.is_some());
        assert!(out[13].indicators.rsi.is_none());
        assert!(out[14].indicators.rsi.is_some());
        assert!(out[10].indicators.ema_12.is_none());
        assert!(out[11].indicators.ema_12.is_some());
        assert!(out[24].indicators.macd.is_none());
        assert!(out[25].indicators.macd.is_some());
        // 30 bars never satisfy the signal line window
        assert!(out.iter().all(|b| b.indicators.macd_signal.is_none()));
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(IndicatorEngine::default().compute(&[]).is_empty());
    }

    #[test]
    fn serializes_as_flat_object() {
        let out = IndicatorEngine::default().compute(&bars(&[1.0]));
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["close"], 1.0);
        assert!(json["rsi"].is_null());
    }

    #[test]
    fn warmup_is_slow_macd_window() {
        assert_eq!(IndicatorEngine::default().warmup(), 26);
    }
}
