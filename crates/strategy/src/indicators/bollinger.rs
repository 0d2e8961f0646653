use super::moving_average::sma;

/// Bollinger Bands: SMA(period) ± k · σ, with σ the population standard
/// deviation of the same window.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub k: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn new(period: usize, k: f64) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        Self { period, k }
    }

    pub fn series(&self, closes: &[f64]) -> Vec<Option<Band>> {
        sma(closes, self.period)
            .into_iter()
            .enumerate()
            .map(|(i, mid)| {
                let mid = mid?;
                let window = &closes[i + 1 - self.period..=i];
                let variance =
                    window.iter().map(|c| (c - mid).powi(2)).sum::<f64>() / self.period as f64;
                let width = self.k * variance.sqrt();
                Some(Band {
                    mid,
                    upper: mid + width,
                    lower: mid - width,
                })
            })
            .collect()
    }
}
