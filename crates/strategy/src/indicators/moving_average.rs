/// Simple moving average over a trailing window.
///
/// Element `i` is `None` until `period` values are available.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

/// Exponential moving average, seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);

    let mut ema_val = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema_val);
    for (i, &price) in values.iter().enumerate().skip(period) {
        ema_val = price * k + ema_val * (1.0 - k);
        out[i] = Some(ema_val);
    }
    out
}

/// EMA over a series whose head is undefined (e.g. the MACD line).
/// Leading `None`s are skipped; the result stays aligned with the input.
pub fn ema_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let start = values.iter().position(Option::is_some).unwrap_or(values.len());
    let defined: Vec<f64> = values[start..].iter().map_while(|v| *v).collect();

    let mut out = vec![None; values.len()];
    for (offset, v) in ema(&defined, period).into_iter().enumerate() {
        out[start + offset] = v;
    }
    out
}
