//! Slice-based indicator math over closing prices. All functions are pure;
//! `None` means the input history is too short for the requested window.

use crate::types::Bar;

pub fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period || period == 0 {
        return None;
    }
    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// EMA bootstrapped from the SMA of the first `period` values, then
/// `ema = (price - ema) * alpha + ema` with `alpha = 2 / (period + 1)`.
pub fn ema(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period || period == 0 {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    for &price in &prices[period..] {
        value = (price - value) * alpha + value;
    }
    Some(value)
}

/// RSI in [0, 100] from average gains/losses over the last `period` changes.
/// Returns 100 when the average loss is zero.
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period + 1 {
        return None;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for window in prices[prices.len() - period - 1..].windows(2) {
        let change = window[1] - window[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses += -change;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Average true range over the last `period` bars, using the true range
/// against the prior close.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.len() < period + 1 {
        return None;
    }
    let start = bars.len() - period;
    let mut sum = 0.0;
    for i in start..bars.len() {
        let high: f64 = bars[i].high.try_into().unwrap_or(0.0);
        let low: f64 = bars[i].low.try_into().unwrap_or(0.0);
        let prev_close: f64 = bars[i - 1].close.try_into().unwrap_or(0.0);
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        sum += tr;
    }
    Some(sum / period as f64)
}

/// Log return over `period` bars; 0 when history is too short.
pub fn log_return(prices: &[f64], period: usize) -> f64 {
    if prices.len() < period + 1 {
        return 0.0;
    }
    let current = prices[prices.len() - 1];
    let previous = prices[prices.len() - 1 - period];
    if previous <= 0.0 || current <= 0.0 {
        return 0.0;
    }
    (current / previous).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            start_time: Utc::now(),
            open: Decimal::from_f64(close).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            sample_count: 1,
        }
    }

    #[test]
    fn test_sma() {
        let prices = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(sma(&prices, 2), Some(3.5));
        assert_eq!(sma(&prices, 4), Some(2.5));
        assert_eq!(sma(&prices, 5), None);
    }

    #[test]
    fn test_ema_bootstraps_from_sma() {
        let prices = [2.0, 4.0, 6.0];
        // Exactly `period` values: EMA equals the simple average
        assert_eq!(ema(&prices, 3), Some(4.0));

        // One more value applies the recurrence once (alpha = 0.5)
        let extended = [2.0, 4.0, 6.0, 8.0];
        assert_eq!(ema(&extended, 3), Some(6.0));
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let prices: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        assert_eq!(rsi(&prices, 14), Some(100.0));
    }

    #[test]
    fn test_rsi_insufficient_history() {
        let prices = [1.0, 2.0, 3.0];
        assert_eq!(rsi(&prices, 14), None);
    }

    #[test]
    fn test_rsi_balanced_moves_near_50() {
        let mut prices = vec![100.0];
        for i in 0..20 {
            let last = *prices.last().unwrap();
            prices.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let value = rsi(&prices, 14).unwrap();
        assert!((value - 50.0).abs() < 10.0);
    }

    #[test]
    fn test_atr() {
        let bars: Vec<Bar> = (0..5).map(|_| bar(1.2, 1.0, 1.1)).collect();
        // Flat closes: true range equals high - low
        let value = atr(&bars, 3).unwrap();
        assert!((value - 0.2).abs() < 1e-9);
        assert_eq!(atr(&bars, 5), None);
    }

    #[test]
    fn test_log_return() {
        let prices = [1.0, 1.0, std::f64::consts::E];
        assert!((log_return(&prices, 1) - 1.0).abs() < 1e-12);
        assert_eq!(log_return(&prices, 5), 0.0);
    }
}
