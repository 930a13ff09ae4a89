// Drawdown-vs-recovery qualifier: running days below the prior high, and
// percent drawdown from it. Independent of the RND extraction pipeline --
// both operate on the same underlying price history but don't share state.
//
// Ported from `qualifiers/drawdown_days.py`; the matplotlib color-coded
// plotting in that file has no counterpart here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawdownSeverity {
    Mild,     // < 5%
    Moderate, // 5-10%
    Elevated, // 10-20%
    Severe,   // 20-30%
    Extreme,  // >= 30%
}

impl DrawdownSeverity {
    pub fn classify(percent_drawdown: f64) -> Self {
        if percent_drawdown >= -5.0 {
            Self::Mild
        } else if percent_drawdown >= -10.0 {
            Self::Moderate
        } else if percent_drawdown >= -20.0 {
            Self::Elevated
        } else if percent_drawdown >= -30.0 {
            Self::Severe
        } else {
            Self::Extreme
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawdownPoint {
    pub days_below_high: u32,
    pub percent_drawdown: f64,
    pub severity: DrawdownSeverity,
}

/// Tracks, for a series of closing prices, how many consecutive days each
/// point has sat below the running high and by how much.
pub struct DrawdownAnalyzer;

impl DrawdownAnalyzer {
    pub fn calculate(closes: &[f64]) -> Vec<DrawdownPoint> {
        if closes.is_empty() {
            return Vec::new();
        }

        let mut running_max = closes[0];
        let mut days_counter = 0u32;
        let mut out = Vec::with_capacity(closes.len());

        for (i, &close) in closes.iter().enumerate() {
            running_max = running_max.max(close);
            let percent_drawdown = (close - running_max) / running_max * 100.0;

            if i == 0 {
                days_counter = 0;
            } else if close < running_max {
                days_counter += 1;
            } else {
                days_counter = 0;
            }

            out.push(DrawdownPoint {
                days_below_high: days_counter,
                percent_drawdown,
                severity: DrawdownSeverity::classify(percent_drawdown),
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonically_rising_series_never_shows_drawdown() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let points = DrawdownAnalyzer::calculate(&closes);
        for p in &points {
            assert_eq!(p.days_below_high, 0);
            assert_eq!(p.percent_drawdown, 0.0);
            assert_eq!(p.severity, DrawdownSeverity::Mild);
        }
    }

    #[test]
    fn drop_then_recovery_tracks_consecutive_days_below_high() {
        let closes = vec![100.0, 90.0, 80.0, 85.0, 101.0];
        let points = DrawdownAnalyzer::calculate(&closes);
        assert_eq!(points[0].days_below_high, 0);
        assert_eq!(points[1].days_below_high, 1);
        assert_eq!(points[2].days_below_high, 2);
        assert_eq!(points[3].days_below_high, 3);
        assert_eq!(points[4].days_below_high, 0);
    }

    #[test]
    fn severity_classification_matches_bin_boundaries() {
        assert_eq!(DrawdownSeverity::classify(-2.0), DrawdownSeverity::Mild);
        assert_eq!(DrawdownSeverity::classify(-7.0), DrawdownSeverity::Moderate);
        assert_eq!(DrawdownSeverity::classify(-15.0), DrawdownSeverity::Elevated);
        assert_eq!(DrawdownSeverity::classify(-25.0), DrawdownSeverity::Severe);
        assert_eq!(DrawdownSeverity::classify(-40.0), DrawdownSeverity::Extreme);
    }

    #[test]
    fn empty_series_returns_empty() {
        assert!(DrawdownAnalyzer::calculate(&[]).is_empty());
    }
}
