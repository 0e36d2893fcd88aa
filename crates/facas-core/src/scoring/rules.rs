//! Individual rule evaluators for the scoring engine (`§4.8`).

use crate::config::Threshold;

/// One fired rule: its contribution and the explanation line to publish.
pub struct Fired {
    pub contribution: f64,
    pub explanation: String,
}

/// Evaluate a single `value >= threshold -> weight` rule.
pub fn simple_threshold(label: &str, value: f64, threshold: f64, weight: f64) -> Option<Fired> {
    if value >= threshold {
        Some(Fired {
            contribution: weight,
            explanation: format!("{label}: observed {value:.2} >= threshold {threshold:.2} (weight {weight:+.2})"),
        })
    } else {
        None
    }
}

/// Evaluate every entry in a threshold list independently (each may fire).
pub fn extra_thresholds(label: &str, value: f64, thresholds: &[Threshold]) -> Vec<Fired> {
    thresholds
        .iter()
        .filter_map(|t| simple_threshold(label, value, t.threshold, t.weight))
        .collect()
}

/// Step contribution beyond a base threshold, in fixed increments, capped
/// at a maximum total contribution (`§4.8`, curve count step).
pub fn step_contribution(label: &str, value: f64, base_threshold: f64, step: f64, weight_per_step: f64, max_contribution: f64) -> Option<Fired> {
    if value <= base_threshold || step <= 0.0 {
        return None;
    }
    let steps = ((value - base_threshold) / step).floor();
    if steps < 1.0 {
        return None;
    }
    let contribution = (steps * weight_per_step).min(max_contribution);
    Some(Fired {
        contribution,
        explanation: format!("{label}: {steps:.0} steps of {step:.2} beyond {base_threshold:.2} (weight {contribution:+.2})"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_fires_when_value_meets_it() {
        let fired = simple_threshold("cut length", 500.0, 500.0, 0.3).unwrap();
        assert_eq!(fired.contribution, 0.3);
    }

    #[test]
    fn threshold_does_not_fire_below_value() {
        assert!(simple_threshold("cut length", 499.0, 500.0, 0.3).is_none());
    }

    #[test]
    fn step_contribution_is_capped() {
        let fired = step_contribution("curve step", 200.0, 10.0, 10.0, 0.05, 0.5).unwrap();
        assert_eq!(fired.contribution, 0.5);
    }
}
