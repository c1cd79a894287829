//! Exposure-weighted loss functions.

use crate::error::MlError;
use glassbox_core::LossKind;

/// `loss(observed, predicted, weights)`.
pub type LossFn = fn(&[f64], &[f64], &[f64]) -> Result<f64, MlError>;

pub fn loss_fn(kind: LossKind) -> LossFn {
    match kind {
        LossKind::Rmse => weighted_rmse,
        LossKind::Mse => weighted_mse,
        LossKind::Mae => weighted_mae,
    }
}

/// `sqrt(sum((observed - predicted)^2 * weight) / sum(weight))`
pub fn weighted_rmse(observed: &[f64], predicted: &[f64], weights: &[f64]) -> Result<f64, MlError> {
    Ok(weighted_mse(observed, predicted, weights)?.sqrt())
}

pub fn weighted_mse(observed: &[f64], predicted: &[f64], weights: &[f64]) -> Result<f64, MlError> {
    let total = check(observed, predicted, weights)?;
    let sum: f64 = observed
        .iter()
        .zip(predicted)
        .zip(weights)
        .map(|((o, p), w)| (o - p).powi(2) * w)
        .sum();
    Ok(sum / total)
}

pub fn weighted_mae(observed: &[f64], predicted: &[f64], weights: &[f64]) -> Result<f64, MlError> {
    let total = check(observed, predicted, weights)?;
    let sum: f64 = observed
        .iter()
        .zip(predicted)
        .zip(weights)
        .map(|((o, p), w)| (o - p).abs() * w)
        .sum();
    Ok(sum / total)
}

/// Weighted arithmetic mean.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Result<f64, MlError> {
    let total = check(values, values, weights)?;
    let sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Ok(sum / total)
}

/// Validate lengths and return the total weight.
fn check(observed: &[f64], predicted: &[f64], weights: &[f64]) -> Result<f64, MlError> {
    if observed.len() != predicted.len() || observed.len() != weights.len() {
        return Err(MlError::shape_mismatch(format!(
            "loss inputs differ in length: {} observed, {} predicted, {} weights",
            observed.len(),
            predicted.len(),
            weights.len()
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(MlError::invalid_input(format!(
            "total weight must be positive and finite, got {}",
            total
        )));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_rmse() {
        // errors 1 and 3, weights 3 and 1: sqrt((3 + 9) / 4)
        let loss = weighted_rmse(&[1.0, 3.0], &[0.0, 0.0], &[3.0, 1.0]).unwrap();
        assert!((loss - 3.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_unit_weights_match_plain_rmse() {
        let obs = [100.0, 150.0, 200.0];
        let pred = [10.0, 50.0, 100.0];
        let loss = weighted_rmse(&obs, &pred, &[1.0; 3]).unwrap();
        let plain = ((90.0f64.powi(2) + 100.0f64.powi(2) + 100.0f64.powi(2)) / 3.0).sqrt();
        assert!((loss - plain).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_rows_ignored() {
        let loss = weighted_mae(&[1.0, 50.0], &[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(loss, 1.0);
    }

    #[test]
    fn test_zero_total_weight_rejected() {
        assert!(weighted_rmse(&[1.0], &[0.0], &[0.0]).is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            weighted_mse(&[1.0, 2.0], &[0.0], &[1.0, 1.0]),
            Err(MlError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_weighted_mean() {
        assert_eq!(weighted_mean(&[1.0, 4.0], &[3.0, 1.0]).unwrap(), 1.75);
    }

    #[test]
    fn test_loss_fn_dispatch() {
        let f = loss_fn(LossKind::Mse);
        assert_eq!(f(&[2.0], &[0.0], &[1.0]).unwrap(), 4.0);
    }
}
