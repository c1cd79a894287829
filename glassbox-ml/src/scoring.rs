//! Scoring adapter: uniform, batch-bounded access to a [`Model`].

use crate::error::MlError;
use crate::model::Model;
use glassbox_core::EvalRow;
use std::sync::Arc;

/// Wraps a model behind `score(rows) -> predictions`, handing it at most
/// `batch_size` rows per call.
///
/// Output never depends on the batch size; it only bounds how many rows are
/// alive at once.
#[derive(Clone)]
pub struct ScoringAdapter {
    model: Arc<dyn Model>,
    batch_size: usize,
    required: Vec<String>,
}

impl std::fmt::Debug for ScoringAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringAdapter")
            .field("model", &self.model.name())
            .field("batch_size", &self.batch_size)
            .field("required", &self.required)
            .finish()
    }
}

impl ScoringAdapter {
    pub fn new(model: Arc<dyn Model>, batch_size: usize) -> Result<Self, MlError> {
        if batch_size == 0 {
            return Err(MlError::invalid_input("batch size must be greater than zero"));
        }
        let required = model.required_columns();
        Ok(Self {
            model,
            batch_size,
            required,
        })
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required
    }

    /// Copy of this adapter with a different batch size.
    pub fn with_batch_size(&self, batch_size: usize) -> Result<Self, MlError> {
        Self::new(Arc::clone(&self.model), batch_size)
    }

    fn check_row(&self, row: &EvalRow) -> Result<(), MlError> {
        match self.required.iter().find(|c| !row.contains(c)) {
            Some(column) => Err(MlError::missing_column(column.as_str())),
            None => Ok(()),
        }
    }

    /// Score rows, same length and order as the input.
    ///
    /// Every row is checked before the model runs, so a missing column
    /// fails the call without scoring anything.
    pub fn score(&self, rows: &[EvalRow]) -> Result<Vec<f64>, MlError> {
        for row in rows {
            self.check_row(row)?;
        }
        let mut out = Vec::with_capacity(rows.len());
        for chunk in rows.chunks(self.batch_size) {
            self.score_batch(chunk, |p| out.push(p))?;
        }
        Ok(out)
    }

    /// Score a single row.
    pub fn score_one(&self, row: &EvalRow) -> Result<f64, MlError> {
        let preds = self.score(std::slice::from_ref(row))?;
        Ok(preds[0])
    }

    /// Score a lazily generated row stream, collecting the predictions.
    pub fn score_iter<I>(&self, rows: I) -> Result<Vec<f64>, MlError>
    where
        I: IntoIterator<Item = EvalRow>,
    {
        let rows = rows.into_iter();
        let mut out = Vec::with_capacity(rows.size_hint().0);
        self.score_stream(rows, |p| out.push(p))?;
        Ok(out)
    }

    /// Score a lazily generated row stream, feeding each prediction to `sink`
    /// in input order. At most one batch of rows is materialized at a time.
    pub fn score_stream<I, F>(&self, rows: I, mut sink: F) -> Result<usize, MlError>
    where
        I: IntoIterator<Item = EvalRow>,
        F: FnMut(f64),
    {
        let mut buffer = Vec::with_capacity(self.batch_size);
        let mut scored = 0;
        for row in rows {
            self.check_row(&row)?;
            buffer.push(row);
            if buffer.len() == self.batch_size {
                scored += self.score_batch(&buffer, &mut sink)?;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            scored += self.score_batch(&buffer, &mut sink)?;
        }
        Ok(scored)
    }

    fn score_batch<F>(&self, batch: &[EvalRow], mut sink: F) -> Result<usize, MlError>
    where
        F: FnMut(f64),
    {
        let preds = self.model.predict(batch)?;
        if preds.len() != batch.len() {
            return Err(MlError::shape_mismatch(format!(
                "model '{}' returned {} predictions for {} rows",
                self.model.name(),
                preds.len(),
                batch.len()
            )));
        }
        tracing::trace!(rows = batch.len(), "Scored batch");
        for p in preds {
            sink(p);
        }
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FnModel;
    use glassbox_core::Value;

    fn linear_adapter(batch_size: usize) -> ScoringAdapter {
        let model = FnModel::new("linear", vec!["vehicle_age".into()], |row: &EvalRow| {
            Ok(10.0 * row.numeric("vehicle_age")?)
        });
        ScoringAdapter::new(Arc::new(model), batch_size).unwrap()
    }

    fn rows(n: usize) -> Vec<EvalRow> {
        (0..n)
            .map(|i| EvalRow::from_pairs([("vehicle_age", Value::Numeric(i as f64))], 0.0))
            .collect()
    }

    #[test]
    fn test_score_preserves_order_across_batches() {
        let preds = linear_adapter(3).score(&rows(7)).unwrap();
        assert_eq!(preds, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
    }

    #[test]
    fn test_batch_size_does_not_change_output() {
        let data = rows(25);
        let a = linear_adapter(1).score(&data).unwrap();
        let b = linear_adapter(25).score(&data).unwrap();
        let c = linear_adapter(4).score_iter(data.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(linear_adapter(1).with_batch_size(0).is_err());
    }

    #[test]
    fn test_missing_column_fails_before_scoring() {
        let mut data = rows(3);
        data.push(EvalRow::from_pairs([("sex", Value::from("Masculino"))], 0.0));
        let err = linear_adapter(2).score(&data).unwrap_err();
        assert!(matches!(err, MlError::MissingColumn { .. }));
    }

    #[test]
    fn test_model_returning_wrong_length_is_shape_mismatch() {
        struct Short;
        impl Model for Short {
            fn name(&self) -> &str {
                "short"
            }
            fn required_columns(&self) -> Vec<String> {
                Vec::new()
            }
            fn predict(&self, rows: &[EvalRow]) -> Result<Vec<f64>, MlError> {
                Ok(vec![0.0; rows.len().saturating_sub(1)])
            }
        }
        let adapter = ScoringAdapter::new(Arc::new(Short), 10).unwrap();
        assert!(matches!(
            adapter.score(&rows(2)),
            Err(MlError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_score_stream_counts_rows() {
        let mut total = 0.0;
        let n = linear_adapter(2)
            .score_stream(rows(5), |p| total += p)
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(total, 100.0);
    }
}
