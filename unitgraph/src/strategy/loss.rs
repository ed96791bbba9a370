use crate::error::{Error, Result};
use crate::tensor::Scalar;

/// Per-sample loss and its gradient with respect to the prediction.
pub trait Loss<T: Scalar>: Send + Sync {
    fn apply(&self, prediction: &[T], label: &[T]) -> Result<T>;

    fn derivative(&self, prediction: &[T], label: &[T], grad: &mut [T]) -> Result<()>;
}

fn check(prediction: usize, label: usize, grad: Option<usize>) -> Result<()> {
    if prediction != label {
        return Err(Error::values("loss label", prediction, label));
    }
    if let Some(grad) = grad {
        if grad != prediction {
            return Err(Error::values("loss gradient", prediction, grad));
        }
    }
    Ok(())
}

/// Mean squared error over the elements of one sample.
pub struct MeanSquaredError;

impl<T: Scalar> Loss<T> for MeanSquaredError {
    fn apply(&self, prediction: &[T], label: &[T]) -> Result<T> {
        check(prediction.len(), label.len(), None)?;
        let mut sum = T::zero();
        for (p, l) in prediction.iter().zip(label) {
            let diff = *p - *l;
            sum += diff * diff;
        }
        Ok(sum / T::from_f64(prediction.len() as f64))
    }

    fn derivative(&self, prediction: &[T], label: &[T], grad: &mut [T]) -> Result<()> {
        check(prediction.len(), label.len(), Some(grad.len()))?;
        let factor = T::from_f64(2.0 / prediction.len() as f64);
        for ((g, p), l) in grad.iter_mut().zip(prediction).zip(label) {
            *g = (*p - *l) * factor;
        }
        Ok(())
    }
}

/// Categorical cross entropy `-Σ label·ln(prediction)`.
pub struct CrossEntropy;

const EPSILON: f64 = 1e-12;

impl<T: Scalar> Loss<T> for CrossEntropy {
    fn apply(&self, prediction: &[T], label: &[T]) -> Result<T> {
        check(prediction.len(), label.len(), None)?;
        let eps = T::from_f64(EPSILON);
        let mut sum = T::zero();
        for (p, l) in prediction.iter().zip(label) {
            sum += *l * p.max(eps).ln();
        }
        Ok(-sum)
    }

    fn derivative(&self, prediction: &[T], label: &[T], grad: &mut [T]) -> Result<()> {
        check(prediction.len(), label.len(), Some(grad.len()))?;
        let eps = T::from_f64(EPSILON);
        for ((g, p), l) in grad.iter_mut().zip(prediction).zip(label) {
            *g = -(*l / p.max(eps));
        }
        Ok(())
    }
}
