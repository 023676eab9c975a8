//! The fast gradient method.

use tracing::info;

use crate::{
    attack::{attack_success, resolve_targets, success_rate, Evasion},
    estimator::LossGradients,
    tensor::Tensor,
    Error,
};

/// The norm a perturbation budget is measured under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Norm {
    /// Limit the largest change of any single element.
    #[default]
    Inf,
    /// Limit the sum of absolute changes per sample.
    L1,
    /// Limit the Euclidean length of the change per sample.
    L2,
}

/// A one-step attack moving inputs along their loss gradient.
///
/// Each sample is perturbed by `eps`, measured under the configured norm, in
/// the direction that increases its loss (decreases it, for targeted
/// attacks). The result is clipped back to the classifier's input range when
/// one is declared.
#[derive(Debug)]
pub struct FastGradientMethod<'a, C> {
    classifier: &'a C,
    eps: f32,
    norm: Norm,
    targeted: bool,
    batch_size: usize,
}

impl<'a, C> FastGradientMethod<'a, C>
where
    C: LossGradients,
{
    /// Create an untargeted attack with the given perturbation budget.
    pub fn new(classifier: &'a C, eps: f32) -> Result<Self, Error> {
        if eps <= 0.0 {
            return Err(Error::InvalidParameter("eps must be positive"));
        }
        Ok(Self {
            classifier,
            eps,
            norm: Norm::default(),
            targeted: false,
            batch_size: 128,
        })
    }

    /// Change the norm the perturbation budget is measured under.
    #[must_use]
    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    /// Drive inputs toward the given labels instead of away from them.
    #[must_use]
    pub fn with_targeted(mut self, targeted: bool) -> Self {
        self.targeted = targeted;
        self
    }

    /// Change the number of samples perturbed per gradient call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch_size must be positive"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Return the perturbation budget.
    pub fn eps(&self) -> f32 {
        self.eps
    }

    fn perturb(&self, x: &Tensor, y: &Tensor) -> Result<Tensor, Error> {
        let grad = self.classifier.loss_gradient(x, y)?;
        let grad = if self.targeted {
            grad.scale(-1.0)
        } else {
            grad
        };
        let perturbation = match self.norm {
            Norm::Inf => grad.sign().scale(self.eps),
            Norm::L1 | Norm::L2 => {
                let rows = x.shape()[0];
                let features = grad.elems() / rows;
                let flat = grad.reshape(&[rows, features])?;
                let magnitude = match self.norm {
                    Norm::L1 => flat.abs().sum(&[1])?,
                    _ => flat.mul(&flat)?.sum(&[1])?.sqrt(),
                };
                // Samples with an all-zero gradient stay put instead of
                // dividing to NaN.
                let divisors: Vec<f32> = magnitude
                    .ravel()
                    .iter()
                    .map(|&m| if m == 0.0 { 1.0 } else { m })
                    .collect();
                let divisor = Tensor::new(&[rows, 1], &divisors)?;
                flat.div(&divisor)?.scale(self.eps).reshape(x.shape())?
            }
        };
        let x_adv = x.add(&perturbation)?;
        Ok(match self.classifier.clip_values() {
            Some((lo, hi)) => x_adv.clamp(lo, hi),
            None => x_adv,
        })
    }
}

impl<C> Evasion for FastGradientMethod<'_, C>
where
    C: LossGradients,
{
    fn generate(&self, x: &Tensor, y: Option<&Tensor>) -> Result<Tensor, Error> {
        let targets = resolve_targets(self.classifier, x, y, self.targeted)?;
        let samples = x.shape()[0];
        let mut parts = Vec::new();
        let mut start = 0;
        while start < samples {
            let len = self.batch_size.min(samples - start);
            let xb = x.narrow(0, start, len)?;
            let yb = targets.narrow(0, start, len)?;
            parts.push(self.perturb(&xb, &yb)?);
            start += len;
        }
        let x_adv = Tensor::concat_rows(&parts)?;
        let success = attack_success(self.classifier, &targets, &x_adv, self.targeted)?;
        info!(
            rate = success_rate(&success),
            "fast gradient attack finished"
        );
        Ok(x_adv)
    }

    fn is_targeted(&self) -> bool {
        self.targeted
    }
}
