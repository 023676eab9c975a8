//! Evasion attacks against differentiable classifiers.

use crate::{dataset, estimator::Estimator, tensor::Tensor, Error};

pub mod fast_gradient;
pub mod frame_saliency;

pub use fast_gradient::{FastGradientMethod, Norm};
pub use frame_saliency::{FrameSaliencyAttack, SaliencyMethod};

/// An attack crafting adversarial examples from clean inputs.
pub trait Evasion {
    /// Craft adversarial examples for `x`, optionally steered by labels `y`.
    ///
    /// The result has the same shape as `x`. Untargeted attacks fall back to
    /// the classifier's own predictions when `y` is absent; targeted attacks
    /// fail without labels.
    fn generate(&self, x: &Tensor, y: Option<&Tensor>) -> Result<Tensor, Error>;

    /// Whether the attack drives inputs toward the labels instead of away
    /// from them.
    fn is_targeted(&self) -> bool {
        false
    }
}

/// Settle the labels an attack works against.
///
/// Explicit labels win. Without them, a targeted attack has nothing to aim
/// for, while an untargeted attack uses the classifier's own predictions.
pub(crate) fn resolve_targets<C>(
    classifier: &C,
    x: &Tensor,
    y: Option<&Tensor>,
    targeted: bool,
) -> Result<Tensor, Error>
where
    C: Estimator + ?Sized,
{
    if x.rank() == 0 {
        return Err(Error::InvalidParameter("inputs must carry a batch axis"));
    }
    match y {
        Some(y) => {
            if y.rank() == 0 || y.shape()[0] != x.shape()[0] {
                return Err(Error::MismatchedSamples {
                    inputs: x.shape()[0],
                    targets: y.shape().first().copied().unwrap_or(0),
                });
            }
            Ok(y.clone())
        }
        None => {
            if targeted {
                return Err(Error::MissingTargets);
            }
            let predicted = classifier.predict(x)?.argmax_rows()?;
            dataset::one_hot(&predicted, classifier.nb_classes())
        }
    }
}

/// Mark the samples whose adversarial version lands on the attack's desired
/// side of the decision boundary.
pub(crate) fn attack_success<C>(
    classifier: &C,
    targets: &Tensor,
    x_adv: &Tensor,
    targeted: bool,
) -> Result<Vec<bool>, Error>
where
    C: Estimator + ?Sized,
{
    let predicted = classifier.predict(x_adv)?.argmax_rows()?;
    let wanted = targets.argmax_rows()?;
    let success = predicted
        .iter()
        .zip(wanted)
        .map(|(&p, w)| if targeted { p == w } else { p != w })
        .collect();
    Ok(success)
}

/// Compute the share of successful samples.
pub(crate) fn success_rate(success: &[bool]) -> f32 {
    if success.is_empty() {
        return 0.0;
    }
    success.iter().filter(|&&s| s).count() as f32 / success.len() as f32
}
