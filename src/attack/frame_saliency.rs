//! Frame saliency attacks for inputs with a temporal axis.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::{
    attack::{attack_success, resolve_targets, success_rate, Evasion},
    estimator::LossGradients,
    tensor::Tensor,
    Error,
};

/// Strategy for choosing which frames of an input to perturb.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaliencyMethod {
    /// Perturb the whole input at once by delegating to the inner attacker.
    OneShot,
    /// Perturb frames one at a time, most salient first, until the attack
    /// succeeds.
    #[default]
    IterativeSaliency,
    /// Like [`SaliencyMethod::IterativeSaliency`], but re-rank the remaining
    /// frames and refresh the adversarial counterpart after every step.
    IterativeSaliencyRefresh,
}

/// An attack confining an inner attacker's perturbations to few frames.
///
/// Inputs must carry a dedicated frame axis (axis 1 by default, as in a
/// batch of videos shaped `(batch, time, ...)`). Frames are ranked by
/// saliency, the mean absolute loss gradient over a frame's elements, and
/// replaced one by one with their adversarial counterpart until every sample
/// crosses the decision boundary.
#[derive(Debug)]
pub struct FrameSaliencyAttack<'a, C, A> {
    classifier: &'a C,
    attacker: &'a A,
    method: SaliencyMethod,
    frame_index: usize,
}

impl<'a, C, A> FrameSaliencyAttack<'a, C, A>
where
    C: LossGradients,
    A: Evasion,
{
    /// Create an attack wrapping the given inner attacker.
    pub fn new(classifier: &'a C, attacker: &'a A, method: SaliencyMethod) -> Self {
        Self {
            classifier,
            attacker,
            method,
            frame_index: 1,
        }
    }

    /// Change the axis holding the frames.
    pub fn with_frame_index(mut self, frame_index: usize) -> Result<Self, Error> {
        if frame_index == 0 {
            return Err(Error::InvalidParameter("axis 0 is the batch axis"));
        }
        self.frame_index = frame_index;
        Ok(self)
    }

    /// Rank each sample's frames by saliency, most salient first.
    ///
    /// Disregarded frames score negative infinity, sinking to the end of the
    /// ranking. Ties resolve to the lower frame index.
    fn frames_to_perturb(
        &self,
        x_adv: &Tensor,
        targets: &Tensor,
        disregard: Option<&[Vec<bool>]>,
    ) -> Result<Vec<Vec<usize>>, Error> {
        let grad = self.classifier.loss_gradient(x_adv, targets)?;
        let grad = grad.transpose(1, self.frame_index)?;
        let samples = grad.shape()[0];
        let frames = grad.shape()[1];
        let rest: usize = grad.shape()[2..].iter().product();
        let scores = grad
            .abs()
            .reshape(&[samples, frames, rest])?
            .mean(&[2])?
            .reshape(&[samples, frames])?
            .ravel();
        let mut ranking = Vec::with_capacity(samples);
        for sample in 0..samples {
            let row = &scores[sample * frames..(sample + 1) * frames];
            let score = |frame: usize| {
                if disregard.is_some_and(|d| d[sample][frame]) {
                    f32::NEG_INFINITY
                } else {
                    row[frame]
                }
            };
            let mut order: Vec<usize> = (0..frames).collect();
            order.sort_by(|&a, &b| {
                score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal)
            });
            ranking.push(order);
        }
        Ok(ranking)
    }

    /// Copy the designated frame of each still-failing sample from `x_new`
    /// into `x_adv`.
    fn replace_frames(
        &self,
        x_adv: &Tensor,
        x_new: &Tensor,
        ranking: &[Vec<usize>],
        column: usize,
        failing: &[bool],
    ) -> Result<Tensor, Error> {
        let moved = x_adv.transpose(1, self.frame_index)?;
        let moved_new = x_new.transpose(1, self.frame_index)?;
        let shape = moved.shape().to_vec();
        let frames = shape[1];
        let frame_elems: usize = shape[2..].iter().product();
        let mut buffer = moved.ravel();
        let source = moved_new.ravel();
        for (sample, fail) in failing.iter().enumerate() {
            if !fail {
                continue;
            }
            let frame = ranking[sample][column];
            let start = (sample * frames + frame) * frame_elems;
            buffer[start..start + frame_elems]
                .copy_from_slice(&source[start..start + frame_elems]);
        }
        let moved = Tensor::new(&shape, &buffer)?;
        moved.transpose(1, self.frame_index).map_err(Into::into)
    }
}

impl<C, A> Evasion for FrameSaliencyAttack<'_, C, A>
where
    C: LossGradients,
    A: Evasion,
{
    fn generate(&self, x: &Tensor, y: Option<&Tensor>) -> Result<Tensor, Error> {
        if x.rank() < 3 || self.frame_index >= x.rank() {
            return Err(Error::NoFrameAxis {
                rank: x.rank(),
                frame_index: self.frame_index,
            });
        }
        if self.method == SaliencyMethod::OneShot {
            return self.attacker.generate(x, y);
        }

        let targeted = self.attacker.is_targeted();
        let targets = resolve_targets(self.classifier, x, y, targeted)?;
        let samples = x.shape()[0];
        let frames = x.shape()[self.frame_index];
        let refresh = self.method == SaliencyMethod::IterativeSaliencyRefresh;

        let mut x_adv = x.clone();
        // Samples already on the desired side of the boundary are left
        // untouched.
        let mut failing = invert(&attack_success(
            self.classifier,
            &targets,
            &x_adv,
            targeted,
        )?);
        let mut disregard = vec![vec![false; frames]; samples];
        let mut ranking = self.frames_to_perturb(&x_adv, &targets, None)?;
        let mut x_adv_new = self.attacker.generate(x, Some(&targets))?;
        if refresh {
            for (sample, order) in ranking.iter().enumerate() {
                disregard[sample][order[0]] = true;
            }
        }

        for column in 0..frames {
            if !failing.iter().any(|&f| f) {
                break;
            }
            debug!(
                column,
                remaining = failing.iter().filter(|&&f| f).count(),
                "perturbing the next most salient frame"
            );
            x_adv = self.replace_frames(&x_adv, &x_adv_new, &ranking, column, &failing)?;
            failing = invert(&attack_success(
                self.classifier,
                &targets,
                &x_adv,
                targeted,
            )?);
            if refresh && column + 1 < frames {
                ranking = self.frames_to_perturb(&x_adv, &targets, Some(&disregard))?;
                for (sample, order) in ranking.iter().enumerate() {
                    disregard[sample][order[column + 1]] = true;
                }
                x_adv_new = self.attacker.generate(&x_adv, Some(&targets))?;
            }
        }

        let success = attack_success(self.classifier, &targets, &x_adv, targeted)?;
        info!(
            rate = success_rate(&success),
            method = ?self.method,
            "frame saliency attack finished"
        );
        Ok(x_adv)
    }

    fn is_targeted(&self) -> bool {
        self.attacker.is_targeted()
    }
}

fn invert(flags: &[bool]) -> Vec<bool> {
    flags.iter().map(|&f| !f).collect()
}

#[cfg(test)]
mod tests {
    use super::{FrameSaliencyAttack, SaliencyMethod};
    use crate::{
        attack::{Evasion, FastGradientMethod},
        estimator::{Estimator, SoftmaxRegression},
        tensor::Tensor,
        Error,
    };

    /// A classifier over 2 frames of 2 features whose scores depend only on
    /// the second frame, making it the uniquely salient one.
    fn frame_sensitive_classifier() -> SoftmaxRegression {
        let weights = Tensor::new(
            &[4, 2],
            &[
                0.0, 0.0, //
                0.0, 0.0, //
                3.0, -3.0, //
                -3.0, 3.0,
            ],
        )
        .unwrap();
        let bias = Tensor::new(&[2], &[0.0, 0.0]).unwrap();
        SoftmaxRegression::from_parameters(weights, bias, &[2, 2], None).unwrap()
    }

    fn changed_frames(x: &Tensor, x_adv: &Tensor) -> Vec<Vec<usize>> {
        let samples = x.shape()[0];
        let frames = x.shape()[1];
        let rest: usize = x.shape()[2..].iter().product();
        let a = x.ravel();
        let b = x_adv.ravel();
        (0..samples)
            .map(|s| {
                (0..frames)
                    .filter(|f| {
                        let start = (s * frames + f) * rest;
                        a[start..start + rest] != b[start..start + rest]
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn iterative_saliency_touches_only_the_salient_frame() {
        let classifier = frame_sensitive_classifier();
        let x = Tensor::new(
            &[3, 2, 2],
            &[
                0.4, -0.3, 0.5, -0.5, //
                -0.2, 0.8, 0.6, -0.4, //
                0.0, 0.0, -0.7, 0.7,
            ],
        )
        .unwrap();
        let clean = classifier.predict(&x).unwrap().argmax_rows().unwrap();

        let attacker = FastGradientMethod::new(&classifier, 1.5).unwrap();
        let attack =
            FrameSaliencyAttack::new(&classifier, &attacker, SaliencyMethod::IterativeSaliency);
        // Without labels, the attack works against the classifier's own
        // predictions.
        let x_adv = attack.generate(&x, None).unwrap();

        // Every sample flips by rewriting its second frame alone; the first
        // frame has zero gradient and zero saliency.
        for frames in changed_frames(&x, &x_adv) {
            assert_eq!(frames, vec![1]);
        }
        let flipped = classifier.predict(&x_adv).unwrap().argmax_rows().unwrap();
        assert!(flipped.iter().zip(clean).all(|(a, c)| *a != c));
    }

    #[test]
    fn one_shot_delegates_to_the_inner_attacker() {
        let classifier = frame_sensitive_classifier();
        let x = Tensor::new(&[2, 2, 2], &[0.4, -0.3, 0.5, -0.5, -0.2, 0.8, 0.6, -0.4]).unwrap();
        let labels = classifier.predict(&x).unwrap().argmax_rows().unwrap();
        let y = crate::dataset::one_hot(&labels, 2).unwrap();

        let attacker = FastGradientMethod::new(&classifier, 0.3).unwrap();
        let attack = FrameSaliencyAttack::new(&classifier, &attacker, SaliencyMethod::OneShot);
        assert_eq!(
            attack.generate(&x, Some(&y)).unwrap().ravel(),
            attacker.generate(&x, Some(&y)).unwrap().ravel()
        );
    }

    #[test]
    fn rejects_inputs_without_a_frame_axis() {
        let classifier = frame_sensitive_classifier();
        let attacker = FastGradientMethod::new(&classifier, 0.3).unwrap();
        let attack =
            FrameSaliencyAttack::new(&classifier, &attacker, SaliencyMethod::IterativeSaliency);

        let flat = Tensor::new(&[2, 4], &[0.0; 8]).unwrap();
        assert!(matches!(
            attack.generate(&flat, None),
            Err(Error::NoFrameAxis { rank: 2, .. })
        ));

        let attack = attack.with_frame_index(3).unwrap();
        let x = Tensor::new(&[2, 2, 2], &[0.0; 8]).unwrap();
        assert!(matches!(
            attack.generate(&x, None),
            Err(Error::NoFrameAxis { rank: 3, .. })
        ));
    }

    #[test]
    fn frame_index_zero_is_rejected() {
        let classifier = frame_sensitive_classifier();
        let attacker = FastGradientMethod::new(&classifier, 0.3).unwrap();
        let attack =
            FrameSaliencyAttack::new(&classifier, &attacker, SaliencyMethod::IterativeSaliency);
        assert!(matches!(
            attack.with_frame_index(0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn targeted_inner_attacker_needs_labels() {
        let classifier = frame_sensitive_classifier();
        let attacker = FastGradientMethod::new(&classifier, 0.3)
            .unwrap()
            .with_targeted(true);
        let attack =
            FrameSaliencyAttack::new(&classifier, &attacker, SaliencyMethod::IterativeSaliency);
        let x = Tensor::new(&[2, 2, 2], &[0.0; 8]).unwrap();
        assert!(matches!(
            attack.generate(&x, None),
            Err(Error::MissingTargets)
        ));
    }
}
