//! Classifier abstractions the attacks are written against.
//!
//! Attacks only ever see the [`Estimator`] and [`LossGradients`] traits, so
//! any differentiable classifier can stand behind them. The crate ships
//! [`SoftmaxRegression`] as its reference implementation; its loss gradient
//! with respect to the input has a closed form, so no differentiation
//! machinery is involved.

use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::{dataset::DataLoader, tensor::Tensor, Error};

/// A fitted classifier producing class probabilities.
pub trait Estimator {
    /// Predict class probabilities for a batch of inputs.
    ///
    /// The result has one row per sample and one column per class, and every
    /// row is a probability distribution.
    fn predict(&self, x: &Tensor) -> Result<Tensor, Error>;

    /// Return the shape of a single input sample.
    fn input_shape(&self) -> &[usize];

    /// Return the number of classes the estimator separates.
    fn nb_classes(&self) -> usize;

    /// Return the interval that valid input elements lie in, when bounded.
    fn clip_values(&self) -> Option<(f32, f32)> {
        None
    }
}

/// An estimator whose classification loss is differentiable by input.
pub trait LossGradients: Estimator {
    /// Return the gradient of the loss with respect to `x`.
    ///
    /// The result has the same shape as `x`; each sample's slice is the
    /// gradient of that sample's own loss against the targets `y`.
    fn loss_gradient(&self, x: &Tensor, y: &Tensor) -> Result<Tensor, Error>;
}

/// A linear softmax classifier over flattened inputs.
#[derive(Clone, Debug)]
pub struct SoftmaxRegression {
    weights: Tensor,
    bias: Tensor,
    input_shape: Vec<usize>,
    clip_values: Option<(f32, f32)>,
}

impl SoftmaxRegression {
    /// Create an untrained classifier with small random weights.
    pub fn new<R>(
        input_shape: &[usize],
        nb_classes: usize,
        clip_values: Option<(f32, f32)>,
        rng: &mut R,
    ) -> Result<Self, Error>
    where
        R: Rng,
    {
        let features: usize = input_shape.iter().product();
        if input_shape.is_empty() || input_shape.contains(&0) {
            return Err(Error::InvalidParameter("input_shape must not be empty"));
        }
        if nb_classes < 2 {
            return Err(Error::InvalidParameter("nb_classes must be at least 2"));
        }
        if let Some((lo, hi)) = clip_values {
            if lo >= hi {
                return Err(Error::InvalidParameter("clip_values must be increasing"));
            }
        }
        let init: Vec<f32> = (0..features * nb_classes)
            .map(|_| {
                let noise: f32 = rng.sample(StandardNormal);
                noise * 0.1
            })
            .collect();
        Ok(Self {
            weights: Tensor::new(&[features, nb_classes], &init)?,
            bias: Tensor::zeros(&[nb_classes])?,
            input_shape: input_shape.to_vec(),
            clip_values,
        })
    }

    /// Create a classifier from existing parameters.
    ///
    /// `weights` maps flattened samples to class scores, one column per
    /// class; `bias` holds one score offset per class.
    pub fn from_parameters(
        weights: Tensor,
        bias: Tensor,
        input_shape: &[usize],
        clip_values: Option<(f32, f32)>,
    ) -> Result<Self, Error> {
        let features: usize = input_shape.iter().product();
        if weights.rank() != 2 || weights.shape()[0] != features {
            return Err(Error::InvalidParameter(
                "weights must be a matrix with one row per input feature",
            ));
        }
        let nb_classes = weights.shape()[1];
        if nb_classes < 2 {
            return Err(Error::InvalidParameter("nb_classes must be at least 2"));
        }
        if bias.shape() != [nb_classes] {
            return Err(Error::InvalidParameter(
                "bias must hold one offset per class",
            ));
        }
        if let Some((lo, hi)) = clip_values {
            if lo >= hi {
                return Err(Error::InvalidParameter("clip_values must be increasing"));
            }
        }
        Ok(Self {
            weights,
            bias,
            input_shape: input_shape.to_vec(),
            clip_values,
        })
    }

    /// Fit the classifier by mini-batch gradient descent on cross-entropy.
    pub fn fit(
        &mut self,
        loader: &mut DataLoader,
        epochs: usize,
        learning_rate: f32,
    ) -> Result<(), Error> {
        let batches = (loader.len() + loader.batch_size() - 1) / loader.batch_size();
        for epoch in 0..epochs {
            let mut last_loss = 0.0;
            for _ in 0..batches {
                let (x, y) = loader.next_batch()?;
                let flat = self.flatten(&x)?;
                let probabilities = self.predict(&x)?;
                let scale = 1.0 / x.shape()[0] as f32;
                let delta = probabilities.sub(&y)?.scale(scale);
                let weights_grad = flat.transpose(0, 1)?.matmul(&delta)?;
                let bias_grad = delta.sum(&[0])?.reshape(&[self.nb_classes()])?;
                self.weights = self.weights.sub(&weights_grad.scale(learning_rate))?;
                self.bias = self.bias.sub(&bias_grad.scale(learning_rate))?;
                last_loss = cross_entropy(&probabilities, &y)?;
            }
            debug!(epoch, loss = last_loss, "finished training epoch");
        }
        Ok(())
    }

    fn flatten(&self, x: &Tensor) -> Result<Tensor, Error> {
        if x.rank() < 2 || x.shape()[1..] != self.input_shape[..] {
            return Err(Error::UnexpectedInputShape {
                expected: self.input_shape.clone(),
                actual: x.shape().get(1..).unwrap_or_default().to_vec(),
            });
        }
        let features = self.weights.shape()[0];
        x.reshape(&[x.shape()[0], features]).map_err(Into::into)
    }

    fn check_targets(&self, rows: usize, y: &Tensor) -> Result<(), Error> {
        if y.rank() != 2 || y.shape()[1] != self.nb_classes() {
            return Err(Error::InvalidParameter(
                "targets must have one column per class",
            ));
        }
        if y.shape()[0] != rows {
            return Err(Error::MismatchedSamples {
                inputs: rows,
                targets: y.shape()[0],
            });
        }
        Ok(())
    }
}

impl Estimator for SoftmaxRegression {
    fn predict(&self, x: &Tensor) -> Result<Tensor, Error> {
        let flat = self.flatten(x)?;
        let scores = flat.matmul(&self.weights)?.add(&self.bias)?;
        // Shift scores by their row maximum so exp cannot overflow.
        let shifted = scores.sub(&scores.max(&[1])?)?;
        let exp = shifted.exp();
        exp.div(&exp.sum(&[1])?).map_err(Into::into)
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn nb_classes(&self) -> usize {
        self.weights.shape()[1]
    }

    fn clip_values(&self) -> Option<(f32, f32)> {
        self.clip_values
    }
}

impl LossGradients for SoftmaxRegression {
    fn loss_gradient(&self, x: &Tensor, y: &Tensor) -> Result<Tensor, Error> {
        self.check_targets(x.shape()[0], y)?;
        let probabilities = self.predict(x)?;
        let delta = probabilities.sub(y)?;
        let flat_grad = delta.matmul(&self.weights.transpose(0, 1)?)?;
        flat_grad.reshape(x.shape()).map_err(Into::into)
    }
}

/// Compute the mean cross-entropy between probability rows and target rows.
pub fn cross_entropy(probabilities: &Tensor, targets: &Tensor) -> Result<f32, Error> {
    let total = targets.mul(&probabilities.ln())?.sum(&[0, 1])?;
    let rows = probabilities.shape()[0] as f32;
    Ok(-total.ravel()[0] / rows)
}

/// Compute the share of samples whose predicted class matches the targets.
pub fn accuracy<C>(classifier: &C, x: &Tensor, y: &Tensor) -> Result<f32, Error>
where
    C: Estimator + ?Sized,
{
    let predicted = classifier.predict(x)?.argmax_rows()?;
    let wanted = y.argmax_rows()?;
    let hits = predicted
        .iter()
        .zip(wanted.iter())
        .filter(|(p, w)| p == w)
        .count();
    Ok(hits as f32 / predicted.len() as f32)
}
