//! In-memory labeled datasets and batch loading.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

use crate::{tensor::Tensor, Error};

/// A labeled dataset held fully in memory.
///
/// Inputs and targets are tensors whose first axes agree; sample `i` is the
/// pair of their `i`-th slices along that axis.
#[derive(Clone, Debug)]
pub struct Dataset {
    inputs: Tensor,
    targets: Tensor,
}

impl Dataset {
    /// Create a dataset from an input tensor and a target tensor.
    pub fn new(inputs: Tensor, targets: Tensor) -> Result<Self, Error> {
        if inputs.rank() == 0 || targets.rank() == 0 {
            return Err(Error::EmptySource);
        }
        if inputs.shape()[0] != targets.shape()[0] {
            return Err(Error::MismatchedSamples {
                inputs: inputs.shape()[0],
                targets: targets.shape()[0],
            });
        }
        Ok(Self { inputs, targets })
    }

    /// Return the number of samples.
    pub fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    /// Check if the dataset has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the input/target pair at the given index.
    pub fn sample(&self, index: usize) -> Result<(Tensor, Tensor), Error> {
        let input = self.inputs.index_axis(0, index)?;
        let target = self.targets.index_axis(0, index)?;
        Ok((input, target))
    }

    /// Return the full input tensor.
    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    /// Return the full target tensor.
    pub fn targets(&self) -> &Tensor {
        &self.targets
    }
}

/// Chunks a dataset into batches, one pass at a time.
///
/// A pass visits every sample exactly once, in a fresh random order when
/// shuffling is enabled. The loader re-primes itself when a pass ends, so
/// batches can be pulled from it indefinitely.
#[derive(Debug)]
pub struct DataLoader {
    dataset: Dataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl DataLoader {
    /// Create a loader over the given dataset.
    pub fn new(dataset: Dataset, batch_size: usize, shuffle: bool) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch_size must be positive"));
        }
        let order: Vec<_> = (0..dataset.len()).collect();
        let mut loader = Self {
            dataset,
            batch_size,
            shuffle,
            drop_last: false,
            order,
            cursor: 0,
            rng: StdRng::from_entropy(),
        };
        loader.prime();
        Ok(loader)
    }

    /// Seed the loader's shuffling, fixing the order of every later pass.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.order = (0..self.dataset.len()).collect();
        self.rng = StdRng::seed_from_u64(seed);
        self.prime();
        self
    }

    /// Drop the final short chunk of every pass instead of yielding it.
    pub fn with_drop_last(mut self, drop_last: bool) -> Result<Self, Error> {
        if drop_last && self.batch_size > self.dataset.len() {
            return Err(Error::InvalidParameter(
                "batch_size must not exceed the dataset when dropping the last chunk",
            ));
        }
        self.drop_last = drop_last;
        Ok(self)
    }

    /// Return the number of samples behind the loader.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the loader has no samples behind it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the number of samples per full batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Return the dataset behind the loader.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Assemble and return the next batch of the current pass.
    pub fn next_batch(&mut self) -> Result<(Tensor, Tensor), Error> {
        let len = self.dataset.len();
        let exhausted = self.cursor >= len;
        let short = self.drop_last && len - self.cursor.min(len) < self.batch_size;
        if exhausted || short {
            debug!(shuffle = self.shuffle, "starting a new pass");
            self.prime();
        }
        let take = self.batch_size.min(len - self.cursor);
        let mut xs = Vec::with_capacity(take);
        let mut ys = Vec::with_capacity(take);
        for &index in &self.order[self.cursor..self.cursor + take] {
            let (x, y) = self.dataset.sample(index)?;
            xs.push(x);
            ys.push(y);
        }
        self.cursor += take;
        Ok((Tensor::stack(&xs)?, Tensor::stack(&ys)?))
    }

    fn prime(&mut self) {
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }
}

/// Turn class indices into one-hot probability rows.
pub fn one_hot(labels: &[usize], nb_classes: usize) -> Result<Tensor, Error> {
    if labels.is_empty() {
        return Err(Error::EmptySource);
    }
    if nb_classes == 0 {
        return Err(Error::InvalidParameter("nb_classes must be positive"));
    }
    let mut data = vec![0.0; labels.len() * nb_classes];
    for (row, &label) in labels.iter().enumerate() {
        if label >= nb_classes {
            return Err(Error::InvalidParameter("label is out of range"));
        }
        data[row * nb_classes + label] = 1.0;
    }
    Tensor::new(&[labels.len(), nb_classes], &data).map_err(Into::into)
}

/// Sample a dataset of Gaussian class blobs with one-hot targets.
///
/// Class `c` is centered at `separation` along input coordinate
/// `c % sample dimension`, with unit-variance noise on every coordinate.
/// Inputs get the shape `(samples, ...sample_shape)` and targets the shape
/// `(samples, nb_classes)`.
pub fn gaussian_blobs<R>(
    rng: &mut R,
    nb_classes: usize,
    samples_per_class: usize,
    sample_shape: &[usize],
    separation: f32,
) -> Result<Dataset, Error>
where
    R: Rng,
{
    if nb_classes == 0 || samples_per_class == 0 {
        return Err(Error::InvalidParameter(
            "nb_classes and samples_per_class must be positive",
        ));
    }
    let dim: usize = sample_shape.iter().product();
    if sample_shape.contains(&0) || dim == 0 {
        return Err(Error::InvalidParameter("sample_shape must not be empty"));
    }
    let total = nb_classes * samples_per_class;
    let mut data = Vec::with_capacity(total * dim);
    let mut labels = Vec::with_capacity(total);
    for class in 0..nb_classes {
        for _ in 0..samples_per_class {
            for coord in 0..dim {
                let noise: f32 = rng.sample(StandardNormal);
                let center = if coord == class % dim { separation } else { 0.0 };
                data.push(center + noise);
            }
            labels.push(class);
        }
    }
    let mut shape = Vec::with_capacity(sample_shape.len() + 1);
    shape.push(total);
    shape.extend_from_slice(sample_shape);
    Dataset::new(Tensor::new(&shape, &data)?, one_hot(&labels, nb_classes)?)
}
