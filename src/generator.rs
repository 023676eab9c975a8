//! Uniform batch retrieval over heterogeneous iteration conventions.
//!
//! Data sources come in several shapes: iterators that already yield whole
//! batches, sequences offering random access to single samples, and loaders
//! that chunk and reshuffle an underlying dataset. Each adapter in this
//! module normalizes one of those conventions behind [`DataGenerator`], so
//! consumers can pull `(inputs, targets)` batches without caring where they
//! come from. Every adapter also exposes the source it wraps, for callers
//! that need convention-specific access.

use tracing::debug;

use crate::{
    dataset::{DataLoader, Dataset},
    tensor::Tensor,
    Error,
};

/// A uniform interface for retrieving batches of inputs and targets.
///
/// The batch stream never ends. When an adapter exhausts its source, it wraps
/// around and keeps yielding.
pub trait DataGenerator {
    /// Return the next batch of inputs and targets.
    fn get_batch(&mut self) -> Result<(Tensor, Tensor), Error>;

    /// Return the total number of samples behind the generator, when known.
    fn size(&self) -> Option<usize>;

    /// Return the number of samples per batch.
    fn batch_size(&self) -> usize;
}

/// Random access to individual samples by index.
pub trait Sequence {
    /// Return the number of samples in the sequence.
    fn len(&self) -> usize;

    /// Check if the sequence has no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the input/target pair at the given index.
    fn sample(&self, index: usize) -> Result<(Tensor, Tensor), Error>;
}

impl Sequence for Dataset {
    fn len(&self) -> usize {
        self.len()
    }

    fn sample(&self, index: usize) -> Result<(Tensor, Tensor), Error> {
        self.sample(index)
    }
}

/// Adapts an iterator that already yields whole batches.
///
/// The iterator is rebuilt through its factory whenever it runs out, so the
/// batch stream is endless even over a finite source.
#[derive(Debug)]
pub struct CycleGenerator<I, F> {
    make: F,
    inner: I,
    size: Option<usize>,
    batch_size: usize,
}

impl<I, F> CycleGenerator<I, F>
where
    I: Iterator<Item = (Tensor, Tensor)>,
    F: Fn() -> I,
{
    /// Create a generator from a batch-iterator factory.
    ///
    /// `size` is the total sample count behind the iterator, when known.
    pub fn new(make: F, size: Option<usize>, batch_size: usize) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch_size must be positive"));
        }
        let inner = make();
        Ok(Self {
            make,
            inner,
            size,
            batch_size,
        })
    }

    /// Return the wrapped batch iterator.
    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.inner
    }
}

impl<I, F> DataGenerator for CycleGenerator<I, F>
where
    I: Iterator<Item = (Tensor, Tensor)>,
    F: Fn() -> I,
{
    fn get_batch(&mut self) -> Result<(Tensor, Tensor), Error> {
        let (x, y) = match self.inner.next() {
            Some(batch) => batch,
            None => {
                debug!("batch iterator ran out, restarting it");
                self.inner = (self.make)();
                self.inner.next().ok_or(Error::EmptySource)?
            }
        };
        if x.rank() == 0 || y.rank() == 0 || x.shape()[0] != y.shape()[0] {
            return Err(Error::MismatchedSamples {
                inputs: x.shape().first().copied().unwrap_or(0),
                targets: y.shape().first().copied().unwrap_or(0),
            });
        }
        Ok((x, y))
    }

    fn size(&self) -> Option<usize> {
        self.size
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Adapts a [`Sequence`], assembling batches from single samples.
///
/// A cursor walks the sequence and wraps around at its end, so a batch may
/// span the seam between two passes, and a sequence shorter than the batch
/// size contributes samples more than once per batch.
#[derive(Debug)]
pub struct SequenceGenerator<S> {
    sequence: S,
    cursor: usize,
    batch_size: usize,
}

impl<S: Sequence> SequenceGenerator<S> {
    /// Create a generator over a sequence.
    pub fn new(sequence: S, batch_size: usize) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch_size must be positive"));
        }
        if sequence.is_empty() {
            return Err(Error::EmptySource);
        }
        Ok(Self {
            sequence,
            cursor: 0,
            batch_size,
        })
    }

    /// Return the wrapped sequence.
    pub fn sequence(&self) -> &S {
        &self.sequence
    }
}

impl<S: Sequence> DataGenerator for SequenceGenerator<S> {
    fn get_batch(&mut self) -> Result<(Tensor, Tensor), Error> {
        let mut xs = Vec::with_capacity(self.batch_size);
        let mut ys = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let (x, y) = self.sequence.sample(self.cursor)?;
            xs.push(x);
            ys.push(y);
            self.cursor += 1;
            if self.cursor == self.sequence.len() {
                debug!("sequence exhausted, wrapping around");
                self.cursor = 0;
            }
        }
        Ok((Tensor::stack(&xs)?, Tensor::stack(&ys)?))
    }

    fn size(&self) -> Option<usize> {
        Some(self.sequence.len())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Adapts a shuffling [`DataLoader`].
///
/// The loader already yields uniform batches and re-primes itself at the end
/// of every pass, so this adapter only forwards. It exists to put loaders
/// behind the same interface as the other conventions while keeping the
/// loader itself reachable.
#[derive(Debug)]
pub struct LoaderGenerator {
    loader: DataLoader,
}

impl LoaderGenerator {
    /// Create a generator over a data loader.
    pub fn new(loader: DataLoader) -> Self {
        Self { loader }
    }

    /// Return the wrapped loader.
    pub fn loader(&self) -> &DataLoader {
        &self.loader
    }

    /// Return the wrapped loader for direct batch access.
    pub fn loader_mut(&mut self) -> &mut DataLoader {
        &mut self.loader
    }
}

impl DataGenerator for LoaderGenerator {
    fn get_batch(&mut self) -> Result<(Tensor, Tensor), Error> {
        self.loader.next_batch()
    }

    fn size(&self) -> Option<usize> {
        Some(self.loader.len())
    }

    fn batch_size(&self) -> usize {
        self.loader.batch_size()
    }
}

#[cfg(test)]
mod tests {
    use super::{CycleGenerator, DataGenerator, Sequence, SequenceGenerator};
    use crate::{dataset::Dataset, tensor::Tensor, Error};

    fn tiny_dataset(samples: usize) -> Dataset {
        let data: Vec<f32> = (0..samples * 3).map(|x| x as f32).collect();
        let labels: Vec<f32> = (0..samples).map(|x| x as f32).collect();
        Dataset::new(
            Tensor::new(&[samples, 3], &data).unwrap(),
            Tensor::new(&[samples], &labels).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn sequence_generator_wraps_short_sequences() {
        let mut generator = SequenceGenerator::new(tiny_dataset(3), 5).unwrap();
        let (x, y) = generator.get_batch().unwrap();
        assert_eq!(x.shape(), &[5, 3]);
        assert_eq!(y.shape(), &[5]);
        assert_eq!(y.ravel(), vec![0.0, 1.0, 2.0, 0.0, 1.0]);
        // The cursor keeps walking from where the last batch stopped.
        let (_, y) = generator.get_batch().unwrap();
        assert_eq!(y.ravel(), vec![2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn sequence_generator_reports_its_source() {
        let generator = SequenceGenerator::new(tiny_dataset(4), 2).unwrap();
        assert_eq!(generator.size(), Some(4));
        assert_eq!(generator.batch_size(), 2);
        let (x, y) = generator.sequence().sample(1).unwrap();
        assert_eq!(x.shape(), &[3]);
        assert!(y.shape().is_empty());
    }

    #[test]
    fn cycle_generator_restarts_its_iterator() {
        let batch = (
            Tensor::new(&[2, 3], &[0.0; 6]).unwrap(),
            Tensor::new(&[2, 4], &[0.0; 8]).unwrap(),
        );
        let make = move || std::iter::once(batch.clone());
        let mut generator = CycleGenerator::new(make, Some(2), 2).unwrap();
        for _ in 0..3 {
            let (x, y) = generator.get_batch().unwrap();
            assert_eq!(x.shape(), &[2, 3]);
            assert_eq!(y.shape(), &[2, 4]);
        }
    }

    #[test]
    fn cycle_generator_rejects_mismatched_batches() {
        let make = || {
            std::iter::once((
                Tensor::new(&[2, 3], &[0.0; 6]).unwrap(),
                Tensor::new(&[3, 4], &[0.0; 12]).unwrap(),
            ))
        };
        let mut generator = CycleGenerator::new(make, None, 2).unwrap();
        assert!(matches!(
            generator.get_batch(),
            Err(Error::MismatchedSamples { .. })
        ));
    }

    #[test]
    fn cycle_generator_rejects_empty_sources() {
        let make = || std::iter::empty();
        let mut generator = CycleGenerator::new(make, None, 2).unwrap();
        assert!(matches!(generator.get_batch(), Err(Error::EmptySource)));
    }

    #[test]
    fn generators_validate_batch_size() {
        assert!(matches!(
            SequenceGenerator::new(tiny_dataset(3), 0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn dataset_is_a_sequence() {
        let dataset = tiny_dataset(2);
        assert_eq!(Sequence::len(&dataset), 2);
        assert!(!Sequence::is_empty(&dataset));
    }
}
