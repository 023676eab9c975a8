//! Interface checks for the batch generator adapters, one per iteration
//! convention.

use smolder::{
    dataset::{one_hot, DataLoader, Dataset},
    generator::{CycleGenerator, DataGenerator, LoaderGenerator, Sequence, SequenceGenerator},
    tensor::Tensor,
    Error,
};


use assert::assert_shape;

/// A dataset of grayscale images with one-hot targets over 10 classes.
fn image_dataset(samples: usize) -> Dataset {
    let pixels: Vec<f32> = (0..samples * 28 * 28)
        .map(|v| (v % 255) as f32 / 255.0)
        .collect();
    let labels: Vec<usize> = (0..samples).map(|v| v % 10).collect();
    Dataset::new(
        Tensor::new(&[samples, 28, 28, 1], &pixels).unwrap(),
        one_hot(&labels, 10).unwrap(),
    )
    .unwrap()
}

/// A dataset of single-channel grids with plain scalar labels.
fn grid_dataset(samples: usize) -> Dataset {
    let cells: Vec<f32> = (0..samples * 25).map(|v| v as f32 / 100.0).collect();
    let labels: Vec<f32> = (0..samples).map(|v| (v % 10) as f32).collect();
    Dataset::new(
        Tensor::new(&[samples, 1, 5, 5], &cells).unwrap(),
        Tensor::new(&[samples], &labels).unwrap(),
    )
    .unwrap()
}

#[test]
fn sequence_interface() {
    let mut generator = SequenceGenerator::new(image_dataset(5), 1).unwrap();
    let (x, y) = generator.get_batch().unwrap();
    assert_shape(&x, &[1, 28, 28, 1]);
    assert_shape(&y, &[1, 10]);
    assert_eq!(generator.size(), Some(5));
    assert_eq!(generator.batch_size(), 1);
}

#[test]
fn sequence_specific_access() {
    let generator = SequenceGenerator::new(image_dataset(5), 1).unwrap();
    let (x, y) = generator.sequence().sample(3).unwrap();
    assert_shape(&x, &[28, 28, 1]);
    assert_shape(&y, &[10]);
}

#[test]
fn sequence_batches_wrap_around() {
    let mut generator = SequenceGenerator::new(image_dataset(3), 5).unwrap();
    let (x, y) = generator.get_batch().unwrap();
    assert_shape(&x, &[5, 28, 28, 1]);
    assert_shape(&y, &[5, 10]);
    // With 3 samples behind a batch of 5, the batch reuses samples 0 and 1.
    let labels = y.argmax_rows().unwrap();
    assert_eq!(labels, vec![0, 1, 2, 0, 1]);
}

#[test]
fn cycle_interface() {
    let dataset = image_dataset(5);
    let make = move || {
        let batch = (dataset.inputs().clone(), dataset.targets().clone());
        std::iter::once(batch)
    };
    let mut generator = CycleGenerator::new(make, None, 5).unwrap();
    for _ in 0..3 {
        let (x, y) = generator.get_batch().unwrap();
        assert_shape(&x, &[5, 28, 28, 1]);
        assert_shape(&y, &[5, 10]);
    }
    assert_eq!(generator.size(), None);
    assert_eq!(generator.batch_size(), 5);
}

#[test]
fn cycle_specific_access() {
    let dataset = image_dataset(5);
    let make = move || {
        let batch = (dataset.inputs().clone(), dataset.targets().clone());
        std::iter::once(batch)
    };
    let mut generator = CycleGenerator::new(make, Some(5), 5).unwrap();
    let (x, y) = generator.inner_mut().next().unwrap();
    assert_shape(&x, &[5, 28, 28, 1]);
    assert_shape(&y, &[5, 10]);
}

#[test]
fn loader_interface() {
    let loader = DataLoader::new(grid_dataset(10), 5, true)
        .unwrap()
        .with_seed(23);
    let mut generator = LoaderGenerator::new(loader);
    let (x, y) = generator.get_batch().unwrap();
    assert_shape(&x, &[5, 1, 5, 5]);
    assert_shape(&y, &[5]);
    assert_eq!(generator.size(), Some(10));
    assert_eq!(generator.batch_size(), 5);
}

#[test]
fn loader_specific_access() {
    let loader = DataLoader::new(grid_dataset(10), 5, true)
        .unwrap()
        .with_seed(23);
    let mut generator = LoaderGenerator::new(loader);
    let (x, y) = generator.loader_mut().next_batch().unwrap();
    assert_shape(&x, &[5, 1, 5, 5]);
    assert_shape(&y, &[5]);
    assert_eq!(generator.loader().len(), 10);
}

#[test]
fn loader_batches_cover_each_pass() {
    let loader = DataLoader::new(grid_dataset(10), 5, true)
        .unwrap()
        .with_seed(7);
    let mut generator = LoaderGenerator::new(loader);
    let mut seen = Vec::new();
    for _ in 0..2 {
        let (_, y) = generator.get_batch().unwrap();
        seen.extend(y.ravel());
    }
    seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let expected: Vec<f32> = (0..10).map(|v| v as f32).collect();
    assert_eq!(seen, expected);
}

#[test]
fn adapters_validate_their_parameters() {
    assert!(matches!(
        SequenceGenerator::new(image_dataset(3), 0),
        Err(Error::InvalidParameter(_))
    ));
    let make = || std::iter::empty::<(Tensor, Tensor)>();
    assert!(matches!(
        CycleGenerator::new(make, None, 0),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn datasets_are_sequences() {
    let dataset = grid_dataset(4);
    assert_eq!(Sequence::len(&dataset), 4);
    let (x, y) = Sequence::sample(&dataset, 2).unwrap();
    assert_shape(&x, &[1, 5, 5]);
    assert!(y.shape().is_empty());
}
