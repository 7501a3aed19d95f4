//! Seeded train/test split

use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a shuffled split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(n * test_size)` rows.
pub fn shuffle_split(n: usize, test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PredictorError::InvalidInput(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PredictorError::InvalidInput(format!(
            "Cannot split {} rows with test_size {}: both splits must be non-empty",
            n, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

/// Train and test partitions of a feature matrix and its target
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

impl TrainTestSplit {
    pub fn from_indices(x: &Array2<f64>, y: &Array1<f64>, split: &SplitIndices) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(PredictorError::shape_mismatch(x.nrows(), y.len()));
        }
        Ok(Self {
            x_train: x.select(Axis(0), &split.train),
            x_test: x.select(Axis(0), &split.test),
            y_train: y.select(Axis(0), &split.train),
            y_test: y.select(Axis(0), &split.test),
        })
    }
}

/// Convenience wrapper over [`shuffle_split`] and [`TrainTestSplit::from_indices`].
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let split = shuffle_split(x.nrows(), test_size, seed)?;
    TrainTestSplit::from_indices(x, y, &split)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_round_up_test() {
        let split = shuffle_split(11, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(shuffle_split(50, 0.3, 7).unwrap(), shuffle_split(50, 0.3, 7).unwrap());
        assert_ne!(shuffle_split(50, 0.3, 7).unwrap(), shuffle_split(50, 0.3, 8).unwrap());
    }

    #[test]
    fn test_split_rejects_degenerate_sizes() {
        assert!(shuffle_split(1, 0.2, 42).is_err());
        assert!(shuffle_split(10, 1.0, 42).is_err());
    }

    #[test]
    fn test_train_test_split_keeps_rows_aligned() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_shape_fn(10, |i| (i * 10) as f64);
        let split = train_test_split(&x, &y, 0.25, 3).unwrap();
        for (row, target) in split.x_train.rows().into_iter().zip(split.y_train.iter()) {
            assert_eq!(row[0], *target);
        }
        assert_eq!(split.x_test.nrows(), 3);
    }
}
