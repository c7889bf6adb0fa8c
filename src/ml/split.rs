//! Train/Test Splitting
//!
//! Seeded shuffle splits so every training run is reproducible. The
//! classification split is stratified on the binary failure target since
//! failures are rare (~3% of the AI4I dataset).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffled index split: returns `(train, test)` with `test_ratio` of the
/// rows in the test set (rounded down, at least one test row when n > 1).
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test_len = (n as f64 * test_ratio) as usize;
    if test_len == 0 && n > 1 {
        test_len = 1;
    }
    let test = indices[..test_len].to_vec();
    let train = indices[test_len..].to_vec();
    (train, test)
}

/// Stratified split preserving per-class proportions of `y`.
pub fn stratified_split(y: &[usize], test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut classes: Vec<usize> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in classes {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);
        let mut test_len = (members.len() as f64 * test_ratio) as usize;
        if test_len == 0 && members.len() > 1 {
            test_len = 1;
        }
        test.extend_from_slice(&members[..test_len]);
        train.extend_from_slice(&members[test_len..]);
    }

    // Final shuffle so per-class blocks are not contiguous.
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    (train, test)
}

/// Gather rows/targets by index.
pub fn take_rows(x: &[Vec<f64>], indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().map(|&i| x[i].clone()).collect()
}

pub fn take<T: Copy>(y: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| y[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_disjoint() {
        let (train, test) = train_test_split(100, 0.2, 42);
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_reproducible() {
        assert_eq!(train_test_split(50, 0.2, 7), train_test_split(50, 0.2, 7));
        assert_ne!(train_test_split(50, 0.2, 7).1, train_test_split(50, 0.2, 8).1);
    }

    #[test]
    fn test_stratified_preserves_minority() {
        // 90 zeros, 10 ones: the 20% test set must contain ones.
        let mut y = vec![0usize; 90];
        y.extend(vec![1usize; 10]);

        let (train, test) = stratified_split(&y, 0.2, 42);
        assert_eq!(train.len() + test.len(), 100);

        let test_ones = test.iter().filter(|&&i| y[i] == 1).count();
        assert_eq!(test_ones, 2);
        let test_zeros = test.len() - test_ones;
        assert_eq!(test_zeros, 18);
    }
}
