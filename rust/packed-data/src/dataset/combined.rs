// rust/packed-data/src/dataset/combined.rs

//! Weighted mixing of several sample sources.

use std::sync::Arc;

use rand::distr::{weighted::WeightedIndex, Distribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DataError, Result};

use super::traits::{Sample, SampleSource, SampleStream};
use super::worker::{current_worker, WorkerInfo};

/// Checks that `weights` can drive a weighted choice.
///
/// Weights must be non-empty, finite, non-negative, and not all zero.
pub fn validate_weights(weights: &[f64]) -> Result<()> {
    if weights.is_empty() {
        return Err(DataError::config("weights must not be empty"));
    }
    if !weights.iter().all(|&w| w >= 0.0 && w.is_finite()) {
        return Err(DataError::config(format!(
            "all weights must be finite and non-negative, got {weights:?}"
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(DataError::config(
            "all weights are zero, at least one weight must be positive",
        ));
    }
    Ok(())
}

/// Draws source indices with probability proportional to their weights.
#[derive(Debug, Clone)]
pub struct WeightedSelector {
    dist: WeightedIndex<f64>,
}

impl WeightedSelector {
    pub fn new(weights: &[f64]) -> Result<Self> {
        validate_weights(weights)?;
        let dist = WeightedIndex::new(weights)
            .map_err(|e| DataError::config(format!("invalid weights: {e}")))?;
        Ok(Self { dist })
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.dist.sample(rng)
    }
}

/// Picks one index of `weights` using `rng`.
///
/// The only state is the generator passed in, so a fixed seed gives a
/// fixed sequence of choices.
pub fn select<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<usize> {
    Ok(WeightedSelector::new(weights)?.select(rng))
}

/// Several sources merged into one stream by seeded weighted choice.
pub struct CombinedSource {
    name: String,
    sources: Vec<Arc<dyn SampleSource>>,
    weights: Vec<f64>,
    seed: u64,
}

impl CombinedSource {
    /// Creates a combined source.
    ///
    /// `weights` defaults to `1/N` per source. When given, it must have one
    /// entry per source.
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Arc<dyn SampleSource>>,
        weights: Option<Vec<f64>>,
        seed: u64,
    ) -> Result<Self> {
        let name = name.into();
        if sources.is_empty() {
            return Err(DataError::config(format!(
                "combined source '{name}' needs at least one child source"
            )));
        }

        let weights = match weights {
            Some(w) if w.len() != sources.len() => {
                return Err(DataError::config(format!(
                    "combined source '{name}': {} weights for {} sources",
                    w.len(),
                    sources.len()
                )));
            }
            Some(w) => w,
            None => vec![1.0 / sources.len() as f64; sources.len()],
        };
        validate_weights(&weights)?;

        Ok(Self {
            name,
            sources,
            weights,
            seed,
        })
    }

    /// Spawns a combined iterator for the calling thread's worker.
    pub fn spawn(&self) -> Result<CombinedIterator> {
        self.spawn_for(current_worker())
    }

    /// Spawns one child stream per source for `worker` plus a fresh selector.
    pub fn spawn_for(&self, worker: WorkerInfo) -> Result<CombinedIterator> {
        let streams = self
            .sources
            .iter()
            .map(|source| source.stream_for(worker))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            source = %self.name,
            children = streams.len(),
            weights = ?self.weights,
            seed = self.seed,
            "spawned combined iterator"
        );

        Ok(CombinedIterator {
            name: self.name.clone(),
            streams,
            selector: WeightedSelector::new(&self.weights)?,
            rng: StdRng::seed_from_u64(self.seed),
            finished: false,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn sources(&self) -> &[Arc<dyn SampleSource>] {
        &self.sources
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl SampleSource for CombinedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream_for(&self, worker: WorkerInfo) -> Result<Box<dyn SampleStream>> {
        Ok(Box::new(self.spawn_for(worker)?))
    }
}

impl std::fmt::Debug for CombinedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("CombinedSource")
            .field("name", &self.name)
            .field("sources", &names)
            .field("weights", &self.weights)
            .field("seed", &self.seed)
            .finish()
    }
}

/// Iterator that pulls each sample from one randomly chosen child.
///
/// Children that are not chosen are not touched. When the chosen child ends
/// or fails, the combined stream ends or fails with it; no other child is
/// tried in its place.
pub struct CombinedIterator {
    name: String,
    streams: Vec<Box<dyn SampleStream>>,
    selector: WeightedSelector,
    rng: StdRng,
    finished: bool,
}

impl CombinedIterator {
    /// Number of child streams.
    pub fn num_children(&self) -> usize {
        self.streams.len()
    }
}

impl Iterator for CombinedIterator {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let idx = self.selector.select(&mut self.rng);
        tracing::trace!(source = %self.name, child = idx, "selected child stream");

        let item = self.streams[idx].next();
        match &item {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(source = %self.name, child = idx, error = %e, "child stream failed");
                self.finished = true;
            }
            None => {
                tracing::debug!(source = %self.name, child = idx, "child stream ended");
                self.finished = true;
            }
        }
        item
    }
}

impl std::iter::FusedIterator for CombinedIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Endless stream of `[value]`.
    struct Constant {
        name: String,
        value: i64,
    }

    impl SampleSource for Constant {
        fn name(&self) -> &str {
            &self.name
        }

        fn stream_for(&self, _worker: WorkerInfo) -> Result<Box<dyn SampleStream>> {
            let value = self.value;
            Ok(Box::new(std::iter::repeat_with(move || {
                Ok::<Sample, DataError>(vec![value])
            })))
        }
    }

    /// Stream of `[value]` that ends after `len` samples.
    struct Finite {
        value: i64,
        len: usize,
    }

    impl SampleSource for Finite {
        fn name(&self) -> &str {
            "finite"
        }

        fn stream_for(&self, _worker: WorkerInfo) -> Result<Box<dyn SampleStream>> {
            let value = self.value;
            Ok(Box::new(
                (0..self.len).map(move |_| Ok::<Sample, DataError>(vec![value])),
            ))
        }
    }

    fn constant(value: i64) -> Arc<dyn SampleSource> {
        Arc::new(Constant {
            name: format!("const-{value}"),
            value,
        })
    }

    fn draw(iter: &mut CombinedIterator, n: usize) -> Vec<i64> {
        iter.by_ref().take(n).map(|r| r.unwrap()[0]).collect()
    }

    #[test]
    fn test_validate_weights() {
        assert!(validate_weights(&[1.0, 2.0]).is_ok());
        assert!(validate_weights(&[1.0, 0.0]).is_ok());
        assert!(validate_weights(&[]).is_err());
        assert!(validate_weights(&[0.0, 0.0]).is_err());
        assert!(validate_weights(&[1.0, -0.5]).is_err());
        assert!(validate_weights(&[f64::NAN]).is_err());
        assert!(validate_weights(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn test_select_is_pure_in_generator() {
        let weights = [0.2, 0.3, 0.5];

        let run = |seed: u64| -> Vec<usize> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50).map(|_| select(&weights, &mut rng).unwrap()).collect()
        };

        assert_eq!(run(11), run(11));
        assert!(run(11).iter().all(|&i| i < 3));
    }

    #[test]
    fn test_select_even_weights_seed_42() {
        let mut rng = StdRng::seed_from_u64(42);
        let picks: Vec<usize> = (0..8).map(|_| select(&[0.5, 0.5], &mut rng).unwrap()).collect();
        assert_eq!(picks, vec![1, 1, 1, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_select_zero_weight_never_chosen() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..1000 {
            assert_eq!(select(&[0.0, 1.0, 0.0], &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_select_rejects_bad_weights() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select(&[], &mut rng).is_err());
        assert!(select(&[0.0], &mut rng).is_err());
    }

    #[test]
    fn test_weight_one_zero_reads_first_source_only() {
        let combined =
            CombinedSource::new("mix", vec![constant(0), constant(1)], Some(vec![1.0, 0.0]), 42)
                .unwrap();
        let mut iter = combined.spawn().unwrap();
        assert!(draw(&mut iter, 500).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_fixed_seed_gives_fixed_interleaving() {
        let combined = CombinedSource::new(
            "mix",
            vec![constant(0), constant(1)],
            Some(vec![0.5, 0.5]),
            42,
        )
        .unwrap();

        let a = draw(&mut combined.spawn().unwrap(), 200);
        let b = draw(&mut combined.spawn().unwrap(), 200);
        assert_eq!(a, b);
        // StdRng(42) stream; changes only if the generator or sampling changes
        assert_eq!(a[..8], [1, 1, 1, 0, 0, 0, 1, 1]);
        assert!(a.contains(&0));
        assert!(a.contains(&1));

        let other = CombinedSource::new(
            "mix",
            vec![constant(0), constant(1)],
            Some(vec![0.5, 0.5]),
            43,
        )
        .unwrap();
        assert_ne!(a, draw(&mut other.spawn().unwrap(), 200));
    }

    #[test]
    fn test_default_weights_are_uniform() {
        let combined =
            CombinedSource::new("mix", vec![constant(0), constant(1), constant(2)], None, 7)
                .unwrap();
        assert_eq!(combined.weights().len(), 3);
        assert!(combined
            .weights()
            .iter()
            .all(|&w| (w - 1.0 / 3.0).abs() < 1e-12));

        let mut counts = [0usize; 3];
        for v in draw(&mut combined.spawn().unwrap(), 3000) {
            counts[v as usize] += 1;
        }
        for count in counts {
            assert!(count > 800, "counts {counts:?} are not roughly uniform");
        }
    }

    #[test]
    fn test_child_end_propagates() {
        let finite: Arc<dyn SampleSource> = Arc::new(Finite { value: 9, len: 3 });
        let combined = CombinedSource::new("mix", vec![finite], None, 0).unwrap();
        let mut iter = combined.spawn().unwrap();

        assert_eq!(draw(&mut iter, 10), vec![9, 9, 9]);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_child_end_ends_combined_stream() {
        let finite: Arc<dyn SampleSource> = Arc::new(Finite { value: 9, len: 2 });
        let combined =
            CombinedSource::new("mix", vec![finite, constant(1)], Some(vec![1.0, 1.0]), 5)
                .unwrap();
        let mut iter = combined.spawn().unwrap();

        // Ends on the first draw that lands on the exhausted child
        let drawn = draw(&mut iter, 10_000);
        assert!(drawn.len() < 10_000);
        assert_eq!(drawn.iter().filter(|&&v| v == 9).count(), 2);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_new_rejects_bad_inputs() {
        assert!(CombinedSource::new("mix", vec![], None, 0).is_err());
        assert!(CombinedSource::new("mix", vec![constant(0)], Some(vec![1.0, 1.0]), 0).is_err());
        assert!(CombinedSource::new("mix", vec![constant(0)], Some(vec![0.0]), 0).is_err());
    }

    #[test]
    fn test_combinators_nest() {
        let inner: Arc<dyn SampleSource> = Arc::new(
            CombinedSource::new("inner", vec![constant(1), constant(2)], None, 1).unwrap(),
        );
        let outer =
            CombinedSource::new("outer", vec![constant(0), inner], Some(vec![0.0, 1.0]), 2)
                .unwrap();

        let drawn = draw(&mut outer.spawn().unwrap(), 200);
        assert!(drawn.iter().all(|&v| v == 1 || v == 2));
        assert_eq!(outer.stream().unwrap().take(5).count(), 5);
    }
}
