use std::iter::FusedIterator;

use tracing::debug;

use crate::TlmError;

// Reciprocals this close (relative) to an integer are snapped to it before
// truncation, so 0.01 s spacing reads as 100 Hz rather than 99.
const RATE_SNAP_TOLERANCE: f64 = 1e-6;

/// Estimate the logging rate in Hz from a time channel, assuming uniform
/// sampling. The rate is truncated towards zero.
pub fn estimate_sample_rate(time: &[f64]) -> Result<u32, TlmError> {
    if time.len() < 2 {
        return Err(TlmError::InsufficientData);
    }
    let total: f64 = time.windows(2).map(|w| w[1] - w[0]).sum();
    let mean_delta = total / (time.len() - 1) as f64;
    if !mean_delta.is_finite() || mean_delta <= 0.0 {
        return Err(TlmError::InvalidInput(format!(
            "time channel does not advance (mean step {})",
            mean_delta
        )));
    }

    let rate = 1.0 / mean_delta;
    let nearest = rate.round();
    let rate = if (rate - nearest).abs() <= RATE_SNAP_TOLERANCE * nearest.max(1.0) {
        nearest
    } else {
        rate.trunc()
    };
    if rate > u32::MAX as f64 {
        return Err(TlmError::InvalidInput(format!(
            "time step {} implies an unrepresentable rate",
            mean_delta
        )));
    }
    debug!(samples = time.len(), mean_delta, rate, "estimated sample rate");
    Ok(rate as u32)
}

/// Iterator adapter yielding `(prev, current, next)` for every element.
///
/// The first element's `prev` and the last element's `next` are
/// `T::default()` (`0.0` for floating-point channels).
#[derive(Clone, Debug)]
pub struct WithNeighbors<I: Iterator> {
    inner: I,
    prev: I::Item,
    current: Option<I::Item>,
}

pub fn with_neighbors<I>(iterable: I) -> WithNeighbors<I::IntoIter>
where
    I: IntoIterator,
    I::Item: Clone + Default,
{
    let mut inner = iterable.into_iter();
    let current = inner.next();
    WithNeighbors {
        inner,
        prev: Default::default(),
        current,
    }
}

impl<I> Iterator for WithNeighbors<I>
where
    I: Iterator,
    I::Item: Clone + Default,
{
    type Item = (I::Item, I::Item, I::Item);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        self.current = self.inner.next();
        let next = self.current.clone().unwrap_or_default();
        let prev = std::mem::replace(&mut self.prev, current.clone());
        Some((prev, current, next))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = usize::from(self.current.is_some());
        let (lower, upper) = self.inner.size_hint();
        (
            lower.saturating_add(pending),
            upper.and_then(|u| u.checked_add(pending)),
        )
    }
}

impl<I> FusedIterator for WithNeighbors<I>
where
    I: FusedIterator,
    I::Item: Clone + Default,
{
}

impl<I> ExactSizeIterator for WithNeighbors<I>
where
    I: ExactSizeIterator,
    I::Item: Clone + Default,
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_100hz() {
        let time: Vec<f64> = (0..500).map(|i| i as f64 * 0.01).collect();
        assert_eq!(estimate_sample_rate(&time).unwrap(), 100);
    }

    #[test]
    fn test_sample_rate_with_offset_start() {
        let time: Vec<f64> = (0..64).map(|i| 1_000.0 + i as f64 * 0.04).collect();
        assert_eq!(estimate_sample_rate(&time).unwrap(), 25);
    }

    #[test]
    fn test_sample_rate_truncates() {
        // mean step 0.3 s -> 3.33 Hz
        assert_eq!(estimate_sample_rate(&[0.0, 0.3, 0.6, 0.9]).unwrap(), 3);
        // 0.75 s -> 1.33 Hz
        assert_eq!(estimate_sample_rate(&[0.0, 0.5, 1.5]).unwrap(), 1);
    }

    #[test]
    fn test_sample_rate_errors() {
        assert!(matches!(
            estimate_sample_rate(&[1.0]),
            Err(TlmError::InsufficientData)
        ));
        assert!(matches!(
            estimate_sample_rate(&[2.0, 2.0, 2.0]),
            Err(TlmError::InvalidInput(_))
        ));
        assert!(matches!(
            estimate_sample_rate(&[2.0, 1.0]),
            Err(TlmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_neighbors_of_three() {
        let triplets: Vec<_> = with_neighbors(vec![1.0, 2.0, 3.0]).collect();
        assert_eq!(
            triplets,
            vec![(0.0, 1.0, 2.0), (1.0, 2.0, 3.0), (2.0, 3.0, 0.0)]
        );
    }

    #[test]
    fn test_neighbors_of_single_and_empty() {
        let single: Vec<_> = with_neighbors([5.5]).collect();
        assert_eq!(single, vec![(0.0, 5.5, 0.0)]);
        assert_eq!(with_neighbors(Vec::<f64>::new()).next(), None);
    }

    #[test]
    fn test_neighbors_is_lazy_and_sized() {
        let mut pulled = 0;
        let source = (0..4).map(|i| {
            pulled += 1;
            i as f64
        });
        let mut iter = with_neighbors(source);
        assert_eq!(iter.next(), Some((0.0, 0.0, 1.0)));
        drop(iter);
        assert_eq!(pulled, 2);

        let iter = with_neighbors(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(iter.len(), 4);
    }
}
