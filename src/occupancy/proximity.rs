use super::Point;

/// Returns true when `candidate` lies strictly closer than `threshold` to any
/// point in `reference`.
///
/// An empty reference set never matches. Cost is linear in the reference set.
pub fn matches<'a, I>(candidate: Point, reference: I, threshold: f64) -> bool
where
    I: IntoIterator<Item = &'a Point>,
{
    reference
        .into_iter()
        .any(|known| candidate.distance(known) < threshold)
}
