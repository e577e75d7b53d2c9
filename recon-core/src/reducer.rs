//! Reducers: pure projections of the next cached value.

use crate::action::Action;

/// Pure function computing the next cached value from the current one.
///
/// Reducers never see the cache itself, only plain values, and must return
/// synchronously. A reducer receiving a tag it does not handle should hand
/// back a clone of `current` rather than panic.
///
/// Any `Fn(&V, &Action<P>, Option<&X>) -> V` is a reducer.
pub trait Reducer<V, P, X = ()>: Send + Sync {
    fn reduce(&self, current: &V, action: &Action<P>, extra: Option<&X>) -> V;
}

impl<V, P, X, F> Reducer<V, P, X> for F
where
    F: Fn(&V, &Action<P>, Option<&X>) -> V + Send + Sync,
{
    fn reduce(&self, current: &V, action: &Action<P>, extra: Option<&X>) -> V {
        self(current, action, extra)
    }
}
