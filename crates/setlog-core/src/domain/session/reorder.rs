//! Pointer bookkeeping for roster reordering

/// Where `current` ends up after the item at `from` moves to final index `to`
///
/// `to` is the index the moved item occupies afterwards (remove, then
/// insert). The pointer keeps following the same item.
pub fn translate_index(current: usize, from: usize, to: usize) -> usize {
    if from == current {
        to
    } else if from < current && current <= to {
        current - 1
    } else if to <= current && current < from {
        current + 1
    } else {
        current
    }
}
