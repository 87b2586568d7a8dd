//! Row-major Cartesian product over index ranges.

/// Enumerate every index tuple for axes of the given sizes.
///
/// The first axis varies slowest and the last fastest. An empty `sizes` yields a
/// single empty tuple; any zero-sized axis yields nothing.
pub fn index_tuples(sizes: &[usize]) -> Vec<Vec<usize>> {
    if sizes.contains(&0) {
        return Vec::new();
    }
    let mut tuples = Vec::with_capacity(sizes.iter().product());
    let mut current = vec![0usize; sizes.len()];
    loop {
        tuples.push(current.clone());
        // Advance like an odometer, last axis first.
        let mut axis = sizes.len();
        loop {
            if axis == 0 {
                return tuples;
            }
            axis -= 1;
            current[axis] += 1;
            if current[axis] < sizes[axis] {
                break;
            }
            current[axis] = 0;
        }
    }
}

/// Expected tuple count, or `None` on overflow.
pub fn tuple_count(sizes: &[usize]) -> Option<usize> {
    sizes.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}
