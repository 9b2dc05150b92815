//! Even decimation of buffered stack samples.

/// Reduce `items` to at most `target` entries, keeping them evenly spread.
///
/// With `target >= 2` the first and last entries always survive and the
/// kept indices are `round(i * (len - 1) / (target - 1))`. With `target == 1`
/// only the first entry is kept.
pub fn decimate<T>(items: &mut Vec<T>, target: usize) {
    let len = items.len();
    if len <= target {
        return;
    }
    if target == 0 {
        items.clear();
        return;
    }
    if target == 1 {
        items.truncate(1);
        return;
    }

    let span = (len - 1) as f64;
    let steps = (target - 1) as f64;

    let mut keep = vec![false; len];
    for i in 0..target {
        let index = ((i as f64) * span / steps).round() as usize;
        keep[index.min(len - 1)] = true;
    }

    let mut flags = keep.into_iter();
    items.retain(|_| flags.next().unwrap_or(false));
}
