// ---------------------------------------------------------------------------
// HT reliability: photomultiplier voltage above the threshold marks samples
// whose signal cannot be trusted.
// ---------------------------------------------------------------------------

/// Number of leading samples before HT first rises strictly above `ht_max`.
pub fn reliable_len(ht: &[f64], ht_max: f64) -> usize {
    ht.iter().position(|&v| v > ht_max).unwrap_or(ht.len())
}

/// Index of the last trustworthy sample in domain order.
///
/// * No sample exceeds `ht_max` → the last index.
/// * The first sample already exceeds it → `None`.
pub fn reliability_cutoff_index(ht: &[f64], ht_max: f64) -> Option<usize> {
    reliable_len(ht, ht_max).checked_sub(1)
}

/// Keep each signal value whose paired HT is at or below `ht_max`.
///
/// Unlike [`reliable_len`] this masks point-wise, which is what the
/// wavelength × temperature grids need.
pub fn mask_unreliable(signal: &[f64], ht: &[f64], ht_max: f64) -> Vec<Option<f64>> {
    signal
        .iter()
        .zip(ht)
        .map(|(&s, &h)| (h <= ht_max).then_some(s))
        .collect()
}
