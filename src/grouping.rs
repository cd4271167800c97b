use log::info;

use crate::error::HeatplotError;
use crate::matrix::SignalMatrix;

/// Groups holding less than this fraction of all regions are merged with
/// their neighbours, otherwise visualization is impaired.
pub const MERGE_THRESHOLD_FRACTION: f64 = 0.01;

/// Below this fraction a group's row band drops under one pixel and the
/// figure cannot be drawn at all.
pub const MIN_PLOTTABLE_FRACTION: f64 = 5.0 / 1000.0;

/// Merge runs of consecutive undersized groups into combined groups.
///
/// Groups are scanned in order; consecutive groups below 1% of the total
/// region count accumulate into a pending run. A group at/above the
/// threshold flushes the pending run as one combined group (space-joined
/// label) and stays standalone itself. A run still pending at the end of
/// the scan is flushed the same way, so a trailing (or sole) undersized
/// group survives as its own output group.
pub fn merge_small_groups(matrix: &mut SignalMatrix) {
    let sizes = matrix.group_sizes();
    let total: usize = sizes.iter().sum();
    let threshold = total as f64 * MERGE_THRESHOLD_FRACTION;
    let labels = matrix.group_labels().to_vec();

    let mut boundaries = vec![0usize];
    let mut merged_labels: Vec<String> = Vec::new();
    let mut pending: Vec<usize> = Vec::new();

    let flush = |pending: &mut Vec<usize>,
                     boundaries: &mut Vec<usize>,
                     merged_labels: &mut Vec<String>| {
        if pending.is_empty() {
            return;
        }
        let size: usize = pending.iter().map(|&i| sizes[i]).sum();
        let label = pending
            .iter()
            .map(|&i| labels[i].as_str())
            .collect::<Vec<_>>()
            .join(" ");
        boundaries.push(boundaries.last().unwrap() + size);
        merged_labels.push(label);
        pending.clear();
    };

    for (i, &size) in sizes.iter().enumerate() {
        if (size as f64) > threshold {
            flush(&mut pending, &mut boundaries, &mut merged_labels);
            boundaries.push(boundaries.last().unwrap() + size);
            merged_labels.push(labels[i].clone());
        } else {
            pending.push(i);
        }
    }
    flush(&mut pending, &mut boundaries, &mut merged_labels);

    if merged_labels.len() < labels.len() {
        info!(
            "merged {} undersized groups into {} groups",
            labels.len(),
            merged_labels.len()
        );
        // consecutive groups merge in place, so only the partition changes
        matrix
            .set_grouping(boundaries, merged_labels)
            .expect("merged boundaries must still partition the matrix");
    }
}

/// Abort rendering when any group would occupy a sub-pixel row band.
pub fn check_plottable(matrix: &SignalMatrix) -> Result<(), HeatplotError> {
    let total = matrix.total_regions();
    for (size, label) in matrix.group_sizes().iter().zip(matrix.group_labels()) {
        if (*size as f64) / (total as f64) < MIN_PLOTTABLE_FRACTION {
            return Err(HeatplotError::DegenerateGroup {
                label: label.clone(),
                size: *size,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixParameters, Region, SignalMatrix};
    use ndarray::Array2;

    fn matrix_with_groups(sizes: &[usize]) -> SignalMatrix {
        let total: usize = sizes.iter().sum();
        let values = Array2::from_elem((total, 2), 1.0);
        let regions = (0..total)
            .map(|i| Region {
                chrom: "chr1".to_string(),
                start: i as u64 * 100,
                end: i as u64 * 100 + 50,
                name: format!("r{}", i),
                score: ".".to_string(),
                strand: "+".to_string(),
            })
            .collect();
        let mut boundaries = vec![0usize];
        for s in sizes {
            boundaries.push(boundaries.last().unwrap() + s);
        }
        let labels = (1..=sizes.len()).map(|i| format!("g{}", i)).collect();
        SignalMatrix::from_parts(
            values,
            regions,
            boundaries,
            labels,
            vec![0, 2],
            vec!["s1".to_string()],
            MatrixParameters {
                upstream: 10.0,
                downstream: 10.0,
                body: 0.0,
                bin_size: 10.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn groups_above_threshold_stay_untouched() {
        // 100 and 5 of 105 regions: 5 is 4.8%, above the 1% threshold
        let mut m = matrix_with_groups(&[100, 5]);
        merge_small_groups(&mut m);
        assert_eq!(m.group_sizes(), vec![100, 5]);
        assert_eq!(m.group_labels(), &["g1".to_string(), "g2".to_string()]);
    }

    #[test]
    fn consecutive_small_groups_merge() {
        // 1, 1, 198 of 200: the two 0.5% groups merge into one of size 2
        let mut m = matrix_with_groups(&[1, 1, 198]);
        merge_small_groups(&mut m);
        assert_eq!(m.group_sizes(), vec![2, 198]);
        assert_eq!(m.group_labels()[0], "g1 g2");
        assert_eq!(m.group_labels()[1], "g3");
    }

    #[test]
    fn trailing_small_run_is_flushed() {
        let mut m = matrix_with_groups(&[196, 2, 2]);
        merge_small_groups(&mut m);
        assert_eq!(m.group_sizes(), vec![196, 4]);
        assert_eq!(m.group_labels()[1], "g2 g3");
    }

    #[test]
    fn all_small_groups_collapse_into_one() {
        // every group below threshold: the merge exhausts all groups
        let mut m = matrix_with_groups(&[1, 1, 1, 1]);
        // total 4, threshold 0.04: all pending, one final flush
        merge_small_groups(&mut m);
        assert_eq!(m.group_sizes(), vec![4]);
        assert_eq!(m.group_labels()[0], "g1 g2 g3 g4");
    }

    #[test]
    fn no_two_consecutive_outputs_below_threshold() {
        let mut m = matrix_with_groups(&[1, 1, 50, 1, 1, 46]);
        merge_small_groups(&mut m);
        let total: usize = m.group_sizes().iter().sum();
        let threshold = total as f64 * MERGE_THRESHOLD_FRACTION;
        let below: Vec<bool> = m
            .group_sizes()
            .iter()
            .map(|&s| (s as f64) < threshold)
            .collect();
        assert!(!below.windows(2).any(|w| w[0] && w[1]));
    }

    #[test]
    fn degenerate_group_aborts() {
        let m = matrix_with_groups(&[1, 999]);
        let err = check_plottable(&m).unwrap_err();
        match err {
            HeatplotError::DegenerateGroup { label, size } => {
                assert_eq!(label, "g1");
                assert_eq!(size, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn plottable_groups_pass() {
        let m = matrix_with_groups(&[100, 5]);
        assert!(check_plottable(&m).is_ok());
    }
}
