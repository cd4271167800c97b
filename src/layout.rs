use crate::error::HeatplotError;

/// Width of the colorbar column, in display units.
pub const COLORBAR_WIDTH: f64 = 1.0 / 2.54;

/// Which matrix dimension runs along the panel grid's rows.
///
/// The base orientation puts groups on rows and samples on columns; the
/// inverted orientation swaps them. Every pass consults `cell` instead of
/// branching on an orientation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMode {
    GroupMajor,
    SampleMajor,
}

impl AxisMode {
    pub fn from_per_group(per_group: bool) -> AxisMode {
        if per_group {
            AxisMode::SampleMajor
        } else {
            AxisMode::GroupMajor
        }
    }

    /// Grid position of a (group, sample) pair, before the profile-row
    /// offset is applied.
    pub fn cell(&self, group: usize, sample: usize) -> (usize, usize) {
        match self {
            AxisMode::GroupMajor => (group, sample),
            AxisMode::SampleMajor => (sample, group),
        }
    }
}

/// Proportional grid of the composite figure. Ratios are in display units;
/// the renderer converts them to pixel breakpoints.
#[derive(Debug, Clone)]
pub struct GridDescriptor {
    pub rows: usize,
    pub cols: usize,
    pub height_ratios: Vec<f64>,
    pub width_ratios: Vec<f64>,
    pub show_profile: bool,
    pub show_colorbar: bool,
    pub axis: AxisMode,
}

impl GridDescriptor {
    /// Rows occupied by the summary plot and its spacer.
    pub fn heatmap_row_offset(&self) -> usize {
        if self.show_profile {
            2
        } else {
            0
        }
    }

    pub fn heatmap_cols(&self) -> usize {
        self.cols - usize::from(self.show_colorbar)
    }

    /// Grid cell of a heatmap panel, including the profile-row offset.
    pub fn panel_cell(&self, group: usize, sample: usize) -> (usize, usize) {
        let (row, col) = self.axis.cell(group, sample);
        (row + self.heatmap_row_offset(), col)
    }

    /// Interior column breakpoints in pixels, for a canvas `total_px` wide.
    pub fn col_breakpoints(&self, total_px: u32) -> Vec<i32> {
        breakpoints(&self.width_ratios, total_px)
    }

    /// Interior row breakpoints in pixels, for a canvas `total_px` tall.
    pub fn row_breakpoints(&self, total_px: u32) -> Vec<i32> {
        breakpoints(&self.height_ratios, total_px)
    }

    /// Canvas size in pixels for the given pixel density (px per display
    /// unit).
    pub fn canvas_size(&self, px_per_unit: f64) -> (u32, u32) {
        let w: f64 = self.width_ratios.iter().sum();
        let h: f64 = self.height_ratios.iter().sum();
        (
            (w * px_per_unit).round().max(1.0) as u32,
            (h * px_per_unit).round().max(1.0) as u32,
        )
    }
}

fn breakpoints(ratios: &[f64], total_px: u32) -> Vec<i32> {
    let sum: f64 = ratios.iter().sum();
    let mut acc = 0.0;
    ratios[..ratios.len() - 1]
        .iter()
        .map(|r| {
            acc += r;
            (acc / sum * total_px as f64).round() as i32
        })
        .collect()
}

/// Compute the proportional panel grid from the group cardinalities and the
/// feature flags.
pub fn build_grid(
    group_sizes: &[usize],
    n_samples: usize,
    heatmap_width: f64,
    heatmap_height: f64,
    show_profile: bool,
    show_colorbar: bool,
    axis: AxisMode,
) -> Result<GridDescriptor, HeatplotError> {
    let n_groups = group_sizes.len();
    let (heatmap_rows, heatmap_cols) = match axis {
        AxisMode::GroupMajor => (n_groups, n_samples),
        AxisMode::SampleMajor => (n_samples, n_groups),
    };

    // rows scale with group cardinality; under the inverted orientation
    // every row holds one full sample, weighted by the largest group
    let raw_heights: Vec<f64> = match axis {
        AxisMode::GroupMajor => group_sizes.iter().map(|&s| s as f64).collect(),
        AxisMode::SampleMajor => {
            let max = group_sizes.iter().copied().max().unwrap_or(0) as f64;
            vec![max; heatmap_rows]
        }
    };
    let total: f64 = raw_heights.iter().sum();
    let mut height_ratios: Vec<f64> = raw_heights
        .iter()
        .map(|h| heatmap_height * h / total)
        .collect();
    if height_ratios.iter().any(|r| !r.is_finite()) {
        return Err(HeatplotError::Layout(format!(
            "non-finite height ratios from group sizes {:?}",
            group_sizes
        )));
    }

    let mut width_ratios = vec![heatmap_width; heatmap_cols];
    let mut rows = heatmap_rows;
    let mut cols = heatmap_cols;

    if show_colorbar {
        cols += 1;
        width_ratios.push(COLORBAR_WIDTH);
    }
    if show_profile {
        // summary plot sized like the heatmap width, plus a thin spacer
        rows += 2;
        let mut with_profile = vec![heatmap_width, heatmap_width / 10.0];
        with_profile.extend(height_ratios);
        height_ratios = with_profile;
    }

    Ok(GridDescriptor {
        rows,
        cols,
        height_ratios,
        width_ratios,
        show_profile,
        show_colorbar,
        axis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_ratios_sum_to_heatmap_height() {
        let grid = build_grid(&[7, 3, 90], 2, 7.5, 25.0, false, false, AxisMode::GroupMajor)
            .unwrap();
        let sum: f64 = grid.height_ratios.iter().sum();
        assert!((sum - 25.0).abs() < 1e-9);
        // pairwise proportional to the group sizes
        assert!((grid.height_ratios[0] / grid.height_ratios[1] - 7.0 / 3.0).abs() < 1e-9);
        assert!((grid.height_ratios[2] / grid.height_ratios[0] - 90.0 / 7.0).abs() < 1e-9);
        assert_eq!(grid.width_ratios, vec![7.5, 7.5]);
    }

    #[test]
    fn sample_major_rows_share_the_largest_group() {
        let grid = build_grid(&[10, 40], 3, 7.5, 30.0, false, false, AxisMode::SampleMajor)
            .unwrap();
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.cols, 2);
        assert!((grid.height_ratios[0] - 10.0).abs() < 1e-9);
        assert!((grid.height_ratios[1] - 10.0).abs() < 1e-9);
        assert!((grid.height_ratios[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn profile_prepends_two_rows() {
        let grid =
            build_grid(&[100, 5], 1, 7.5, 25.0, true, true, AxisMode::GroupMajor).unwrap();
        assert_eq!(grid.rows, 4); // summary + spacer + 2 heatmap rows
        assert_eq!(grid.cols, 2); // 1 sample + colorbar
        assert!((grid.height_ratios[0] - 7.5).abs() < 1e-9);
        assert!((grid.height_ratios[1] - 0.75).abs() < 1e-9);
        assert!((grid.width_ratios[1] - COLORBAR_WIDTH).abs() < 1e-9);
        assert_eq!(grid.heatmap_row_offset(), 2);
        assert_eq!(grid.heatmap_cols(), 1);
    }

    #[test]
    fn cell_mapping_honors_orientation() {
        assert_eq!(AxisMode::GroupMajor.cell(2, 1), (2, 1));
        assert_eq!(AxisMode::SampleMajor.cell(2, 1), (1, 2));

        let grid =
            build_grid(&[10, 10], 2, 7.5, 25.0, true, false, AxisMode::GroupMajor).unwrap();
        assert_eq!(grid.panel_cell(0, 1), (2, 1));

        let inverted =
            build_grid(&[10, 10], 2, 7.5, 25.0, true, false, AxisMode::SampleMajor).unwrap();
        assert_eq!(inverted.panel_cell(0, 1), (3, 0));
    }

    #[test]
    fn zero_regions_is_a_layout_error() {
        let err =
            build_grid(&[0, 0], 1, 7.5, 25.0, false, false, AxisMode::GroupMajor).unwrap_err();
        assert!(matches!(err, HeatplotError::Layout(_)));
    }

    #[test]
    fn breakpoints_are_proportional() {
        let grid = build_grid(&[50, 50], 2, 7.5, 20.0, false, false, AxisMode::GroupMajor)
            .unwrap();
        assert_eq!(grid.row_breakpoints(100), vec![50]);
        assert_eq!(grid.col_breakpoints(300), vec![150]);
    }

    #[test]
    fn canvas_size_scales_with_density() {
        let grid = build_grid(&[10], 2, 7.5, 25.0, false, false, AxisMode::GroupMajor).unwrap();
        let (w, h) = grid.canvas_size(10.0);
        assert_eq!(w, 150);
        assert_eq!(h, 250);
    }
}
