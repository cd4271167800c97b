use clap::{Parser, ValueEnum};
use log::warn;
use std::path::PathBuf;

use crate::colormap::{self, Colormap};
use crate::error::HeatplotError;
use crate::matrix::{SortCriterion, SortMethod};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "heatplot",
    version = env!("CARGO_PKG_VERSION"),
    about = "Create a heatmap for scores associated to genomic regions, \
             from a precomputed signal matrix.",
    after_help = "An example usage is: heatplot -m matrix.gz -o heatmap.png"
)]
pub struct Args {
    /// Matrix file produced by the upstream aggregation step.
    #[arg(short = 'm', long = "matrix-file", value_name = "FILE")]
    pub matrix_file: PathBuf,

    /// Output figure file; the format is taken from the extension (.png or .svg).
    #[arg(short = 'o', long = "out-file-name", value_name = "FILE")]
    pub out_file_name: PathBuf,

    /// File format of the figure, overriding the extension.
    #[arg(long = "plot-file-format", value_name = "FORMAT")]
    pub plot_file_format: Option<ImageFormat>,

    /// Save the regions after clustering/sorting to this BED file.
    #[arg(long = "out-file-sorted-regions", value_name = "FILE")]
    pub out_file_sorted_regions: Option<PathBuf>,

    /// Save the underlying matrix values to this tab-separated file.
    #[arg(long = "out-file-name-matrix", value_name = "FILE")]
    pub out_file_name_matrix: Option<PathBuf>,

    /// Re-group the regions into this many clusters using k-means.
    #[arg(long, value_name = "K", conflicts_with = "hclust")]
    pub kmeans: Option<usize>,

    /// Re-group the regions using hierarchical clustering (slow for large
    /// matrices).
    #[arg(long, value_name = "K")]
    pub hclust: Option<usize>,

    /// Whether the regions are re-sorted before plotting.
    #[arg(long = "sort-regions", value_enum, default_value_t = SortMethod::Descend)]
    pub sort_regions: SortMethod,

    /// Statistic used for sorting.
    #[arg(long = "sort-using", value_enum, default_value_t = SortCriterion::Mean)]
    pub sort_using: SortCriterion,

    /// Named color map for the heatmap.
    #[arg(long = "color-map", default_value = "RdYlBu")]
    pub color_map: String,

    /// Explicit ordered color list; overrides --color-map when given.
    #[arg(long = "color-list", num_args = 2.., value_name = "COLOR")]
    pub color_list: Vec<String>,

    /// Number of discrete colors when --color-list is used.
    #[arg(long = "color-number", default_value_t = 256)]
    pub color_number: usize,

    /// Color used for missing (nan) cells.
    #[arg(long = "missing-data-color", default_value = "black")]
    pub missing_data_color: String,

    /// Minimum of the color scale; derived from the 1st percentile if absent.
    #[arg(long = "z-min", allow_negative_numbers = true)]
    pub z_min: Option<f64>,

    /// Maximum of the color scale; derived from the 98th percentile if absent.
    #[arg(long = "z-max", allow_negative_numbers = true)]
    pub z_max: Option<f64>,

    /// Minimum of the summary-profile y axis.
    #[arg(long = "y-min", allow_negative_numbers = true)]
    pub y_min: Option<f64>,

    /// Maximum of the summary-profile y axis.
    #[arg(long = "y-max", allow_negative_numbers = true)]
    pub y_max: Option<f64>,

    /// Statistic drawn by the summary profile.
    #[arg(long = "average-type", value_enum, default_value_t = AverageType::Median)]
    pub average_type: AverageType,

    /// Title written above the figure.
    #[arg(long = "plot-title", default_value = "")]
    pub plot_title: String,

    /// Label under the bottom heatmap axis.
    #[arg(long = "x-axis-label", default_value = "gene distance (bp)")]
    pub x_axis_label: String,

    /// Label of the summary-profile y axis.
    #[arg(long = "y-axis-label", default_value = "")]
    pub y_axis_label: String,

    /// Label of the reference point (reference-point mode).
    #[arg(long = "ref-point-label", default_value = "TSS")]
    pub ref_point_label: String,

    /// Label of the region start boundary (scaled-region mode).
    #[arg(long = "start-label", default_value = "TSS")]
    pub start_label: String,

    /// Label of the region end boundary (scaled-region mode).
    #[arg(long = "end-label", default_value = "TES")]
    pub end_label: String,

    /// Width of each heatmap panel, in display units.
    #[arg(long = "heatmap-width", default_value_t = 7.5)]
    pub heatmap_width: f64,

    /// Height of the heatmap block, in display units; values outside
    /// (3, 100] fall back to the default.
    #[arg(long = "heatmap-height", default_value_t = 25.0)]
    pub heatmap_height: f64,

    /// Arrange panels per group (samples on rows) instead of per sample.
    #[arg(long = "per-group")]
    pub per_group: bool,

    /// Which panels make up the figure.
    #[arg(long = "what-to-show", value_enum, default_value_t = WhatToShow::Full)]
    pub what_to_show: WhatToShow,

    /// Style of the summary-profile lines.
    #[arg(long = "plot-type", value_enum, default_value_t = PlotType::Simple)]
    pub plot_type: PlotType,

    /// Placement of the profile legend.
    #[arg(long = "legend-location", value_enum, default_value_t = LegendLocation::UpperLeft)]
    pub legend_location: LegendLocation,

    /// Override the group labels (one per group).
    #[arg(long = "group-labels", num_args = 1.., value_name = "LABEL")]
    pub group_labels: Vec<String>,

    /// Override the sample labels (one per sample).
    #[arg(long = "sample-labels", num_args = 1.., value_name = "LABEL")]
    pub sample_labels: Vec<String>,

    /// Increase verbosity (-v: info, -vv: debug).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageFormat {
    Png,
    Svg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WhatToShow {
    /// Heatmap panels only.
    HeatmapOnly,
    /// Summary profile above the heatmap panels.
    PlotAndHeatmap,
    /// Heatmap panels plus the shared colorbar.
    HeatmapAndColorbar,
    /// Profile, heatmap panels and colorbar.
    Full,
}

impl WhatToShow {
    pub fn show_profile(&self) -> bool {
        matches!(self, WhatToShow::PlotAndHeatmap | WhatToShow::Full)
    }

    pub fn show_colorbar(&self) -> bool {
        matches!(self, WhatToShow::HeatmapAndColorbar | WhatToShow::Full)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AverageType {
    Mean,
    Median,
    Min,
    Max,
    Std,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlotType {
    Simple,
    Fill,
    Std,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LegendLocation {
    Best,
    UpperLeft,
    UpperCenter,
    UpperRight,
    CenterLeft,
    Center,
    CenterRight,
    LowerLeft,
    LowerCenter,
    LowerRight,
    None,
}

const DEFAULT_HEATMAP_HEIGHT: f64 = 10.0;

/// Immutable rendering configuration, built once from the raw arguments and
/// passed by reference to every component.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub color_map: Colormap,
    pub missing_data_color: (u8, u8, u8),
    pub z_min: Option<f64>,
    pub z_max: Option<f64>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub average_type: AverageType,
    pub plot_title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    pub ref_point_label: String,
    pub start_label: String,
    pub end_label: String,
    pub heatmap_width: f64,
    pub heatmap_height: f64,
    pub per_group: bool,
    pub what_to_show: WhatToShow,
    pub plot_type: PlotType,
    pub legend_location: LegendLocation,
    pub out_file: PathBuf,
    pub format: ImageFormat,
}

impl PlotConfig {
    pub fn from_args(args: &Args) -> Result<PlotConfig, HeatplotError> {
        let color_map = if args.color_list.is_empty() {
            Colormap::from_name(&args.color_map)?
        } else {
            Colormap::from_list(&args.color_list, args.color_number)?
        };
        let missing_data_color = colormap::parse_color(&args.missing_data_color)?;

        if args.heatmap_width <= 0.0 {
            return Err(HeatplotError::Config(format!(
                "--heatmap-width must be positive, got {}",
                args.heatmap_width
            )));
        }
        let heatmap_height =
            if args.heatmap_height > 3.0 && args.heatmap_height <= 100.0 {
                args.heatmap_height
            } else {
                warn!(
                    "--heatmap-height {} is outside (3, 100], using {}",
                    args.heatmap_height, DEFAULT_HEATMAP_HEIGHT
                );
                DEFAULT_HEATMAP_HEIGHT
            };

        let format = match args.plot_file_format {
            Some(f) => f,
            None => match args
                .out_file_name
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .as_deref()
            {
                Some("png") => ImageFormat::Png,
                Some("svg") => ImageFormat::Svg,
                Some(other) => {
                    return Err(HeatplotError::Config(format!(
                        "unsupported figure format '{}'",
                        other
                    )))
                }
                None => ImageFormat::Png,
            },
        };

        Ok(PlotConfig {
            color_map,
            missing_data_color,
            z_min: args.z_min,
            z_max: args.z_max,
            y_min: args.y_min,
            y_max: args.y_max,
            average_type: args.average_type,
            plot_title: args.plot_title.clone(),
            x_axis_label: args.x_axis_label.clone(),
            y_axis_label: args.y_axis_label.clone(),
            ref_point_label: args.ref_point_label.clone(),
            start_label: args.start_label.clone(),
            end_label: args.end_label.clone(),
            heatmap_width: args.heatmap_width,
            heatmap_height,
            per_group: args.per_group,
            what_to_show: args.what_to_show,
            plot_type: args.plot_type,
            legend_location: args.legend_location,
            out_file: args.out_file_name.clone(),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn base_args() -> Args {
        Args::parse_from(["heatplot", "-m", "matrix.gz", "-o", "figure.png"])
    }

    #[test]
    fn arg_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn height_outside_range_falls_back() {
        let mut args = base_args();
        args.heatmap_height = 2.0;
        let cfg = PlotConfig::from_args(&args).unwrap();
        assert!((cfg.heatmap_height - DEFAULT_HEATMAP_HEIGHT).abs() < 1e-9);

        args.heatmap_height = 101.0;
        let cfg = PlotConfig::from_args(&args).unwrap();
        assert!((cfg.heatmap_height - DEFAULT_HEATMAP_HEIGHT).abs() < 1e-9);

        args.heatmap_height = 50.0;
        let cfg = PlotConfig::from_args(&args).unwrap();
        assert!((cfg.heatmap_height - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bad_missing_color_is_rejected_before_reading_data() {
        let mut args = base_args();
        args.missing_data_color = "nocolor".to_string();
        assert!(matches!(
            PlotConfig::from_args(&args),
            Err(HeatplotError::Config(_))
        ));
    }

    #[test]
    fn format_follows_extension() {
        let mut args = base_args();
        args.out_file_name = PathBuf::from("figure.svg");
        assert_eq!(PlotConfig::from_args(&args).unwrap().format, ImageFormat::Svg);

        args.out_file_name = PathBuf::from("figure.bmp");
        assert!(PlotConfig::from_args(&args).is_err());

        args.out_file_name = PathBuf::from("figure.bmp");
        args.plot_file_format = Some(ImageFormat::Png);
        assert_eq!(PlotConfig::from_args(&args).unwrap().format, ImageFormat::Png);
    }

    #[test]
    fn what_to_show_flags() {
        assert!(WhatToShow::Full.show_profile() && WhatToShow::Full.show_colorbar());
        assert!(WhatToShow::PlotAndHeatmap.show_profile());
        assert!(!WhatToShow::PlotAndHeatmap.show_colorbar());
        assert!(WhatToShow::HeatmapAndColorbar.show_colorbar());
        assert!(!WhatToShow::HeatmapOnly.show_profile());
        assert!(!WhatToShow::HeatmapOnly.show_colorbar());
    }
}
