use std::error::Error;
use std::process::exit;

use clap::Parser;
use log::{info, warn};

use heatplot::args::{Args, PlotConfig};
use heatplot::cluster::ClusterMethod;
use heatplot::matrix::{SignalMatrix, SortMethod};
use heatplot::{grouping, output, plot, scaling};

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    // configuration errors abort before any data is read
    let cfg = PlotConfig::from_args(args)?;

    let mut hm = SignalMatrix::from_file(&args.matrix_file)?;
    info!(
        "loaded matrix: {} regions, {} groups, {} samples",
        hm.total_regions(),
        hm.num_groups(),
        hm.num_samples()
    );

    if let Some(k) = args.kmeans {
        hm.recluster(k, ClusterMethod::Kmeans)?;
    } else if let Some(k) = args.hclust {
        info!("performing hierarchical clustering; this may be slow for large matrices");
        hm.recluster(k, ClusterMethod::Hierarchical)?;
    }

    grouping::merge_small_groups(&mut hm);

    if let Err(e) = grouping::check_plottable(&hm) {
        // hand the user their clustering result even though the figure
        // cannot be drawn
        if let Some(path) = &args.out_file_sorted_regions {
            output::save_bed(&hm, path)?;
            info!("clustered regions written to {}", path.display());
        } else {
            warn!(
                "no output file defined for sorted regions; re-run with \
                 --out-file-sorted-regions to keep the clustered output"
            );
        }
        return Err(e.into());
    }

    if !args.group_labels.is_empty() {
        hm.set_group_labels(args.group_labels.clone())?;
    }
    if !args.sample_labels.is_empty() {
        hm.set_sample_labels(args.sample_labels.clone())?;
    }

    if args.sort_regions != SortMethod::No {
        hm.sort_groups(args.sort_using, args.sort_regions);
    }

    if let Some(path) = &args.out_file_name_matrix {
        output::save_matrix_values(&hm, path)?;
    }
    if let Some(path) = &args.out_file_sorted_regions {
        output::save_bed(&hm, path)?;
    }

    let bounds = scaling::derive_bounds(hm.values(), cfg.z_min, cfg.z_max);
    plot::plot_matrix(&hm, &cfg, bounds)?;
    info!("figure written to {}", cfg.out_file.display());

    Ok(())
}
