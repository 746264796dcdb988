//! Command line merger resolving.
//!
//! Usage:
//!     resolve-mergers --graph-json-file <model> --result-json-file <result> \
//!         --label-image-pattern 'labels/frame_{t}.png' [--out-report report.json]
//!
//! Exit 0 on success, non-zero on error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;

use merger_resolver_rs::plugins::save_label_png;
use merger_resolver_rs::{
    load_model, load_result, KMeansConfig, KMeansMergerResolver, LoggingReporter,
    MergerResolvingPipeline, PluginRegistry, PngSequenceProvider, ResolveError, ResolverConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "resolve-mergers")]
#[command(about = "Split merged detections of a tracking result and re-link them")]
struct Args {
    /// Hypotheses graph JSON (needs `traxelToUniqueId`)
    #[arg(long)]
    graph_json_file: PathBuf,

    /// Tracking result JSON
    #[arg(long)]
    result_json_file: PathBuf,

    /// Label PNG path template, `{t}` is replaced by the timestep
    #[arg(long)]
    label_image_pattern: String,

    /// Raw PNG path template, `{t}` is replaced by the timestep
    #[arg(long)]
    raw_image_pattern: Option<String>,

    /// Pipeline configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the fallback transition energy
    #[arg(long)]
    fallback_energy: Option<f64>,

    /// Maximum k-means iterations of the merger resolver
    #[arg(long, default_value_t = 100)]
    kmeans_iterations: usize,

    /// Write the JSON report here
    #[arg(long)]
    out_report: Option<PathBuf>,

    /// Write the relabeled label images into this directory
    #[arg(long)]
    out_label_dir: Option<PathBuf>,

    /// Log every fitted merger and match
    #[arg(long)]
    verbose: bool,
}

fn io_error(path: &Path, e: impl ToString) -> ResolveError {
    ResolveError::Io {
        path: path.display().to_string(),
        description: e.to_string(),
    }
}

fn run(args: Args) -> Result<(), ResolveError> {
    let mut config = match &args.config {
        Some(path) => ResolverConfig::from_json_file(path)?,
        None => ResolverConfig::default(),
    };
    if let Some(energy) = args.fallback_energy {
        config = config.with_fallback_energy(energy);
    }
    let retain = config.retain_label_images || args.out_label_dir.is_some();
    config = config.with_retain_label_images(retain);

    let model = load_model(&args.graph_json_file)?;
    let result = load_result(&args.result_json_file)?;

    let mut provider = PngSequenceProvider::new(&args.label_image_pattern)
        .map_err(|e| ResolveError::plugin("PngSequence", "label image pattern", e))?;
    if let Some(raw) = &args.raw_image_pattern {
        provider = provider
            .with_raw_pattern(raw)
            .map_err(|e| ResolveError::plugin("PngSequence", "raw image pattern", e))?;
    }
    let first_timestep = model
        .traxel_to_unique_id
        .keys()
        .filter_map(|t| t.parse::<usize>().ok())
        .min();
    if let Some(first) = first_timestep {
        provider = provider.with_reference_timestep(first);
    }

    let kmeans = KMeansConfig {
        max_iterations: args.kmeans_iterations,
        ..KMeansConfig::default()
    };
    let registry =
        PluginRegistry::with_default_features(provider, KMeansMergerResolver::new(kmeans));

    let mut reporter = if args.verbose {
        LoggingReporter::verbose()
    } else {
        LoggingReporter::new()
    };

    let start = Instant::now();
    let output =
        MergerResolvingPipeline::new(config).run(&model, &result, &registry, &mut reporter)?;
    log::info!("Resolved in {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);

    if let Some(path) = &args.out_report {
        let json = serde_json::to_string_pretty(&output.report())
            .map_err(|e| io_error(path, e))?;
        fs::write(path, json).map_err(|e| io_error(path, e))?;
        log::info!("Wrote report to {}", path.display());
    }

    if let Some(dir) = &args.out_label_dir {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        for (t, labels) in &output.label_images {
            let path = dir.join(format!("labels_{}.png", t));
            save_label_png(&path, labels).map_err(|e| io_error(&path, e))?;
        }
        log::info!(
            "Wrote {} label images to {}",
            output.label_images.len(),
            dir.display()
        );
    }

    println!(
        "{} mergers expanded, {} matches, flow {} at cost {:.4}",
        output.fits.values().filter(|f| f.len() > 1).count(),
        output.assignment.matches.len(),
        output.assignment.total_flow,
        output.assignment.total_cost
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
