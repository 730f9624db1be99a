//! Copy-move detection on one image.
//!
//! Run with: cargo run --example copy_move -- <image_path|options.json> [mask_path] [output_dir]
//!
//! A `.json` first argument is read as a full options record.

use std::{env, fs, path::Path, process};

use copy_move_forensics::{
    CopyMoveAnalyzer, DetectorOptions,
    report::{JsonReport, visualization::{VisualizationConfig, Visualizer}},
};

fn run(args: &[String]) -> copy_move_forensics::error::Result<()> {
    let input = &args[1];
    let output_dir = args.get(3).map(|s| s.as_str()).unwrap_or("./output");

    let mut options = DetectorOptions::from_input(input)?;
    if let Some(mask) = args.get(2) {
        options = options.with_mask(mask);
    }

    let analyzer = CopyMoveAnalyzer::from_options(options.clone())?;
    let result = analyzer.analyze()?;

    fs::create_dir_all(output_dir)?;
    let stem = options
        .image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    result.save_mask(Path::new(output_dir).join(format!("{}_mask.png", stem)))?;
    if options.save_computed_mask {
        result.save_computed_mask(Path::new(output_dir).join(format!("{}_computed_mask.png", stem)))?;
    }
    for (k, step) in result.steps.iter().enumerate() {
        step.save(Path::new(output_dir).join(format!("{}_step_{:02}.png", stem, k)))?;
    }

    let visualizer = Visualizer::with_config(VisualizationConfig::from_options(&options));
    let views = visualizer.render(&analyzer.image().to_rgb8(), &result, analyzer.ground_truth());
    views.save_all(output_dir, &stem)?;

    println!("Keypoints: {}", result.interest_points.len());
    println!("Matches: {}", result.matches.pair_count());
    println!("Lines: {}", result.lines.len());
    println!(
        "Clusters: {} (minPts = {})",
        result.clustering.clusters.len(),
        result.clustering.min_pts_used
    );
    for cluster in result.clustering.clusters.iter().take(5) {
        println!("  Cluster {}: {} lines", cluster.id, cluster.lines.len());
    }

    if let Some(metrics) = &result.metrics {
        println!("Dice: {:.3}", metrics.dice);
        println!("Jaccard: {:.3}", metrics.jaccard);
        println!(
            "Precision: {:.3} | Recall: {:.3} | F1: {:.3}",
            metrics.precision, metrics.recall, metrics.f1
        );
    }

    let report = JsonReport::from(&result);
    fs::write(
        Path::new(output_dir).join(format!("{}_report.json", stem)),
        report.to_json()?,
    )?;

    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: {} <image_path|options.json> [mask_path] [output_dir]", args[0]);
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
