use std::env;
use std::path::{Path, PathBuf};

use column_detector::diagnostics::SnapshotOptions;
use column_detector::image::io::{load_rgb_image, save_rgb_image, write_json_file};
use column_detector::{
    ColumnDetector, DetectOptions, DetectionReport, DetectorParams, Orientation,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

struct Cli {
    input: PathBuf,
    orientation: Orientation,
    json_out: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
}

fn parse_cli() -> Result<Cli, String> {
    let mut input = None;
    let mut orientation = Orientation::Auto;
    let mut json_out = None;
    let mut snapshot_dir = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--orientation" => {
                let value = args.next().ok_or("--orientation needs a value")?;
                orientation = match value.as_str() {
                    "auto" => Orientation::Auto,
                    "vertical" => Orientation::Vertical,
                    "horizontal" => Orientation::Horizontal,
                    other => return Err(format!("unknown orientation: {other}")),
                };
            }
            "--json" => json_out = Some(PathBuf::from(args.next().ok_or("--json needs a path")?)),
            "--snapshots" => {
                snapshot_dir = Some(PathBuf::from(
                    args.next().ok_or("--snapshots needs a directory")?,
                ))
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if input.is_none() => input = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    Ok(Cli {
        input: input.ok_or_else(|| {
            print_usage();
            "missing input image".to_string()
        })?,
        orientation,
        json_out,
        snapshot_dir,
    })
}

fn print_usage() {
    eprintln!(
        "Usage: detect_demo <image> [--orientation auto|vertical|horizontal] \
         [--json report.json] [--snapshots dir]"
    );
}

fn run() -> Result<(), String> {
    let cli = parse_cli()?;

    let image = load_rgb_image(&cli.input)?;

    let mut params = DetectorParams::default();
    if cli.snapshot_dir.is_some() {
        params.snapshots = SnapshotOptions::all_stages(64);
    }
    let detector = ColumnDetector::new(params).map_err(|e| e.to_string())?;

    let options = DetectOptions {
        orientation: cli.orientation,
        ..Default::default()
    };
    let report = detector.detect(&image, &options).map_err(|e| e.to_string())?;

    print_summary(&report);

    if let Some(path) = &cli.json_out {
        write_json_file(path, &report.trace)?;
        println!("\nTrace written to {}", path.display());
    }

    if let Some(dir) = &cli.snapshot_dir {
        save_snapshots(dir, &report)?;
        println!("Snapshots written to {}", dir.display());
    }

    Ok(())
}

fn print_summary(report: &DetectionReport) {
    println!("Detection summary");
    println!("  columns: {}", report.columns.len());
    for (i, col) in report.columns.iter().enumerate() {
        println!(
            "  [{i}] {}x{} at ({}, {}) {}{} areas={} next={}",
            col.rect.w,
            col.rect.h,
            col.rect.x,
            col.rect.y,
            if col.vertical { "vertical" } else { "horizontal" },
            if col.furigana { " furigana" } else { "" },
            col.areas.len(),
            col.next.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
        );
    }

    let t = &report.trace;
    println!(
        "\nTrace: areas={} vertical_cols={} horizontal_cols={} inverted_blocks={}",
        t.areas_extracted, t.vertical_columns, t.horizontal_columns, t.inverted_blocks
    );
    println!(
        "Timings (ms): preprocess={:.3} extract={:.3} vertical={:.3} horizontal={:.3} \
         orientation={:.3} total={:.3}",
        t.timings.preprocess_ms,
        t.timings.extract_ms,
        t.timings.vertical_ms,
        t.timings.horizontal_ms,
        t.timings.orientation_ms,
        t.timings.total_ms
    );
}

fn save_snapshots(dir: &Path, report: &DetectionReport) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create snapshot dir {}: {e}", dir.display()))?;
    for (i, snap) in report.snapshots.iter().enumerate() {
        let suffix = match snap.vertical {
            Some(true) => "_vertical",
            Some(false) => "_horizontal",
            None => "",
        };
        let path = dir.join(format!("{:02}_{}{}.png", i, snap.stage, suffix));
        save_rgb_image(&snap.image, &path)?;
    }
    Ok(())
}
