//! Command-line entry point for the qcmon helpers
//!
//! Usage:
//!   qcmon graph <func.nii[.gz]> <mask.nii[.gz]> <out.txt> [--delimiter <char>]
//!   qcmon mean-roi <func.nii[.gz]> <mask.nii[.gz]> <label>[,<label>...]
//!   qcmon subjects <dir>
//!
//! Logging is controlled with RUST_LOG (e.g. RUST_LOG=info).

use std::env;
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use log::info;

use qcmon_core::nifti_io::read_volume;
use qcmon_core::region::{mean_roi, roi_graph, write_graph_with, GraphFormat};
use qcmon_core::subjects::get_subjects;

fn usage(program: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {} graph <func.nii[.gz]> <mask.nii[.gz]> <out.txt> [--delimiter <char>]", program);
    eprintln!("  {} mean-roi <func.nii[.gz]> <mask.nii[.gz]> <label>[,<label>...]", program);
    eprintln!("  {} subjects <dir>", program);
    process::exit(2);
}

fn parse_labels(arg: &str) -> Result<Vec<f64>> {
    arg.split(',')
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid label '{}'", s))
        })
        .collect()
}

fn cmd_graph(func: &str, mask: &str, out: &str, extra: &[String]) -> Result<()> {
    let mut format = GraphFormat::default();
    match extra {
        [] => {}
        [flag, value] if flag == "--delimiter" => {
            let bytes = value.as_bytes();
            if bytes.len() != 1 {
                bail!("delimiter must be a single byte, got '{}'", value);
            }
            format.delimiter = bytes[0];
        }
        other => bail!("unexpected arguments: {:?}", other),
    }

    let data = read_volume(Path::new(func)).with_context(|| format!("loading functional data '{}'", func))?;
    let mask = read_volume(Path::new(mask)).with_context(|| format!("loading mask '{}'", mask))?;
    info!(
        "functional: {} voxels x {} timepoints, mask dims {:?}",
        data.n_voxels(),
        data.n_timepoints(),
        mask.dims
    );

    let graph = roi_graph(data.data.view(), mask.data.view()).context("building region graph")?;
    write_graph_with(Path::new(out), &graph.matrix, &format).with_context(|| format!("writing graph to '{}'", out))?;

    info!("wrote {}x{} graph for labels {:?}", graph.n_regions(), graph.n_regions(), graph.labels);
    Ok(())
}

fn cmd_mean_roi(func: &str, mask: &str, labels: &str) -> Result<()> {
    let labels = parse_labels(labels)?;
    let data = read_volume(Path::new(func)).with_context(|| format!("loading functional data '{}'", func))?;
    let mask = read_volume(Path::new(mask)).with_context(|| format!("loading mask '{}'", mask))?;

    let ts = mean_roi(data.data.view(), mask.data.view(), labels).context("computing ROI mean")?;
    for v in ts.iter() {
        println!("{}", v);
    }
    Ok(())
}

fn cmd_subjects(dir: &str) -> Result<()> {
    for subject in get_subjects(Path::new(dir)).with_context(|| format!("listing subjects in '{}'", dir))? {
        println!("{}", subject);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("qcmon");

    match args.get(1).map(String::as_str) {
        Some("graph") if args.len() >= 5 => cmd_graph(&args[2], &args[3], &args[4], &args[5..]),
        Some("mean-roi") if args.len() == 5 => cmd_mean_roi(&args[2], &args[3], &args[4]),
        Some("subjects") if args.len() == 3 => cmd_subjects(&args[2]),
        _ => usage(program),
    }
}
