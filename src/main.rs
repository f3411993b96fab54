// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod artifact;
mod binder;
mod cli;
mod config;
mod error;
mod lock;
mod orchestrator;
mod qr;
mod render;
mod sentinel;
mod types;
mod ui;

use cli::{Command, GenerateArgs, QrArgs};
use config::ReportConfig;
use error::ReportError;
use log::debug;
use serde_json::json;
use std::fs;
use std::path::Path;
use types::*;

fn main() {
    env_logger::init();

    let args = cli::CliArgs::parse_args();

    if let Err(e) = args.validate() {
        finish_with_error(&ReportError::InvalidInput(e), args.json);
    }

    let mut config = match config::load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => finish_with_error(&e, args.json),
    };

    match args.command {
        Command::Generate(ref generate) => {
            config.apply_generate_overrides(generate);
            match run_generate(&config, generate) {
                Ok(report) => {
                    if args.json {
                        println!("{}", json!({ "status": "ok", "report": report }));
                    } else {
                        ui::print_report(&report);
                    }
                }
                Err(e) => finish_with_error(&e, args.json),
            }
        }
        Command::Qr(ref qr_args) => {
            if let Some(ref url) = qr_args.chart_url {
                config.chart.base_url = url.clone();
            }
            match run_qr(&config, qr_args) {
                Ok(image) => {
                    if args.json {
                        println!(
                            "{}",
                            json!({
                                "status": "ok",
                                "width": image.width,
                                "height": image.height,
                                "base64": image.base64,
                            })
                        );
                    } else {
                        println!("{}", image.base64);
                    }
                }
                Err(e) => finish_with_error(&e, args.json),
            }
        }
    }
}

/// Report `err` and exit with its code
fn finish_with_error(err: &ReportError, json: bool) -> ! {
    if json {
        println!("{}", json!({ "status": "error", "kind": err.kind(), "message": err.to_string() }));
    } else {
        ui::print_error(&err.to_string());
    }
    std::process::exit(err.exit_code());
}

fn run_generate(config: &ReportConfig, args: &GenerateArgs) -> Result<GeneratedReport, ReportError> {
    let pipeline = config.build_pipeline()?;
    let job = build_job(config, args)?;

    debug!("generating {} from template {}", job.artifact_path().display(), job.template);
    pipeline.generate_report(&job)
}

/// Assemble the job from flags: load datasets, then fill in QR columns
fn build_job(config: &ReportConfig, args: &GenerateArgs) -> Result<ReportJob, ReportError> {
    let mut datasets = Vec::new();
    for arg in &args.datasets {
        let (name, file) = cli::parse_assignment(arg).map_err(ReportError::InvalidInput)?;
        datasets.push(Dataset::from_json_file(&name, Path::new(&file)).map_err(ReportError::InvalidInput)?);
    }

    if !args.qr.is_empty() {
        let client = config.chart_client();
        for arg in &args.qr {
            let cell = cli::parse_qr_cell(arg).map_err(ReportError::InvalidInput)?;
            let image = qr::fetch_encoded_image(&client, &cell.value, args.qr_size, args.qr_size)?;

            match datasets.iter_mut().find(|d| d.name == cell.dataset) {
                Some(dataset) => dataset.set_column(&cell.column, image.as_cell()),
                None => {
                    let mut dataset = Dataset::new(cell.dataset.as_str(), Vec::new());
                    dataset.set_column(&cell.column, image.as_cell());
                    datasets.push(dataset);
                }
            }
        }
    }

    let mut job = ReportJob::new(&args.out_dir, args.name.as_str(), args.ext.as_str(), args.template.as_str());
    for dataset in datasets {
        job = job.with_dataset(dataset);
    }
    for arg in &args.params {
        let (name, value) = cli::parse_assignment(arg).map_err(ReportError::InvalidInput)?;
        job = job.with_parameter(&name, &value);
    }
    Ok(job)
}

fn run_qr(config: &ReportConfig, args: &QrArgs) -> Result<qr::EncodedImage, ReportError> {
    let image = qr::fetch_encoded_image(&config.chart_client(), &args.value, args.width, args.height)?;

    if let Some(ref out) = args.out {
        fs::write(out, &image.png).map_err(|e| ReportError::write(out, e))?;
        debug!("wrote QR image to {}", out.display());
    }
    Ok(image)
}
