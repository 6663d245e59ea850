//! Render command handler

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use ferry_core::domain::image::ImageRef;
use ferry_runner::{Pipeline, Secrets};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Full image coordinate, e.g. 123456789012.dkr.ecr.ap-south-1.amazonaws.com/dev/app:abc123
    #[arg(long)]
    pub image: String,

    /// Write the rendered document here instead of printing it
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Fetches the latest task definition and prints it with the image replaced
///
/// Nothing is registered and no service is touched. The pipeline is expected
/// to carry `args.output` as its render output.
pub async fn handle_render(args: RenderArgs, pipeline: &Pipeline, secrets: &Secrets) -> Result<i32> {
    let image: ImageRef = args
        .image
        .parse()
        .with_context(|| format!("Invalid image '{}'", args.image))?;

    let rendered = pipeline
        .render(secrets, &image)
        .await
        .context("Failed to render task definition")?;

    match &args.output {
        Some(path) => eprintln!(
            "{} {} revision {:?} written to {}",
            "✓".green(),
            rendered.family(),
            rendered.revision(),
            path.display()
        ),
        None => println!("{}", rendered.to_pretty_json()),
    }

    Ok(0)
}
