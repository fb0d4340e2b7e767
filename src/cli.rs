// Command line interface module
// Handles parsing of command line arguments and the stdin file list

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;

/// rsview - A lazy-loading, pannable image viewer for Wayland
#[derive(Parser, Debug)]
#[command(name = "rsview")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image files to view (more paths can be piped in on stdin, one per line)
    #[arg(value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Initial width of the window
    #[arg(long, default_value = "800", value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Initial height of the window
    #[arg(long, default_value = "600", value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Pixels to scroll per keyboard pan step
    #[arg(short, long, default_value = "20")]
    pub increment: i32,

    /// Scale factor applied when loading (e.g., 0.5 for half size, 2.0 for double)
    #[arg(short, long, default_value = "1.0", value_parser = parse_scale)]
    pub scale: f32,
}

/// Parsed arguments with the resolved image list
#[derive(Debug)]
pub struct ParsedArgs {
    pub images: Vec<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub increment: i32,
    pub scale: f32,
}

/// Parse scale value and ensure it is positive
fn parse_scale(s: &str) -> Result<f32, String> {
    let scale: f32 = s.parse().map_err(|_| "Invalid scale value")?;
    if !(scale > 0.0 && scale.is_finite()) {
        return Err("Scale must be a positive number".to_string());
    }
    Ok(scale)
}

/// Check if stdin has data available (is a pipe)
fn stdin_has_data() -> bool {
    !atty::is(atty::Stream::Stdin)
}

/// Collect non-empty lines as paths
fn read_paths(reader: impl BufRead) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read file list from stdin")?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// Resolve the image list from arguments and (optionally) piped paths
fn resolve(args: Args, piped: Vec<PathBuf>) -> Result<ParsedArgs> {
    let mut images = args.images;
    images.extend(piped);

    if images.is_empty() {
        bail!("No images provided. Please provide image paths or pipe a file list to stdin.\n\
               Usage: rsview <IMAGE>... [OPTIONS]\n\
               Or:    find . -name '*.png' | rsview [OPTIONS]");
    }

    Ok(ParsedArgs {
        images,
        width: args.width,
        height: args.height,
        increment: args.increment,
        scale: args.scale,
    })
}

/// Parse command line arguments and handle stdin input
pub fn parse_args() -> Result<ParsedArgs> {
    let args = Args::parse();

    let piped = if stdin_has_data() {
        read_paths(io::stdin().lock())?
    } else {
        Vec::new()
    };

    resolve(args, piped)
}
