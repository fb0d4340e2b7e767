// rsview - A lazy-loading, pannable image viewer for Wayland
// Images load in the background on first view; one canvas worker owns what is on screen

mod canvas;
mod cli;
mod geometry;
mod image_loader;
mod paint;
mod trigger;
mod wayland;
mod window;

use anyhow::{Context, Result};
use log::{info, warn};
use trigger::LoadTrigger;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args()?;

    info!(
        "Starting rsview with {} images, window {}x{}",
        args.images.len(),
        args.width,
        args.height
    );

    let names: Vec<String> = args
        .images
        .iter()
        .map(|path| image_loader::display_name(path))
        .collect();
    let (triggers, wakes): (Vec<LoadTrigger>, Vec<_>) =
        args.images.iter().map(|_| LoadTrigger::pair()).unzip();

    let parts = wayland::window_parts(args.width, args.height);
    let (canvas, canvas_worker) = canvas::spawn(parts.canvas, names, triggers)?;

    // One dormant loader per image; each waits for its trigger
    for (index, (path, wake)) in args.images.into_iter().zip(wakes).enumerate() {
        image_loader::spawn_loader(index, path, args.scale, wake, canvas.completions())
            .with_context(|| format!("Failed to spawn loader {}", index))?;
    }

    // The window asks the canvas for its first image once it is configured
    wayland::run(canvas, parts.commands, parts.geometry, args.increment)?;

    if canvas_worker.join().is_err() {
        warn!("Canvas worker panicked");
    }

    Ok(())
}
