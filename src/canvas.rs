// Canvas module
// The single worker that owns which image is shown and where its origin sits

use crate::geometry::{clamp_origin, Point, Size};
use crate::image_loader::{Loaded, ViewImage};
use crate::paint;
use crate::trigger::LoadTrigger;
use crate::window::Window;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, error, info, warn};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("no images to show")]
    NoImages,
    #[error("{names} image names but {triggers} load triggers")]
    Mismatch { names: usize, triggers: usize },
    #[error("canvas worker has stopped")]
    Closed,
}

/// Ways to move the origin of the current image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTransform {
    /// Keep the origin; re-clamp and repaint (e.g. after the window changed size)
    Refresh,
    MoveTo(Point),
    Shift(Point),
    /// Center the image in the window
    Recenter,
    /// Bottom-right corner; the clamp pulls it back to the maximum slack
    BottomRight,
}

impl ViewTransform {
    /// Candidate origin; the caller still clamps it
    pub fn apply(self, origin: Point, image: Option<&ViewImage>, window: Size) -> Point {
        match self {
            ViewTransform::Refresh => origin,
            ViewTransform::MoveTo(pt) => pt,
            ViewTransform::Shift(delta) => origin + delta,
            ViewTransform::Recenter => match image {
                Some(img) => {
                    let bounds = img.bounds();
                    Point::new(
                        bounds.min.x + (bounds.dx() - window.width) / 2,
                        bounds.min.y + (bounds.dy() - window.height) / 2,
                    )
                }
                None => origin,
            },
            ViewTransform::BottomRight => Point::new(i32::MAX, i32::MAX),
        }
    }
}

/// What is known about one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never visited, load not started
    Unloaded,
    /// Load started, nothing heard back yet
    Loading,
    Loaded,
    /// Worker reported an error; never retried
    Failed,
}

#[derive(Debug)]
enum Slot {
    Pending,
    Loaded(ViewImage),
    Failed,
}

/// View state plus the transitions that change it.
///
/// Not thread-safe on purpose: [`spawn`] moves it onto the canvas worker and
/// every change arrives there as a message.
pub struct Canvas<W: Window> {
    window: W,
    names: Vec<String>,
    slots: Vec<Slot>,
    triggers: Vec<LoadTrigger>,
    current: usize,
    origin: Point,
    pan_anchor: Point,
    pan_origin: Point,
}

impl<W: Window> Canvas<W> {
    pub fn new(window: W, names: Vec<String>, triggers: Vec<LoadTrigger>) -> Result<Self, CanvasError> {
        if names.is_empty() {
            return Err(CanvasError::NoImages);
        }
        if names.len() != triggers.len() {
            return Err(CanvasError::Mismatch {
                names: names.len(),
                triggers: triggers.len(),
            });
        }

        let slots = names.iter().map(|_| Slot::Pending).collect();
        Ok(Self {
            window,
            names,
            slots,
            triggers,
            current: 0,
            origin: Point::ZERO,
            pan_anchor: Point::ZERO,
            pan_origin: Point::ZERO,
        })
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        let state = match self.slots.get(index)? {
            Slot::Loaded(_) => SlotState::Loaded,
            Slot::Failed => SlotState::Failed,
            Slot::Pending if self.triggers[index].is_fired() => SlotState::Loading,
            Slot::Pending => SlotState::Unloaded,
        };
        Some(state)
    }

    fn current_image(&self) -> Option<&ViewImage> {
        match &self.slots[self.current] {
            Slot::Loaded(img) => Some(img),
            _ => None,
        }
    }

    /// Index wrapped into `0..len`
    fn wrap(&self, index: isize) -> usize {
        index.rem_euclid(self.slots.len() as isize) as usize
    }

    /// Store a finished load; repaint if it is the image on screen
    pub fn on_loaded(&mut self, loaded: Loaded) {
        let Loaded { index, result } = loaded;
        let Some(slot) = self.slots.get_mut(index) else {
            warn!("Ignoring load completion for unknown image {}", index);
            return;
        };
        if !matches!(slot, Slot::Pending) {
            warn!("Ignoring duplicate load completion for image {}", index);
            return;
        }

        match result {
            Ok(img) => {
                debug!("Image {} stored", index);
                *slot = Slot::Loaded(img);
                if index == self.current {
                    self.repaint();
                }
            }
            Err(e) => {
                error!("Failed to load {}: {}", self.names[index], e);
                *slot = Slot::Failed;
                if index == self.current {
                    self.window.set_title(&failed_title(&self.names[index]));
                }
            }
        }
    }

    pub fn on_transform(&mut self, transform: ViewTransform) {
        let candidate = transform.apply(self.origin, self.current_image(), self.window.geometry());
        debug!("{:?}: {:?} -> {:?}", transform, self.origin, candidate);
        self.switch_to(self.current as isize, candidate);
    }

    /// Make the window exactly as large as the current image
    pub fn on_resize_to_image(&mut self) {
        let Slot::Loaded(img) = &self.slots[self.current] else {
            debug!("Resize to image ignored: image {} not loaded", self.current);
            return;
        };
        let size = img.bounds().size();
        self.window.resize(size.width as u32, size.height as u32);
    }

    pub fn on_prev(&mut self) {
        self.switch_to(self.current as isize - 1, Point::ZERO);
    }

    pub fn on_next(&mut self) {
        self.switch_to(self.current as isize + 1, Point::ZERO);
    }

    pub fn on_pan_start(&mut self, pt: Point) {
        self.pan_anchor = pt;
        self.pan_origin = self.origin;
    }

    pub fn on_pan_step(&mut self, pt: Point) {
        let delta = self.pan_anchor - pt;
        self.switch_to(self.current as isize, self.pan_origin + delta);
    }

    pub fn on_pan_end(&mut self) {
        self.pan_anchor = Point::ZERO;
        self.pan_origin = Point::ZERO;
    }

    /// Show image `index` (wrapped) anchored at `pt`, or start loading it
    fn switch_to(&mut self, index: isize, pt: Point) {
        let i = self.wrap(index);
        if i != self.current {
            // The new image may not cover what the old one left behind
            self.window.clear();
        }
        self.current = i;
        debug!("Showing image {} ({:?})", i, self.slot_state(i));

        let size = self.window.geometry();
        match &self.slots[i] {
            Slot::Loaded(img) => {
                self.origin = clamp_origin(pt, size, Some(img.bounds()));
                paint::show(&mut self.window, Some(img), self.origin);
            }
            Slot::Pending => {
                self.origin = clamp_origin(pt, size, None);
                self.window.set_title(&format!("{} - Loading...", self.names[i]));
                if self.triggers[i].fire() {
                    info!("Loading image {}: {}", i, self.names[i]);
                }
            }
            Slot::Failed => {
                self.origin = clamp_origin(pt, size, None);
                self.window.set_title(&failed_title(&self.names[i]));
            }
        }
    }

    fn repaint(&mut self) {
        let size = self.window.geometry();
        if let Slot::Loaded(img) = &self.slots[self.current] {
            self.origin = clamp_origin(self.origin, size, Some(img.bounds()));
            paint::show(&mut self.window, Some(img), self.origin);
        }
    }
}

fn failed_title(name: &str) -> String {
    format!("{} - Failed to load", name)
}

/// Sending side of every canvas mailbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CanvasHandle {
    loaded: Sender<Loaded>,
    transform: Sender<ViewTransform>,
    resize_to_image: Sender<()>,
    prev: Sender<()>,
    next: Sender<()>,
    pan_start: Sender<Point>,
    pan_step: Sender<Point>,
    pan_end: Sender<()>,
}

struct Inbox {
    loaded: Receiver<Loaded>,
    transform: Receiver<ViewTransform>,
    resize_to_image: Receiver<()>,
    prev: Receiver<()>,
    next: Receiver<()>,
    pan_start: Receiver<Point>,
    pan_step: Receiver<Point>,
    pan_end: Receiver<()>,
}

fn send<T>(tx: &Sender<T>, msg: T) -> Result<(), CanvasError> {
    tx.send(msg).map_err(|_| CanvasError::Closed)
}

impl CanvasHandle {
    /// Sender for load workers to report completions on
    pub fn completions(&self) -> Sender<Loaded> {
        self.loaded.clone()
    }

    pub fn transform(&self, transform: ViewTransform) -> Result<(), CanvasError> {
        send(&self.transform, transform)
    }

    pub fn resize_to_image(&self) -> Result<(), CanvasError> {
        send(&self.resize_to_image, ())
    }

    pub fn prev(&self) -> Result<(), CanvasError> {
        send(&self.prev, ())
    }

    pub fn next(&self) -> Result<(), CanvasError> {
        send(&self.next, ())
    }

    pub fn pan_start(&self, pt: Point) -> Result<(), CanvasError> {
        send(&self.pan_start, pt)
    }

    pub fn pan_step(&self, pt: Point) -> Result<(), CanvasError> {
        send(&self.pan_step, pt)
    }

    pub fn pan_end(&self) -> Result<(), CanvasError> {
        send(&self.pan_end, ())
    }
}

/// Start the canvas worker.
///
/// Every mailbox is a rendezvous channel, so senders block until the worker
/// takes their message. The worker stops once all handles are dropped.
pub fn spawn<W>(
    window: W,
    names: Vec<String>,
    triggers: Vec<LoadTrigger>,
) -> Result<(CanvasHandle, JoinHandle<()>)>
where
    W: Window + Send + 'static,
{
    let canvas = Canvas::new(window, names, triggers)?;

    let (loaded_tx, loaded) = bounded(0);
    let (transform_tx, transform) = bounded(0);
    let (resize_tx, resize_to_image) = bounded(0);
    let (prev_tx, prev) = bounded(0);
    let (next_tx, next) = bounded(0);
    let (pan_start_tx, pan_start) = bounded(0);
    let (pan_step_tx, pan_step) = bounded(0);
    let (pan_end_tx, pan_end) = bounded(0);

    let handle = CanvasHandle {
        loaded: loaded_tx,
        transform: transform_tx,
        resize_to_image: resize_tx,
        prev: prev_tx,
        next: next_tx,
        pan_start: pan_start_tx,
        pan_step: pan_step_tx,
        pan_end: pan_end_tx,
    };
    let inbox = Inbox {
        loaded,
        transform,
        resize_to_image,
        prev,
        next,
        pan_start,
        pan_step,
        pan_end,
    };

    // Loaders may outlive every handle; keep completions open while we run
    let keepalive = handle.completions();
    let worker = thread::Builder::new()
        .name("canvas".to_string())
        .spawn(move || {
            let _keepalive = keepalive;
            run(canvas, inbox);
        })
        .context("Failed to spawn canvas worker")?;

    Ok((handle, worker))
}

fn run<W: Window>(mut canvas: Canvas<W>, inbox: Inbox) {
    info!("Canvas worker started with {} images", canvas.len());

    loop {
        let open = select! {
            recv(inbox.loaded) -> msg => msg.map(|l| canvas.on_loaded(l)).is_ok(),
            recv(inbox.transform) -> msg => msg.map(|t| canvas.on_transform(t)).is_ok(),
            recv(inbox.resize_to_image) -> msg => msg.map(|_| canvas.on_resize_to_image()).is_ok(),
            recv(inbox.prev) -> msg => msg.map(|_| canvas.on_prev()).is_ok(),
            recv(inbox.next) -> msg => msg.map(|_| canvas.on_next()).is_ok(),
            recv(inbox.pan_start) -> msg => msg.map(|pt| canvas.on_pan_start(pt)).is_ok(),
            recv(inbox.pan_step) -> msg => msg.map(|pt| canvas.on_pan_step(pt)).is_ok(),
            recv(inbox.pan_end) -> msg => msg.map(|_| canvas.on_pan_end()).is_ok(),
        };
        if !open {
            break;
        }
    }

    info!("Canvas worker stopped");
}
