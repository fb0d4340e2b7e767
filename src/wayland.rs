// Wayland integration module
// The window side of the viewer: an xdg toplevel painted from shm buffers,
// fed by the canvas worker and feeding user input back to it

use crate::canvas::{CanvasError, CanvasHandle, ViewTransform};
use crate::geometry::{Point, Size};
use crate::image_loader::SubImage;
use crate::window::Window;
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_output, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm, delegate_xdg_shell, delegate_xdg_window,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop::{
            channel::{self, Channel},
            EventLoop, LoopHandle,
        },
        calloop_wayland_source::WaylandSource,
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window as XdgWindow, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface},
    Connection, QueueHandle,
};

/// Mouse button constants
const BTN_LEFT: u32 = 272;

/// Minimum window size
const MIN_SIZE: u32 = 1;

/// Maximum window size to prevent buffer allocation failures
const MAX_SIZE: u32 = 8192;

/// Maximum buffer size (128MB to avoid Wayland buffer issues)
const MAX_BUFFER_SIZE: usize = 128 * 1024 * 1024;

/// Background behind images smaller than the window (BGRX)
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// Clamp a window size so its XRGB buffer fits in [`MAX_BUFFER_SIZE`].
///
/// Oversized windows are scaled down with their aspect ratio kept.
fn fit_window(width: u32, height: u32) -> (u32, u32) {
    let width = width.clamp(MIN_SIZE, MAX_SIZE);
    let height = height.clamp(MIN_SIZE, MAX_SIZE);

    let buffer_size = width as usize * height as usize * 4;
    if buffer_size <= MAX_BUFFER_SIZE {
        return (width, height);
    }

    let scale = (MAX_BUFFER_SIZE as f64 / buffer_size as f64).sqrt();
    let mut width = ((width as f64 * scale) as u32).max(MIN_SIZE);
    let mut height = ((height as f64 * scale) as u32).max(MIN_SIZE);
    // Float rounding may leave a row or column too many
    while width as usize * height as usize * 4 > MAX_BUFFER_SIZE {
        if width >= height {
            width -= 1;
        } else {
            height -= 1;
        }
    }
    warn!("Window limited to {}x{} to fit the shm buffer", width, height);
    (width, height)
}

/// What a key press asks of the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyRequest {
    Quit,
    Next,
    Prev,
    Transform(ViewTransform),
    ResizeToImage,
}

/// Key bindings; `step` is the pan increment in pixels
fn key_request(keysym: Keysym, step: i32) -> Option<KeyRequest> {
    let request = match keysym {
        Keysym::Escape | Keysym::q => KeyRequest::Quit,
        Keysym::n | Keysym::space => KeyRequest::Next,
        Keysym::p | Keysym::BackSpace => KeyRequest::Prev,
        Keysym::h | Keysym::Left => KeyRequest::Transform(ViewTransform::Shift(Point::new(-step, 0))),
        Keysym::l | Keysym::Right => KeyRequest::Transform(ViewTransform::Shift(Point::new(step, 0))),
        Keysym::k | Keysym::Up => KeyRequest::Transform(ViewTransform::Shift(Point::new(0, -step))),
        Keysym::j | Keysym::Down => KeyRequest::Transform(ViewTransform::Shift(Point::new(0, step))),
        Keysym::Home => KeyRequest::Transform(ViewTransform::MoveTo(Point::ZERO)),
        Keysym::End => KeyRequest::Transform(ViewTransform::BottomRight),
        Keysym::c => KeyRequest::Transform(ViewTransform::Recenter),
        Keysym::f => KeyRequest::ResizeToImage,
        _ => return None,
    };
    Some(request)
}

/// Held keys only keep panning; switching images or quitting needs a fresh press
fn repeat_request(keysym: Keysym, step: i32) -> Option<ViewTransform> {
    match key_request(keysym, step)? {
        KeyRequest::Transform(shift @ ViewTransform::Shift(_)) => Some(shift),
        _ => None,
    }
}

/// Visible pixels handed over by the canvas, tightly packed BGRA rows
#[derive(Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Requests from the canvas worker to the Wayland thread
#[derive(Debug)]
pub enum WindowCommand {
    Paint(Frame),
    Title(String),
    Resize(u32, u32),
    Clear,
}

/// Window size readable from any thread, written by the Wayland side
#[derive(Debug, Clone)]
pub struct SharedGeometry {
    width: Arc<AtomicU32>,
    height: Arc<AtomicU32>,
}

impl SharedGeometry {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width: Arc::new(AtomicU32::new(width)),
            height: Arc::new(AtomicU32::new(height)),
        }
    }

    fn store(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Release);
        self.height.store(height, Ordering::Release);
    }

    fn load(&self) -> Size {
        Size::new(
            self.width.load(Ordering::Acquire) as i32,
            self.height.load(Ordering::Acquire) as i32,
        )
    }
}

/// [`Window`] implementation that forwards everything to the Wayland thread
pub struct WaylandCanvas {
    commands: channel::Sender<WindowCommand>,
    geometry: SharedGeometry,
}

impl WaylandCanvas {
    fn send(&self, command: WindowCommand) {
        if self.commands.send(command).is_err() {
            debug!("Wayland window gone, dropping command");
        }
    }
}

impl Window for WaylandCanvas {
    fn paint(&mut self, image: SubImage<'_>) {
        debug!("Painting {:?}", image.rect());
        self.send(WindowCommand::Paint(Frame {
            width: image.width(),
            height: image.height(),
            data: image.to_bgra(),
        }));
    }

    fn set_title(&mut self, title: &str) {
        self.send(WindowCommand::Title(title.to_string()));
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = fit_window(width, height);
        // Later transforms must already see the new size
        self.geometry.store(width, height);
        self.send(WindowCommand::Resize(width, height));
    }

    fn geometry(&self) -> Size {
        self.geometry.load()
    }

    fn clear(&mut self) {
        self.send(WindowCommand::Clear);
    }
}

/// Both ends of a window: the canvas half and what [`run`] needs
pub struct WindowParts {
    pub canvas: WaylandCanvas,
    pub commands: Channel<WindowCommand>,
    pub geometry: SharedGeometry,
}

/// Create the command channel and shared geometry for a window of the given size
pub fn window_parts(width: u32, height: u32) -> WindowParts {
    let (tx, commands) = channel::channel();
    let geometry = SharedGeometry::new(width, height);
    WindowParts {
        canvas: WaylandCanvas {
            commands: tx,
            geometry: geometry.clone(),
        },
        commands,
        geometry,
    }
}

/// Main Wayland application state
struct WaylandApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,

    // Application-specific state
    canvas: CanvasHandle,
    geometry: SharedGeometry,
    increment: i32,
    should_exit: bool,

    // Drives keyboard repeat once a keyboard shows up
    loop_handle: Option<LoopHandle<'static, WaylandApp>>,

    // Surface and buffer management
    window: Option<XdgWindow>,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    width: u32,
    height: u32,
    configured: bool,

    // Last frame painted by the canvas
    frame: Option<Frame>,

    // Pointer state
    pointer_pos: (f64, f64),
    panning: bool,
}

impl WaylandApp {
    fn new(
        registry_state: RegistryState,
        seat_state: SeatState,
        output_state: OutputState,
        shm: Shm,
        canvas: CanvasHandle,
        geometry: SharedGeometry,
        increment: i32,
    ) -> Self {
        let size = geometry.load();
        Self {
            registry_state,
            seat_state,
            output_state,
            shm,
            canvas,
            geometry,
            increment,
            should_exit: false,
            loop_handle: None,
            window: None,
            pool: None,
            buffer: None,
            width: size.width as u32,
            height: size.height as u32,
            configured: false,
            frame: None,
            pointer_pos: (0.0, 0.0),
            panning: false,
        }
    }

    /// Stop when the canvas worker no longer listens
    fn forward(&mut self, result: Result<(), CanvasError>) {
        if let Err(e) = result {
            warn!("{}, exiting", e);
            self.should_exit = true;
        }
    }

    /// Apply a command from the canvas worker
    fn apply(&mut self, command: WindowCommand) {
        match command {
            WindowCommand::Paint(frame) => {
                self.frame = Some(frame);
                self.draw();
            }
            WindowCommand::Title(title) => {
                debug!("Title: {}", title);
                if let Some(ref window) = self.window {
                    window.set_title(title);
                }
            }
            WindowCommand::Resize(width, height) => {
                info!("Resizing window to {}x{}", width, height);
                self.set_size(width, height);
                let result = self.canvas.transform(ViewTransform::Refresh);
                self.forward(result);
            }
            WindowCommand::Clear => {
                self.frame = None;
                self.draw();
            }
        }
    }

    /// Adopt a window size; the canvas sees exactly what gets drawn
    fn set_size(&mut self, width: u32, height: u32) {
        (self.width, self.height) = fit_window(width, height);
        self.geometry.store(self.width, self.height);
    }

    /// Map a key press to a canvas request
    fn handle_key(&mut self, keysym: Keysym) {
        let result = match key_request(keysym, self.increment) {
            Some(KeyRequest::Quit) => {
                info!("Exit key pressed");
                self.should_exit = true;
                return;
            }
            Some(KeyRequest::Next) => self.canvas.next(),
            Some(KeyRequest::Prev) => self.canvas.prev(),
            Some(KeyRequest::Transform(transform)) => self.canvas.transform(transform),
            Some(KeyRequest::ResizeToImage) => self.canvas.resize_to_image(),
            None => return,
        };
        self.forward(result);
    }

    fn handle_repeat(&mut self, keysym: Keysym) {
        if let Some(transform) = repeat_request(keysym, self.increment) {
            let result = self.canvas.transform(transform);
            self.forward(result);
        }
    }

    fn pointer_point(&self) -> Point {
        Point::new(self.pointer_pos.0 as i32, self.pointer_pos.1 as i32)
    }

    /// Draw the last frame into a fresh shm buffer
    fn draw(&mut self) {
        if !self.configured {
            return;
        }

        let Some(ref window) = self.window else {
            return;
        };

        let width = self.width;
        let height = self.height;

        // Calculate buffer size (4 bytes per pixel for XRGB)
        let stride = width as i32 * 4;
        let buffer_size = (stride as usize) * height as usize;
        debug_assert!(buffer_size <= MAX_BUFFER_SIZE);

        // Initialize pool if needed
        if self.pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}. Buffer size: {} bytes", e, buffer_size);
                    return;
                }
            }
        }

        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        // Resize pool if needed
        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.pool = None;
                return;
            }
        }

        let (buffer, canvas) =
            match pool.create_buffer(width as i32, height as i32, stride, wl_shm::Format::Xrgb8888) {
                Ok(buf) => buf,
                Err(e) => {
                    error!("Failed to create buffer {}x{}: {}", width, height, e);
                    return;
                }
            };

        Self::render_frame(self.frame.as_ref(), canvas, width, height);

        let surface = window.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach buffer: {:?}", e);
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
    }

    /// Fill the background and copy the frame to the top-left corner
    fn render_frame(frame: Option<&Frame>, canvas: &mut [u8], width: u32, height: u32) {
        for pixel in canvas.chunks_exact_mut(4) {
            pixel.copy_from_slice(&BACKGROUND);
        }

        let Some(frame) = frame else {
            return;
        };

        let copy_width = frame.width.min(width) as usize * 4;
        let rows = frame.height.min(height) as usize;
        let src_stride = frame.width as usize * 4;
        let dst_stride = width as usize * 4;

        for y in 0..rows {
            let src = &frame.data[y * src_stride..y * src_stride + copy_width];
            let dst = &mut canvas[y * dst_stride..y * dst_stride + copy_width];
            dst.copy_from_slice(src);
        }
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for WaylandApp {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &XdgWindow) {
        info!("Window closed");
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _window: &XdgWindow,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure);

        let width = configure.new_size.0.map(|w| w.get()).unwrap_or(self.width);
        let height = configure.new_size.1.map(|h| h.get()).unwrap_or(self.height);
        let resized = !self.configured || width != self.width || height != self.height;

        self.set_size(width, height);
        self.configured = true;

        if resized {
            // The canvas re-clamps its origin against the new size and repaints
            let result = self.canvas.transform(ViewTransform::Refresh);
            self.forward(result);
        }
        self.draw();
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            let keyboard = match self.loop_handle.clone() {
                Some(loop_handle) => self.seat_state.get_keyboard_with_repeat(
                    qh,
                    &seat,
                    None,
                    loop_handle,
                    Box::new(|app: &mut WaylandApp, _keyboard: &wl_keyboard::WlKeyboard, event: KeyEvent| {
                        app.handle_repeat(event.keysym)
                    }),
                ),
                None => self.seat_state.get_keyboard(qh, &seat, None),
            };
            if let Err(e) = keyboard {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);
        self.handle_key(event.keysym);
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl PointerHandler for WaylandApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            match event.kind {
                PointerEventKind::Enter { .. } => {
                    debug!("Pointer entered");
                }
                PointerEventKind::Leave { .. } => {
                    debug!("Pointer left");
                    if self.panning {
                        self.panning = false;
                        let result = self.canvas.pan_end();
                        self.forward(result);
                    }
                }
                PointerEventKind::Motion { .. } => {
                    self.pointer_pos = event.position;
                    if self.panning {
                        let result = self.canvas.pan_step(self.pointer_point());
                        self.forward(result);
                    }
                }
                PointerEventKind::Press { button, .. } if button == BTN_LEFT => {
                    self.pointer_pos = event.position;
                    self.panning = true;
                    let result = self.canvas.pan_start(self.pointer_point());
                    self.forward(result);
                }
                PointerEventKind::Release { button, .. } if button == BTN_LEFT => {
                    if self.panning {
                        self.panning = false;
                        let result = self.canvas.pan_end();
                        self.forward(result);
                    }
                }
                _ => {}
            }
        }
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_xdg_shell!(WaylandApp);
delegate_xdg_window!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_pointer!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_registry!(WaylandApp);

/// Run the Wayland window until it is closed
pub fn run(
    canvas: CanvasHandle,
    commands: Channel<WindowCommand>,
    geometry: SharedGeometry,
    increment: i32,
) -> Result<()> {
    info!("Connecting to Wayland display");

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    let (globals, event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    let mut app = WaylandApp::new(
        RegistryState::new(&globals),
        SeatState::new(&globals, &qh),
        OutputState::new(&globals, &qh),
        shm,
        canvas,
        geometry,
        increment,
    );

    let surface = compositor_state.create_surface(&qh);
    let window = xdg_shell.create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_title("rsview");
    window.set_app_id("rsview");
    window.set_min_size(Some((MIN_SIZE, MIN_SIZE)));
    // Commit the surface to trigger configure
    window.commit();
    app.window = Some(window);

    let mut event_loop: EventLoop<'static, WaylandApp> =
        EventLoop::try_new().context("Failed to create event loop")?;
    let loop_handle = event_loop.handle();
    app.loop_handle = Some(loop_handle.clone());

    WaylandSource::new(conn.clone(), event_queue)
        .insert(loop_handle.clone())
        .map_err(|e| anyhow!("Failed to insert Wayland source: {}", e.error))?;

    loop_handle
        .insert_source(commands, |event, _, app| match event {
            channel::Event::Msg(command) => app.apply(command),
            channel::Event::Closed => {
                info!("Canvas worker stopped");
                app.should_exit = true;
            }
        })
        .map_err(|e| anyhow!("Failed to insert canvas command source: {}", e.error))?;

    info!("Starting event loop");
    info!("Controls: n/space next, p/backspace previous, drag or h/j/k/l to pan");
    info!("c to center, Home/End for corners, f to fit window to image, q to quit");

    loop {
        event_loop
            .dispatch(None, &mut app)
            .context("Event loop dispatch failed")?;

        if app.should_exit {
            info!("Exiting application");
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_frame_copies_into_top_left_over_background() {
        let frame = Frame {
            width: 2,
            height: 1,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let mut canvas = vec![9u8; 3 * 2 * 4];

        WaylandApp::render_frame(Some(&frame), &mut canvas, 3, 2);

        assert_eq!(&canvas[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&canvas[8..12], &BACKGROUND);
        assert!(canvas[12..].chunks_exact(4).all(|p| p == BACKGROUND));
    }

    #[test]
    fn render_frame_clips_oversized_frames() {
        let frame = Frame {
            width: 4,
            height: 4,
            data: (0..64).collect(),
        };
        let mut canvas = vec![0u8; 2 * 2 * 4];

        WaylandApp::render_frame(Some(&frame), &mut canvas, 2, 2);

        assert_eq!(&canvas[..8], &frame.data[..8]);
        assert_eq!(&canvas[8..], &frame.data[16..24]);
    }

    #[test]
    fn fit_window_keeps_sizes_that_fit() {
        assert_eq!(fit_window(800, 600), (800, 600));
        assert_eq!(fit_window(0, 0), (MIN_SIZE, MIN_SIZE));
        assert_eq!(fit_window(4096, 8192), (4096, 8192));
        assert_eq!(fit_window(7680, 4320), (7680, 4320));
        assert_eq!(fit_window(20_000, 3), (MAX_SIZE, 3));
    }

    #[test]
    fn fit_window_shrinks_oversized_buffers() {
        for (w, h) in [(6000, 6000), (8192, 8192), (8192, 4608), (7000, 8000)] {
            let (fw, fh) = fit_window(w, h);
            let bytes = fw as usize * fh as usize * 4;
            assert!(bytes <= MAX_BUFFER_SIZE, "{}x{} -> {}x{}", w, h, fw, fh);
            // Nearly all of the budget is used
            assert!(bytes > MAX_BUFFER_SIZE * 99 / 100, "{}x{} -> {}x{}", w, h, fw, fh);
            assert!(fw < w && fh < h);
        }

        let (w, h) = fit_window(6000, 6000);
        assert_eq!(w, h);
        let (w, h) = fit_window(8192, 4608);
        assert!((w as f64 / h as f64 - 16.0 / 9.0).abs() < 0.01);
    }

    #[test]
    fn canvas_geometry_matches_the_drawable_size() {
        let parts = window_parts(400, 300);
        let mut canvas = parts.canvas;

        canvas.resize(6000, 6000);
        let (w, h) = fit_window(6000, 6000);
        assert_eq!(canvas.geometry(), Size::new(w as i32, h as i32));
        assert_eq!(parts.geometry.load(), canvas.geometry());
    }

    #[test]
    fn key_bindings() {
        let shift = |x, y| Some(KeyRequest::Transform(ViewTransform::Shift(Point::new(x, y))));

        assert_eq!(key_request(Keysym::q, 20), Some(KeyRequest::Quit));
        assert_eq!(key_request(Keysym::Escape, 20), Some(KeyRequest::Quit));
        assert_eq!(key_request(Keysym::n, 20), Some(KeyRequest::Next));
        assert_eq!(key_request(Keysym::space, 20), Some(KeyRequest::Next));
        assert_eq!(key_request(Keysym::p, 20), Some(KeyRequest::Prev));
        assert_eq!(key_request(Keysym::BackSpace, 20), Some(KeyRequest::Prev));

        assert_eq!(key_request(Keysym::h, 20), shift(-20, 0));
        assert_eq!(key_request(Keysym::Left, 7), shift(-7, 0));
        assert_eq!(key_request(Keysym::l, 20), shift(20, 0));
        assert_eq!(key_request(Keysym::Right, 7), shift(7, 0));
        assert_eq!(key_request(Keysym::k, 20), shift(0, -20));
        assert_eq!(key_request(Keysym::Up, 7), shift(0, -7));
        assert_eq!(key_request(Keysym::j, 20), shift(0, 20));
        assert_eq!(key_request(Keysym::Down, 7), shift(0, 7));

        assert_eq!(
            key_request(Keysym::Home, 20),
            Some(KeyRequest::Transform(ViewTransform::MoveTo(Point::ZERO)))
        );
        assert_eq!(
            key_request(Keysym::End, 20),
            Some(KeyRequest::Transform(ViewTransform::BottomRight))
        );
        assert_eq!(
            key_request(Keysym::c, 20),
            Some(KeyRequest::Transform(ViewTransform::Recenter))
        );
        assert_eq!(key_request(Keysym::f, 20), Some(KeyRequest::ResizeToImage));

        assert_eq!(key_request(Keysym::x, 20), None);
        assert_eq!(key_request(Keysym::Q, 20), None);
    }

    #[test]
    fn only_pan_keys_repeat() {
        assert_eq!(
            repeat_request(Keysym::l, 20),
            Some(ViewTransform::Shift(Point::new(20, 0)))
        );
        assert_eq!(
            repeat_request(Keysym::Up, 5),
            Some(ViewTransform::Shift(Point::new(0, -5)))
        );
        for keysym in [Keysym::n, Keysym::p, Keysym::q, Keysym::f, Keysym::Home, Keysym::c, Keysym::x] {
            assert_eq!(repeat_request(keysym, 20), None, "{:?}", keysym);
        }
    }

    #[test]
    fn canvas_side_forwards_commands_and_tracks_resize() {
        let parts = window_parts(400, 300);
        let mut canvas = parts.canvas;
        assert_eq!(canvas.geometry(), Size::new(400, 300));

        canvas.resize(640, 480);
        assert_eq!(canvas.geometry(), Size::new(640, 480));
        assert_eq!(parts.geometry.load(), Size::new(640, 480));

        canvas.set_title("hello");
        canvas.clear();
        drop(parts.commands);
        // Sending into a closed window must not panic
        canvas.clear();
    }
}
