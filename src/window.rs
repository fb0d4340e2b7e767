// Window collaborator module
// The narrow contract the canvas uses to put pixels and titles on screen

use crate::geometry::Size;
use crate::image_loader::SubImage;

/// Everything the canvas needs from the display side.
///
/// Only the canvas worker calls these methods; other threads must go
/// through a `CanvasHandle` instead.
pub trait Window {
    /// Paint the visible part of an image at the canvas origin
    fn paint(&mut self, image: SubImage<'_>);

    fn set_title(&mut self, title: &str);

    /// Ask for the canvas to become exactly `width` x `height`
    fn resize(&mut self, width: u32, height: u32);

    /// Current canvas size, read fresh on every call
    fn geometry(&self) -> Size;

    /// Wipe whatever was painted before
    fn clear(&mut self);
}
