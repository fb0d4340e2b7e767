// Paint pipeline module
// Turns an image plus an origin into one paint call and one title update

use crate::geometry::{clamp_origin, Point, Rect};
use crate::image_loader::ViewImage;
use crate::window::Window;

/// Window title for a loaded image
pub fn loaded_title(image: &ViewImage) -> String {
    format!(
        "{} ({}x{})",
        image.name(),
        image.bounds().dx(),
        image.bounds().dy()
    )
}

/// Paint the part of `image` visible from `origin` and retitle the window.
///
/// Does nothing without an image (it is most likely still loading).
pub fn show<W: Window + ?Sized>(window: &mut W, image: Option<&ViewImage>, origin: Point) {
    let Some(image) = image else {
        return;
    };

    let size = window.geometry();
    let origin = clamp_origin(origin, size, Some(image.bounds()));

    window.paint(image.sub_image(Rect::from_origin(origin, size)));
    window.set_title(&loaded_title(image));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::window::testing::{drain, Call, RecordingWindow};

    fn blank(name: &str, width: u32, height: u32) -> ViewImage {
        ViewImage::from_bgra(name, width, height, vec![0; (width * height * 4) as usize])
    }

    #[test]
    fn paints_visible_region_and_sets_title() {
        let (mut window, calls) = RecordingWindow::new(Size::new(400, 300));
        let img = blank("name0", 800, 600);

        show(&mut window, Some(&img), Point::new(100, 50));

        assert_eq!(
            drain(&calls),
            vec![
                Call::Paint(Rect::new(Point::new(100, 50), Point::new(500, 350))),
                Call::Title("name0 (800x600)".to_string()),
            ]
        );
    }

    #[test]
    fn reclamps_out_of_range_origin() {
        let (mut window, calls) = RecordingWindow::new(Size::new(400, 300));
        let img = blank("wide", 800, 600);

        show(&mut window, Some(&img), Point::new(9000, -9000));

        assert_eq!(
            drain(&calls)[0],
            Call::Paint(Rect::new(Point::new(400, 0), Point::new(800, 300)))
        );
    }

    #[test]
    fn small_image_paints_whole_image_and_full_dimensions_in_title() {
        let (mut window, calls) = RecordingWindow::new(Size::new(400, 300));
        let img = blank("tiny", 40, 30);

        show(&mut window, Some(&img), Point::new(10, 10));

        assert_eq!(
            drain(&calls),
            vec![
                Call::Paint(Rect::new(Point::ZERO, Point::new(40, 30))),
                Call::Title("tiny (40x30)".to_string()),
            ]
        );
    }

    #[test]
    fn absent_image_is_a_no_op() {
        let (mut window, calls) = RecordingWindow::new(Size::new(400, 300));
        show(&mut window, None, Point::new(10, 10));
        assert!(drain(&calls).is_empty());
    }
}
