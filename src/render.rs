//! Canvas rendering as a list of draw commands.
//!
//! The renderer never touches the session; it reads a [`Scene`] snapshot and
//! returns plain data that a UI backend turns into painter calls.

use crate::model::{BBox, Point, Rect};
use crate::session::Gesture;
use crate::viewport::Viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    /// Text centered on `center`.
    Text {
        center: Point,
        text: String,
        color: Color,
    },
    /// The whole source image stretched over `dest`.
    Image {
        dest: Rect,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        width: f32,
        dashed: bool,
    },
    /// Filled text chip whose bottom-left corner sits at `anchor`.
    LabelChip {
        anchor: Point,
        text: String,
        fill: Color,
        text_color: Color,
    },
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct Scene<'a> {
    pub canvas_size: (u32, u32),
    pub image_size: Option<(u32, u32)>,
    pub viewport: &'a Viewport,
    pub boxes: &'a [BBox],
    pub gesture: Gesture,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CanvasStyle {
    pub background: Color,
    pub placeholder: String,
    pub placeholder_color: Color,
    pub box_color: Color,
    pub box_width: f32,
    pub label_text: Color,
    pub provisional_color: Color,
    pub provisional_width: f32,
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            background: Color::rgb(0x2b, 0x2b, 0x2b),
            placeholder: "Select an image\n(scroll to zoom, right-drag to pan)".to_string(),
            placeholder_color: Color::WHITE,
            box_color: Color::rgb(0, 255, 0),
            box_width: 2.0,
            label_text: Color::BLACK,
            provisional_color: Color::rgb(0, 0, 255),
            provisional_width: 2.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CanvasRenderer {
    pub style: CanvasStyle,
}

impl CanvasRenderer {
    pub fn new(style: CanvasStyle) -> Self {
        Self { style }
    }

    pub fn render(&self, scene: &Scene<'_>) -> Vec<DrawCommand> {
        let (cw, ch) = scene.canvas_size;
        let canvas = Rect {
            x1: 0,
            y1: 0,
            x2: cw as i32,
            y2: ch as i32,
        };
        let mut commands = vec![DrawCommand::FillRect {
            rect: canvas,
            color: self.style.background,
        }];

        let Some((iw, ih)) = scene.image_size else {
            commands.push(DrawCommand::Text {
                center: Point::new(canvas.x2 / 2, canvas.y2 / 2),
                text: self.style.placeholder.clone(),
                color: self.style.placeholder_color,
            });
            return commands;
        };

        let to_screen = |r: Rect| Rect {
            x1: scene.viewport.image_to_screen(r.min()).x,
            y1: scene.viewport.image_to_screen(r.min()).y,
            x2: scene.viewport.image_to_screen(r.max()).x,
            y2: scene.viewport.image_to_screen(r.max()).y,
        };

        commands.push(DrawCommand::Image {
            dest: to_screen(Rect {
                x1: 0,
                y1: 0,
                x2: iw as i32,
                y2: ih as i32,
            }),
        });

        for bbox in scene.boxes {
            let rect = to_screen(bbox.rect());
            commands.push(DrawCommand::StrokeRect {
                rect,
                color: self.style.box_color,
                width: self.style.box_width,
                dashed: false,
            });
            commands.push(DrawCommand::LabelChip {
                anchor: rect.min(),
                text: bbox.class_name.clone(),
                fill: self.style.box_color,
                text_color: self.style.label_text,
            });
        }

        if let Gesture::Drawing { current, .. } = scene.gesture {
            commands.push(DrawCommand::StrokeRect {
                rect: to_screen(current),
                color: self.style.provisional_color,
                width: self.style.provisional_width,
                dashed: true,
            });
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene<'a>(viewport: &'a Viewport, boxes: &'a [BBox], gesture: Gesture) -> Scene<'a> {
        Scene {
            canvas_size: (800, 600),
            image_size: Some((400, 300)),
            viewport,
            boxes,
            gesture,
        }
    }

    #[test]
    fn empty_canvas_shows_placeholder() {
        let vp = Viewport::default();
        let commands = CanvasRenderer::default().render(&Scene {
            image_size: None,
            ..scene(&vp, &[], Gesture::Idle)
        });
        assert_eq!(commands.len(), 2);
        assert!(matches!(
            &commands[0],
            DrawCommand::FillRect { rect, .. } if *rect == Rect { x1: 0, y1: 0, x2: 800, y2: 600 }
        ));
        assert!(matches!(
            &commands[1],
            DrawCommand::Text { center, .. } if *center == Point::new(400, 300)
        ));
    }

    #[test]
    fn image_and_boxes_are_transformed() {
        let vp = Viewport::new(2.0, (10.0, 20.0));
        let boxes = [BBox::new(1, "car", Rect { x1: 5, y1: 5, x2: 50, y2: 40 })];
        let commands = CanvasRenderer::default().render(&scene(&vp, &boxes, Gesture::Idle));

        assert_eq!(
            commands[1],
            DrawCommand::Image {
                dest: Rect { x1: 10, y1: 20, x2: 810, y2: 620 }
            }
        );
        let box_rect = Rect { x1: 20, y1: 30, x2: 110, y2: 100 };
        assert!(matches!(
            &commands[2],
            DrawCommand::StrokeRect { rect, dashed: false, .. } if *rect == box_rect
        ));
        assert!(matches!(
            &commands[3],
            DrawCommand::LabelChip { anchor, text, .. } if *anchor == box_rect.min() && text == "car"
        ));
        assert_eq!(commands.len(), 4);
    }

    #[test]
    fn provisional_box_is_dashed_and_last() {
        let vp = Viewport::default();
        let gesture = Gesture::Drawing {
            start: Point::new(10, 10),
            current: Rect { x1: 10, y1: 10, x2: 60, y2: 30 },
        };
        let commands = CanvasRenderer::default().render(&scene(&vp, &[], gesture));
        assert!(matches!(
            commands.last(),
            Some(DrawCommand::StrokeRect { dashed: true, rect, .. })
                if *rect == Rect { x1: 10, y1: 10, x2: 60, y2: 30 }
        ));
    }

    #[test]
    fn panning_draws_no_provisional_box() {
        let vp = Viewport::default();
        let gesture = Gesture::Panning { anchor: Point::new(1, 1) };
        let commands = CanvasRenderer::default().render(&scene(&vp, &[], gesture));
        assert!(!commands
            .iter()
            .any(|c| matches!(c, DrawCommand::StrokeRect { dashed: true, .. })));
    }
}
