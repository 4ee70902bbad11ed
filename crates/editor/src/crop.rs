//! Pointer-driven crop rectangle editing over a canvas.
//!
//! The editor keeps the crop in draw-region pixels and publishes every user
//! change as a ratio rect on one of two channels: `crop_resize` for corner and
//! edge drags, `crop_move` for whole-rect drags. It never applies its own
//! output; the owner validates the request and echoes the accepted crop back
//! through [`CropEditor::set_crop`].

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::EditorConfig;
use crate::geometry::{Point, Rect, Size};
use crate::observable::{ObservableEmitter, ReadOnlyEmitter};
use crate::playback::PreviewSelect;

pub const HANDLE_RADIUS: f64 = 8.0;
pub const ACTIVE_MASK_OPACITY: f64 = 0.6;
pub const STATIC_MASK_OPACITY: f64 = 0.85;
pub const DRAG_HIGHLIGHT_OPACITY: f64 = 0.2;
pub const BORDER_DASH: [f64; 2] = [5.0, 5.0];

/// Named hit regions around the crop, in hit-test priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnchorKey {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
    Top,
    Right,
    Bottom,
    Left,
    Rect,
}

impl AnchorKey {
    pub const ALL: [AnchorKey; 9] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
        Self::Top,
        Self::Right,
        Self::Bottom,
        Self::Left,
        Self::Rect,
    ];

    fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft | Self::Left)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight | Self::Right)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight | Self::Top)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomRight | Self::Bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorZone {
    pub key: AnchorKey,
    pub zone: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropEditorState {
    Inactive,
    Idle,
    Hover(AnchorKey),
    Dragging(AnchorKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Color {
    Black,
    White,
}

/// One drawing instruction in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum DrawOp {
    Fill {
        rect: Rect,
        color: Color,
        opacity: f64,
    },
    Stroke {
        rect: Rect,
        color: Color,
        line_width: f64,
        dash: Option<[f64; 2]>,
    },
    /// White filled circle with a black outline.
    Handle { center: Point, radius: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    anchor: AnchorKey,
    origin: Point,
    offset: Point,
}

pub struct CropEditor {
    point_grab_size: f64,
    line_grab_size: f64,
    canvas: Size,
    inset: f64,
    region: Option<Rect>,
    crop: Rect,
    zones: Option<Vec<AnchorZone>>,
    active: bool,
    hover: Option<AnchorKey>,
    drag: Option<Drag>,
    preview: PreviewSelect,
    crop_resize: ObservableEmitter<Rect>,
    crop_move: ObservableEmitter<Rect>,
}

impl CropEditor {
    /// Creates an inactive editor over a canvas whose usable area is inset
    /// by `inset` (padding plus border) on every side.
    pub fn new(config: &EditorConfig, canvas: Size, inset: f64) -> Self {
        let region = Self::region_for(canvas, inset);
        Self {
            point_grab_size: config.point_grab_size,
            line_grab_size: config.line_grab_size,
            canvas,
            inset,
            region: Some(region),
            crop: Rect::new(Point::default(), region.size),
            zones: None,
            active: false,
            hover: None,
            drag: None,
            preview: PreviewSelect::None,
            crop_resize: ObservableEmitter::new().log_with("CropEditor.crop_resize"),
            crop_move: ObservableEmitter::new().log_with("CropEditor.crop_move"),
        }
    }

    fn region_for(canvas: Size, inset: f64) -> Rect {
        Rect::new(Point::default(), canvas).inset(inset)
    }

    /// Ratio rects requested by corner and edge drags.
    pub fn crop_resize(&self) -> ReadOnlyEmitter<Rect> {
        self.crop_resize.as_read_only()
    }

    /// Ratio rects requested by whole-rect drags.
    pub fn crop_move(&self) -> ReadOnlyEmitter<Rect> {
        self.crop_move.as_read_only()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> CropEditorState {
        if !self.active {
            return CropEditorState::Inactive;
        }
        match (self.drag, self.hover) {
            (Some(drag), _) => CropEditorState::Dragging(drag.anchor),
            (None, Some(anchor)) => CropEditorState::Hover(anchor),
            (None, None) => CropEditorState::Idle,
        }
    }

    pub fn draw_region(&self) -> Option<Rect> {
        self.region
    }

    /// Current crop in draw-region pixels.
    pub fn crop_pixels(&self) -> Rect {
        self.crop
    }

    pub fn preview(&self) -> PreviewSelect {
        self.preview
    }

    pub fn set_preview(&mut self, preview: PreviewSelect) {
        self.preview = preview;
    }

    /// Flips between inactive and active-idle; returns the new activity.
    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        if !self.active {
            self.hover = None;
            self.drag = None;
        }
        debug!(active = self.active, "crop editor toggled");
        self.active
    }

    /// Applies an accepted crop given as a ratio of the video frame.
    pub fn set_crop(&mut self, ratio_crop: Rect) {
        let Some(region) = self.region else {
            return;
        };
        let crop = ratio_crop.to_pixel_rect(region.size);
        if crop == self.crop {
            return;
        }
        self.crop = crop;
        self.zones = None;
    }

    /// Restores the full-frame crop and requests it as a resize.
    pub fn reset_crop(&mut self) {
        let region = Self::region_for(self.canvas, self.inset);
        self.region = Some(region);
        self.crop = Rect::new(Point::default(), region.size);
        self.zones = None;
        self.emit_resize(self.crop);
    }

    /// Follows a canvas resize, keeping the crop's relative placement.
    pub fn resize_canvas(&mut self, canvas: Size) {
        self.canvas = canvas;
        let Some(old_region) = self.region.filter(|region| !region.size.is_empty()) else {
            self.reset_crop();
            return;
        };
        let ratio = self.crop.to_ratio_rect(old_region.size);
        let region = Self::region_for(canvas, self.inset);
        self.region = Some(region);
        self.crop = ratio.to_pixel_rect(region.size);
        self.zones = None;
        trace!(
            width = region.width(),
            height = region.height(),
            "crop draw region recalculated"
        );
    }

    /// Hit zones for the current crop, built on first use after a change.
    pub fn anchor_zones(&mut self) -> &[AnchorZone] {
        if self.zones.is_none() {
            self.zones = Some(self.build_zones());
        }
        self.zones.as_deref().unwrap_or_default()
    }

    fn build_zones(&self) -> Vec<AnchorZone> {
        let crop = self.crop;
        let corner = |key, point| AnchorZone {
            key,
            zone: Rect::square_around(point, self.point_grab_size),
        };
        let edge = |key, line: Rect| AnchorZone {
            key,
            zone: line.outset(self.line_grab_size / 2.0),
        };
        vec![
            corner(AnchorKey::TopLeft, crop.top_left()),
            corner(AnchorKey::TopRight, crop.top_right()),
            corner(AnchorKey::BottomRight, crop.bottom_right()),
            corner(AnchorKey::BottomLeft, crop.bottom_left()),
            edge(AnchorKey::Top, crop.top_edge()),
            edge(AnchorKey::Right, crop.right_edge()),
            edge(AnchorKey::Bottom, crop.bottom_edge()),
            edge(AnchorKey::Left, crop.left_edge()),
            AnchorZone {
                key: AnchorKey::Rect,
                zone: crop,
            },
        ]
    }

    /// Nearest zone containing `position` (draw-region coordinates); the
    /// earlier zone wins a distance tie.
    pub fn hit_test(&mut self, position: Point) -> Option<AnchorZone> {
        self.anchor_zones()
            .iter()
            .filter(|zone| zone.zone.contains_point(position))
            .min_by(|a, b| {
                let da = a.zone.center().distance_to(position);
                let db = b.zone.center().distance_to(position);
                da.total_cmp(&db)
            })
            .copied()
    }

    fn to_region_point(&self, pointer: Point) -> Option<Point> {
        self.region.map(|region| pointer - region.position)
    }

    /// Starts a drag when `pointer` (canvas coordinates) is over a zone.
    pub fn pointer_down(&mut self, pointer: Point) {
        if !self.active {
            return;
        }
        let Some(position) = self.to_region_point(pointer) else {
            return;
        };
        let Some(zone) = self.hit_test(position) else {
            return;
        };
        let origin = zone.zone.center();
        let offset = if zone.key == AnchorKey::Rect {
            origin - position
        } else {
            Point::default()
        };
        self.hover = Some(zone.key);
        self.drag = Some(Drag {
            anchor: zone.key,
            origin,
            offset,
        });
        debug!(anchor = ?zone.key, "crop drag started");
    }

    pub fn pointer_move(&mut self, pointer: Point) {
        if !self.active {
            return;
        }
        let Some(position) = self.to_region_point(pointer) else {
            return;
        };
        let Some(drag) = self.drag else {
            self.hover = self.hit_test(position).map(|zone| zone.key);
            return;
        };

        let current = self.crop;
        let delta = position - drag.origin;
        let mut rect = current;

        if drag.anchor == AnchorKey::Rect {
            rect.position = Point::new(
                drag.origin.x - current.width() / 2.0 + delta.x + drag.offset.x,
                drag.origin.y - current.height() / 2.0 + delta.y + drag.offset.y,
            );
            self.emit_move(rect);
            return;
        }

        if drag.anchor.moves_left() {
            let x = drag.origin.x + delta.x;
            rect.size.width += current.x() - x;
            rect.position.x = x;
        }
        if drag.anchor.moves_right() {
            rect.size.width = drag.origin.x - current.x() + delta.x;
        }
        if drag.anchor.moves_top() {
            let y = drag.origin.y + delta.y;
            rect.size.height += current.y() - y;
            rect.position.y = y;
        }
        if drag.anchor.moves_bottom() {
            rect.size.height = drag.origin.y - current.y() + delta.y;
        }
        self.emit_resize(rect);
    }

    pub fn pointer_up(&mut self) {
        if self.drag.take().is_some() {
            debug!("crop drag ended");
        }
    }

    fn emit_resize(&self, pixels: Rect) {
        if let Some(ratio) = self.ratio_of(pixels) {
            self.crop_resize.emit(ratio);
        }
    }

    fn emit_move(&self, pixels: Rect) {
        if let Some(ratio) = self.ratio_of(pixels) {
            self.crop_move.emit(ratio);
        }
    }

    fn ratio_of(&self, pixels: Rect) -> Option<Rect> {
        self.region
            .filter(|region| !region.size.is_empty())
            .map(|region| pixels.to_ratio_rect(region.size))
    }

    /// Display list for the current state, in canvas coordinates.
    pub fn render(&self) -> Vec<DrawOp> {
        let Some(region) = self.region else {
            return Vec::new();
        };
        let shift = |rect: Rect| Rect::new(rect.position + region.position, rect.size);
        let crop = self.crop;
        let (width, height) = (region.width(), region.height());
        let opacity = if self.active {
            ACTIVE_MASK_OPACITY
        } else {
            STATIC_MASK_OPACITY
        };

        let mut masks = Vec::with_capacity(4);
        if crop.left() > 0.0 {
            masks.push(Rect::from_xywh(0.0, 0.0, crop.left(), height));
        }
        if crop.right() < width {
            masks.push(Rect::from_xywh(crop.right(), 0.0, width - crop.right(), height));
        }
        if crop.top() > 0.0 {
            masks.push(Rect::from_xywh(crop.left(), 0.0, crop.width(), crop.top()));
        }
        if crop.bottom() < height {
            masks.push(Rect::from_xywh(
                crop.left(),
                crop.bottom(),
                crop.width(),
                height - crop.bottom(),
            ));
        }

        let mut ops: Vec<DrawOp> = masks
            .into_iter()
            .map(|rect| DrawOp::Fill {
                rect: shift(rect),
                color: Color::Black,
                opacity,
            })
            .collect();

        if !self.active {
            return ops;
        }

        let framed = shift(crop);
        if self.drag.is_some() {
            ops.push(DrawOp::Fill {
                rect: framed,
                color: Color::White,
                opacity: DRAG_HIGHLIGHT_OPACITY,
            });
        }
        ops.push(DrawOp::Stroke {
            rect: framed,
            color: Color::White,
            line_width: 3.0,
            dash: None,
        });
        ops.push(DrawOp::Stroke {
            rect: framed,
            color: Color::Black,
            line_width: 1.0,
            dash: Some(BORDER_DASH),
        });
        ops.extend(framed.corners().into_iter().map(|center| DrawOp::Handle {
            center,
            radius: HANDLE_RADIUS,
        }));
        ops
    }
}

/// Text for the video size (`"WxH"`) and the crop (`"x,y WxH"`).
pub fn display_labels(crop: Rect, video: Size) -> (String, String) {
    (
        format!("{}x{}", video.width, video.height),
        format!(
            "{},{} {}x{}",
            crop.x(),
            crop.y(),
            crop.width(),
            crop.height()
        ),
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{AnchorKey, Color, CropEditor, CropEditorState, DrawOp, display_labels};
    use crate::config::EditorConfig;
    use crate::geometry::{Point, Rect, Size};
    use crate::observable::observer;

    fn editor(width: f64, height: f64) -> CropEditor {
        let mut editor = CropEditor::new(&EditorConfig::default(), Size::new(width, height), 0.0);
        editor.toggle();
        editor
    }

    fn record(emitter: &crate::observable::ReadOnlyEmitter<Rect>) -> Rc<RefCell<Vec<Rect>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        emitter.subscribe(observer(move |rect: &Rect| sink.borrow_mut().push(*rect)));
        seen
    }

    #[test]
    fn corner_wins_over_edges_at_shared_point() {
        let mut editor = editor(100.0, 100.0);
        let hit = editor.hit_test(Point::new(0.0, 0.0)).expect("corner zone should contain origin");
        assert_eq!(hit.key, AnchorKey::TopLeft);
    }

    #[test]
    fn zones_follow_enumeration_order() {
        let mut editor = editor(100.0, 100.0);
        let keys: Vec<AnchorKey> = editor.anchor_zones().iter().map(|zone| zone.key).collect();
        assert_eq!(keys, AnchorKey::ALL.to_vec());
        assert_eq!(
            editor.anchor_zones()[4].zone,
            Rect::from_xywh(-5.0, -5.0, 110.0, 10.0)
        );
    }

    #[test]
    fn hover_tracks_pointer_until_it_leaves_all_zones() {
        let mut editor = editor(200.0, 100.0);
        editor.pointer_move(Point::new(100.0, 50.0));
        assert_eq!(editor.state(), CropEditorState::Hover(AnchorKey::Rect));
        editor.pointer_move(Point::new(400.0, 400.0));
        assert_eq!(editor.state(), CropEditorState::Idle);
    }

    #[test]
    fn inactive_editor_ignores_pointer() {
        let mut editor = CropEditor::new(&EditorConfig::default(), Size::new(100.0, 100.0), 0.0);
        let seen = record(&editor.crop_resize());
        editor.pointer_down(Point::new(0.0, 0.0));
        editor.pointer_move(Point::new(40.0, 40.0));
        assert_eq!(editor.state(), CropEditorState::Inactive);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn pointer_down_outside_every_zone_starts_nothing() {
        let mut editor = editor(100.0, 100.0);
        editor.set_crop(Rect::from_xywh(0.25, 0.25, 0.5, 0.5));
        editor.pointer_down(Point::new(2.0, 2.0));
        assert_eq!(editor.state(), CropEditorState::Idle);
    }

    #[test]
    fn corner_drag_resizes_two_edges_in_ratio_space() {
        let mut editor = editor(200.0, 100.0);
        let resizes = record(&editor.crop_resize());
        let moves = record(&editor.crop_move());

        editor.pointer_down(Point::new(199.0, 99.0));
        assert_eq!(
            editor.state(),
            CropEditorState::Dragging(AnchorKey::BottomRight)
        );
        editor.pointer_move(Point::new(150.0, 50.0));

        assert_eq!(*resizes.borrow(), vec![Rect::from_xywh(0.0, 0.0, 0.75, 0.5)]);
        assert!(moves.borrow().is_empty());
    }

    #[test]
    fn left_edge_drag_keeps_right_edge_fixed() {
        let mut editor = editor(200.0, 100.0);
        let resizes = record(&editor.crop_resize());

        editor.pointer_down(Point::new(1.0, 50.0));
        assert_eq!(editor.state(), CropEditorState::Dragging(AnchorKey::Left));
        editor.pointer_move(Point::new(50.0, 70.0));

        let rect = resizes.borrow()[0];
        assert_eq!(rect, Rect::from_xywh(0.25, 0.0, 0.75, 1.0));
    }

    #[test]
    fn whole_rect_drag_translates_without_jump() {
        let mut editor = editor(200.0, 100.0);
        editor.set_crop(Rect::from_xywh(0.25, 0.25, 0.5, 0.5));
        let moves = record(&editor.crop_move());

        editor.pointer_down(Point::new(90.0, 45.0));
        editor.pointer_move(Point::new(110.0, 55.0));

        assert_eq!(*moves.borrow(), vec![Rect::from_xywh(0.35, 0.35, 0.5, 0.5)]);
    }

    #[test]
    fn pointer_up_ends_drag_and_toggle_clears_hover() {
        let mut editor = editor(100.0, 100.0);
        editor.pointer_down(Point::new(50.0, 50.0));
        editor.pointer_up();
        assert_eq!(editor.state(), CropEditorState::Hover(AnchorKey::Rect));

        editor.toggle();
        assert_eq!(editor.state(), CropEditorState::Inactive);
        editor.toggle();
        assert_eq!(editor.state(), CropEditorState::Idle);
    }

    #[test]
    fn canvas_resize_preserves_relative_crop() {
        let mut editor = editor(200.0, 100.0);
        editor.set_crop(Rect::from_xywh(0.25, 0.5, 0.5, 0.25));
        assert_eq!(editor.crop_pixels(), Rect::from_xywh(50.0, 50.0, 100.0, 25.0));

        editor.resize_canvas(Size::new(400.0, 200.0));

        assert_eq!(editor.crop_pixels(), Rect::from_xywh(100.0, 100.0, 200.0, 50.0));
    }

    #[test]
    fn reset_requests_full_frame() {
        let mut editor = editor(200.0, 100.0);
        editor.set_crop(Rect::from_xywh(0.25, 0.5, 0.5, 0.25));
        let resizes = record(&editor.crop_resize());

        editor.reset_crop();

        assert_eq!(*resizes.borrow(), vec![Rect::from_xywh(0.0, 0.0, 1.0, 1.0)]);
    }

    #[test]
    fn inactive_render_is_mask_only() {
        let mut editor = CropEditor::new(&EditorConfig::default(), Size::new(110.0, 60.0), 5.0);
        editor.set_crop(Rect::from_xywh(0.1, 0.0, 0.8, 1.0));

        let ops = editor.render();

        assert_eq!(
            ops,
            vec![
                DrawOp::Fill {
                    rect: Rect::from_xywh(5.0, 5.0, 10.0, 50.0),
                    color: Color::Black,
                    opacity: 0.85,
                },
                DrawOp::Fill {
                    rect: Rect::from_xywh(95.0, 5.0, 10.0, 50.0),
                    color: Color::Black,
                    opacity: 0.85,
                },
            ]
        );
    }

    #[test]
    fn active_drag_render_adds_highlight_border_and_handles() {
        let mut editor = editor(100.0, 100.0);
        editor.pointer_down(Point::new(50.0, 50.0));

        let ops = editor.render();

        assert!(matches!(
            ops[0],
            DrawOp::Fill {
                color: Color::White,
                ..
            }
        ));
        assert!(matches!(ops[2], DrawOp::Stroke { dash: Some(_), .. }));
        let handles = ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Handle { radius, .. } if *radius == 8.0))
            .count();
        assert_eq!(handles, 4);
    }

    #[test]
    fn labels_describe_video_and_crop() {
        let (video, crop) = display_labels(
            Rect::from_xywh(10.0, 20.0, 300.0, 200.0),
            Size::new(640.0, 360.0),
        );
        assert_eq!(video, "640x360");
        assert_eq!(crop, "10,20 300x200");
    }
}
