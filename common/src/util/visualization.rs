use crate::db::core::BoardDb;
use crate::db::item::ItemShape;
use crate::geom::line::FloatLine;
use crate::geom::rect::Rect;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

const MARGIN: f64 = 2.0;

pub fn draw_board(db: &BoardDb, air_lines: &[FloatLine], filename: &str, width: u32, height: u32) {
    let Some(extent) = db
        .items()
        .map(|it| it.bounding_box())
        .reduce(|a, b| a.union(&b))
        .map(|r| r.expand(MARGIN))
    else {
        log::warn!("Board is empty, skipping visualization.");
        return;
    };

    let mut img = RgbaImage::from_pixel(width, height, Rgba([10, 10, 14, 255]));

    let scale = (width as f64 / extent.width()).min(height as f64 / extent.height());
    let map = |x: f64, y: f64| {
        (
            (x - extent.min.x) * scale,
            height as f64 - (y - extent.min.y) * scale,
        )
    };

    let plane_color = Rgba([40, 90, 60, 255]);
    for it in db.items() {
        if let ItemShape::ConductionArea { area, .. } = it.shape {
            draw_filled_rect_mut(&mut img, to_image_rect(&area, &map), plane_color);
        }
    }

    let colors = [
        // Front copper: Red
        Rgba([230, 40, 60, 255]),
        // Back copper: Blue
        Rgba([40, 120, 255, 255]),
        // Inner layers: Gold
        Rgba([255, 200, 0, 255]),
    ];
    let mut traces: Vec<(FloatLine, u8)> = db.items().filter_map(|it| it.trace_line()).collect();
    traces.sort_by_key(|(_, layer)| std::cmp::Reverse(*layer));

    for (line, layer) in traces {
        let (x1, y1) = map(line.a.x, line.a.y);
        let (x2, y2) = map(line.b.x, line.b.y);
        let color = colors[(layer as usize).min(colors.len() - 1)];
        draw_line_segment_mut(
            &mut img,
            (x1 as f32, y1 as f32),
            (x2 as f32, y2 as f32),
            color,
        );
    }

    for it in db.items() {
        let Some(c) = it.center() else {
            continue;
        };
        let (px, py) = map(c.x, c.y);
        let (size, color) = match it.shape {
            ItemShape::Via { .. } => (3, Rgba([255, 255, 255, 200])),
            _ => (5, Rgba([210, 210, 210, 255])),
        };
        let rect = ImageRect::at(px as i32 - size / 2, py as i32 - size / 2)
            .of_size(size as u32, size as u32);
        draw_filled_rect_mut(&mut img, rect, color);
    }

    let air_color = Rgba([255, 255, 120, 255]);
    for line in air_lines {
        let (x1, y1) = map(line.a.x, line.a.y);
        let (x2, y2) = map(line.b.x, line.b.y);
        draw_line_segment_mut(
            &mut img,
            (x1 as f32, y1 as f32),
            (x2 as f32, y2 as f32),
            air_color,
        );
    }

    if let Err(e) = img.save(Path::new(filename)) {
        log::warn!("Failed to write visualization {}: {}", filename, e);
    }
}

fn to_image_rect(area: &Rect, map: &impl Fn(f64, f64) -> (f64, f64)) -> ImageRect {
    let (x, y_bot) = map(area.min.x, area.min.y);
    let (x_max, y_top) = map(area.max.x, area.max.y);
    let w = (x_max - x).max(1.0);
    let h = (y_bot - y_top).max(1.0);
    ImageRect::at(x as i32, y_top as i32).of_size(w as u32, h as u32)
}
