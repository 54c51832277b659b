//! Stroke-font text for figure titles and colorbar ticks.
//!
//! Glyphs are polylines on a 4x6 grid (y grows downward) and are drawn
//! with round-capped strokes, so no font file is needed. Lowercase letters
//! reuse the uppercase shapes. Characters without a glyph still advance
//! the pen.

use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

const GRID_W: f32 = 4.0;
const GRID_H: f32 = 6.0;

type Glyph = &'static [&'static [(u8, u8)]];

/// Horizontal placement of a label relative to its anchor x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

/// Width of a glyph cell relative to the cap height.
fn char_width(size: f32) -> f32 {
    size * GRID_W / GRID_H
}

fn char_spacing(size: f32) -> f32 {
    size * 0.25
}

/// Rendered width of `text` at cap height `size`.
pub fn text_width(text: &str, size: f32) -> f32 {
    let n = text.chars().count();
    if n == 0 {
        return 0.0;
    }
    n as f32 * (char_width(size) + char_spacing(size)) - char_spacing(size)
}

/// Draw `text` with its cap line at `top` and horizontal placement from `anchor`.
pub fn draw_text(
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    top: f32,
    size: f32,
    anchor: Anchor,
    color: [u8; 4],
) {
    let width = text_width(text, size);
    let start = match anchor {
        Anchor::Start => x,
        Anchor::Middle => x - width / 2.0,
        Anchor::End => x - width,
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = true;

    let mut stroke = Stroke::default();
    stroke.width = (size * 0.12).max(1.0);
    stroke.line_cap = LineCap::Round;
    stroke.line_join = LineJoin::Round;

    let advance = char_width(size) + char_spacing(size);
    for (i, ch) in text.chars().enumerate() {
        let origin_x = start + i as f32 * advance;
        draw_glyph(pixmap, glyph(ch), origin_x, top, size, &paint, &stroke);
    }
}

fn draw_glyph(
    pixmap: &mut Pixmap,
    glyph: Glyph,
    x: f32,
    y: f32,
    size: f32,
    paint: &Paint,
    stroke: &Stroke,
) {
    let scale = size / GRID_H;
    for polyline in glyph {
        let mut pb = PathBuilder::new();
        for (i, &(gx, gy)) in polyline.iter().enumerate() {
            let px = x + gx as f32 * scale;
            let py = y + gy as f32 * scale;
            if i == 0 {
                pb.move_to(px, py);
            } else {
                pb.line_to(px, py);
            }
        }
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, paint, stroke, Transform::identity(), None);
        }
    }
}

/// Whether `ch` has a drawable glyph.
pub fn has_glyph(ch: char) -> bool {
    ch == ' ' || !glyph(ch).is_empty()
}

fn glyph(ch: char) -> Glyph {
    match ch.to_ascii_uppercase() {
        'A' => &[&[(0, 6), (0, 2), (2, 0), (4, 2), (4, 6)], &[(0, 4), (4, 4)]],
        'B' => &[
            &[(0, 0), (0, 6), (3, 6), (4, 5), (4, 4), (3, 3), (0, 3)],
            &[(0, 0), (3, 0), (4, 1), (4, 2), (3, 3)],
        ],
        'C' => &[&[(4, 1), (3, 0), (1, 0), (0, 1), (0, 5), (1, 6), (3, 6), (4, 5)]],
        'D' => &[&[(0, 0), (0, 6), (2, 6), (4, 4), (4, 2), (2, 0), (0, 0)]],
        'E' => &[&[(4, 0), (0, 0), (0, 6), (4, 6)], &[(0, 3), (3, 3)]],
        'F' => &[&[(4, 0), (0, 0), (0, 6)], &[(0, 3), (3, 3)]],
        'G' => &[&[
            (4, 1),
            (3, 0),
            (1, 0),
            (0, 1),
            (0, 5),
            (1, 6),
            (3, 6),
            (4, 5),
            (4, 3),
            (2, 3),
        ]],
        'H' => &[&[(0, 0), (0, 6)], &[(4, 0), (4, 6)], &[(0, 3), (4, 3)]],
        'I' => &[&[(1, 0), (3, 0)], &[(2, 0), (2, 6)], &[(1, 6), (3, 6)]],
        'J' => &[&[(4, 0), (4, 5), (3, 6), (1, 6), (0, 5)]],
        'K' => &[&[(0, 0), (0, 6)], &[(4, 0), (0, 4)], &[(1, 3), (4, 6)]],
        'L' => &[&[(0, 0), (0, 6), (4, 6)]],
        'M' => &[&[(0, 6), (0, 0), (2, 3), (4, 0), (4, 6)]],
        'N' => &[&[(0, 6), (0, 0), (4, 6), (4, 0)]],
        'O' => &[&[(1, 0), (3, 0), (4, 1), (4, 5), (3, 6), (1, 6), (0, 5), (0, 1), (1, 0)]],
        'P' => &[&[(0, 6), (0, 0), (3, 0), (4, 1), (4, 2), (3, 3), (0, 3)]],
        'Q' => &[
            &[(1, 0), (3, 0), (4, 1), (4, 5), (3, 6), (1, 6), (0, 5), (0, 1), (1, 0)],
            &[(2, 4), (4, 6)],
        ],
        'R' => &[
            &[(0, 6), (0, 0), (3, 0), (4, 1), (4, 2), (3, 3), (0, 3)],
            &[(2, 3), (4, 6)],
        ],
        'S' => &[&[
            (4, 1),
            (3, 0),
            (1, 0),
            (0, 1),
            (0, 2),
            (1, 3),
            (3, 3),
            (4, 4),
            (4, 5),
            (3, 6),
            (1, 6),
            (0, 5),
        ]],
        'T' => &[&[(0, 0), (4, 0)], &[(2, 0), (2, 6)]],
        'U' => &[&[(0, 0), (0, 5), (1, 6), (3, 6), (4, 5), (4, 0)]],
        'V' => &[&[(0, 0), (2, 6), (4, 0)]],
        'W' => &[&[(0, 0), (1, 6), (2, 3), (3, 6), (4, 0)]],
        'X' => &[&[(0, 0), (4, 6)], &[(4, 0), (0, 6)]],
        'Y' => &[&[(0, 0), (2, 3), (4, 0)], &[(2, 3), (2, 6)]],
        'Z' => &[&[(0, 0), (4, 0), (0, 6), (4, 6)]],
        '0' => &[
            &[(1, 0), (3, 0), (4, 1), (4, 5), (3, 6), (1, 6), (0, 5), (0, 1), (1, 0)],
            &[(4, 1), (0, 5)],
        ],
        '1' => &[&[(1, 1), (2, 0), (2, 6)], &[(1, 6), (3, 6)]],
        '2' => &[&[(0, 1), (1, 0), (3, 0), (4, 1), (4, 2), (0, 6), (4, 6)]],
        '3' => &[
            &[(0, 1), (1, 0), (3, 0), (4, 1), (4, 2), (3, 3), (1, 3)],
            &[(3, 3), (4, 4), (4, 5), (3, 6), (1, 6), (0, 5)],
        ],
        '4' => &[&[(3, 6), (3, 0), (0, 4), (4, 4)]],
        '5' => &[&[(4, 0), (0, 0), (0, 3), (3, 3), (4, 4), (4, 5), (3, 6), (0, 6)]],
        '6' => &[&[
            (3, 0),
            (1, 0),
            (0, 1),
            (0, 5),
            (1, 6),
            (3, 6),
            (4, 5),
            (4, 4),
            (3, 3),
            (0, 3),
        ]],
        '7' => &[&[(0, 0), (4, 0), (1, 6)]],
        '8' => &[
            &[(1, 3), (0, 2), (0, 1), (1, 0), (3, 0), (4, 1), (4, 2), (3, 3), (1, 3)],
            &[(1, 3), (0, 4), (0, 5), (1, 6), (3, 6), (4, 5), (4, 4), (3, 3)],
        ],
        '9' => &[&[
            (4, 3),
            (1, 3),
            (0, 2),
            (0, 1),
            (1, 0),
            (3, 0),
            (4, 1),
            (4, 5),
            (3, 6),
            (1, 6),
        ]],
        '-' => &[&[(1, 3), (3, 3)]],
        '_' => &[&[(0, 6), (4, 6)]],
        '.' => &[&[(2, 5), (2, 6)]],
        ':' => &[&[(2, 1), (2, 2)], &[(2, 4), (2, 5)]],
        '=' => &[&[(0, 2), (4, 2)], &[(0, 4), (4, 4)]],
        '+' => &[&[(2, 1), (2, 5)], &[(0, 3), (4, 3)]],
        '/' => &[&[(0, 6), (4, 0)]],
        '(' => &[&[(3, 0), (2, 1), (2, 5), (3, 6)]],
        ')' => &[&[(1, 0), (2, 1), (2, 5), (1, 6)]],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink_columns(pixmap: &Pixmap) -> (u32, u32) {
        let mut min_x = u32::MAX;
        let mut max_x = 0;
        for (i, px) in pixmap.pixels().iter().enumerate() {
            if px.alpha() > 0 {
                let x = i as u32 % pixmap.width();
                min_x = min_x.min(x);
                max_x = max_x.max(x);
            }
        }
        (min_x, max_x)
    }

    #[test]
    fn test_title_characters_have_glyphs() {
        for ch in "level_000 Frame-12.5".chars() {
            assert!(has_glyph(ch), "missing glyph for {:?}", ch);
        }
        assert!(!has_glyph('~'));
    }

    #[test]
    fn test_text_width_scales_with_length() {
        assert_eq!(text_width("", 12.0), 0.0);
        let one = text_width("a", 12.0);
        let three = text_width("abc", 12.0);
        assert!(three > 2.0 * one);
    }

    #[test]
    fn test_draw_text_centered() {
        let mut pixmap = Pixmap::new(100, 20).unwrap();
        draw_text(&mut pixmap, "level_001", 50.0, 4.0, 10.0, Anchor::Middle, [0, 0, 0, 255]);

        let (min_x, max_x) = ink_columns(&pixmap);
        assert!(min_x < max_x, "nothing drawn");
        let center = (min_x + max_x) as f32 / 2.0;
        assert!((center - 50.0).abs() < 3.0, "center at {}", center);
    }
}
