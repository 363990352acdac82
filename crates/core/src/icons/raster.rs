//! Pixel drawing for pin and cluster icons.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};

use crate::models::BorderColor;

pub const PIN_SIZE: u32 = 96;
pub const PIN_TAIL: u32 = 16;
pub const CLUSTER_SIZE: u32 = 120;
pub const CLUSTER_LARGE_SIZE: u32 = 140;

const RING_WIDTH: f32 = 6.0;
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BRAND: Rgba<u8> = Rgba([0x62, 0x64, 0xa7, 255]);
const AVATAR_BACKGROUND: Rgba<u8> = Rgba([0xe1, 0xdf, 0xdd, 255]);

/// Filled brand-colored disc with a white rim and a centered count.
pub fn cluster_icon(label: &str, size: u32) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let c = size as f32 / 2.0;
    fill_circle(&mut img, c, c, c - 1.0, WHITE);
    fill_circle(&mut img, c, c, c - 1.0 - RING_WIDTH, BRAND);
    let scale = (size / 20).max(1);
    draw_text_centered(&mut img, label, c, c, scale, WHITE);
    img
}

/// Round avatar with a colored ring and a short tail pointing at the location.
///
/// Without a photo the deterministic default avatar is drawn instead.
pub fn pin_icon(photo: Option<&DynamicImage>, border: BorderColor) -> RgbaImage {
    let mut img = RgbaImage::new(PIN_SIZE, PIN_SIZE + PIN_TAIL);
    let [r, g, b] = border.rgb();
    let ring = Rgba([r, g, b, 255]);
    let c = PIN_SIZE as f32 / 2.0;
    let outer = c - 1.0;
    let inner = outer - RING_WIDTH;

    fill_tail(&mut img, c, PIN_SIZE as f32 - 8.0, ring);
    fill_circle(&mut img, c, c, outer, ring);

    match photo {
        Some(photo) => {
            let d = (inner * 2.0).floor() as u32;
            let face = photo.resize_to_fill(d, d, FilterType::Triangle).to_rgba8();
            let offset = c - d as f32 / 2.0;
            for (x, y, px) in face.enumerate_pixels() {
                let tx = x as f32 + offset;
                let ty = y as f32 + offset;
                if inside(tx, ty, c, c, inner) {
                    let mut px = *px;
                    px.0[3] = 255;
                    img.put_pixel(tx as u32, ty as u32, px);
                }
            }
        }
        None => draw_default_avatar(&mut img, c, inner),
    }
    img
}

fn draw_default_avatar(img: &mut RgbaImage, c: f32, radius: f32) {
    fill_circle(img, c, c, radius, AVATAR_BACKGROUND);
    let head_y = c - radius * 0.22;
    let head_r = radius * 0.34;
    let body_y = c + radius * 0.78;
    let body_r = radius * 0.62;
    for_each_in_circle(
        img,
        c,
        c,
        radius,
        |x, y| inside(x, y, c, head_y, head_r) || inside(x, y, c, body_y, body_r),
        BRAND,
    );
}

fn fill_circle(img: &mut RgbaImage, cx: f32, cy: f32, r: f32, color: Rgba<u8>) {
    for_each_in_circle(img, cx, cy, r, |_, _| true, color);
}

fn for_each_in_circle(
    img: &mut RgbaImage,
    cx: f32,
    cy: f32,
    r: f32,
    keep: impl Fn(f32, f32) -> bool,
    color: Rgba<u8>,
) {
    let (w, h) = img.dimensions();
    let x0 = (cx - r).floor().max(0.0) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let x1 = ((cx + r).ceil() as u32).min(w);
    let y1 = ((cy + r).ceil() as u32).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
            if inside(px, py, cx, cy, r) && keep(px, py) {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Downward triangle from `top` to the bottom edge of the image.
fn fill_tail(img: &mut RgbaImage, cx: f32, top: f32, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    let height = h as f32 - top;
    let half = PIN_SIZE as f32 * 0.18;
    for y in (top as u32)..h {
        let t = (y as f32 + 0.5 - top) / height;
        let hw = half * (1.0 - t);
        let x0 = (cx - hw).max(0.0) as u32;
        let x1 = ((cx + hw).ceil() as u32).min(w);
        for x in x0..x1 {
            img.put_pixel(x, y, color);
        }
    }
}

fn inside(x: f32, y: f32, cx: f32, cy: f32, r: f32) -> bool {
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy <= r * r
}

fn draw_text_centered(
    img: &mut RgbaImage,
    text: &str,
    cx: f32,
    cy: f32,
    scale: u32,
    color: Rgba<u8>,
) {
    let glyphs: Vec<[u8; 7]> = text.chars().filter_map(glyph_bits).collect();
    if glyphs.is_empty() {
        return;
    }
    let advance = 6 * scale;
    let width = glyphs.len() as u32 * advance - scale;
    let height = 7 * scale;
    let left = (cx - width as f32 / 2.0).round() as i64;
    let top = (cy - height as f32 / 2.0).round() as i64;
    let (w, h) = img.dimensions();

    for (i, glyph) in glyphs.iter().enumerate() {
        let gx = left + (i as u32 * advance) as i64;
        for (row, pattern) in glyph.iter().enumerate() {
            for col in 0..5u32 {
                if (pattern >> (4 - col)) & 1 == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let px = gx + (col * scale + sx) as i64;
                        let py = top + (row as u32 * scale + sy) as i64;
                        if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some([0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        '+' => Some([0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000]),
        _ => None,
    }
}
