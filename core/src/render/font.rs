use image::{GenericImage, Rgba};

/// 4x6 bitmap glyphs, one nibble per row with the high bit on the left.
static DIGITS: [[u8; 6]; 10] = [
    [0x6, 0x9, 0x9, 0x9, 0x6, 0x0], // 0
    [0x4, 0xC, 0x4, 0x4, 0xE, 0x0], // 1
    [0x6, 0x9, 0x2, 0x4, 0xF, 0x0], // 2
    [0xE, 0x1, 0x6, 0x1, 0xE, 0x0], // 3
    [0x2, 0x6, 0xA, 0xF, 0x2, 0x0], // 4
    [0xF, 0x8, 0xE, 0x1, 0xE, 0x0], // 5
    [0x6, 0x8, 0xE, 0x9, 0x6, 0x0], // 6
    [0xF, 0x1, 0x2, 0x4, 0x4, 0x0], // 7
    [0x6, 0x9, 0x6, 0x9, 0x6, 0x0], // 8
    [0x6, 0x9, 0x7, 0x1, 0x6, 0x0], // 9
];

static LETTERS: [[u8; 6]; 26] = [
    [0x6, 0x9, 0xF, 0x9, 0x9, 0x0], // A
    [0xE, 0x9, 0xE, 0x9, 0xE, 0x0], // B
    [0x6, 0x9, 0x8, 0x9, 0x6, 0x0], // C
    [0xE, 0x9, 0x9, 0x9, 0xE, 0x0], // D
    [0xF, 0x8, 0xE, 0x8, 0xF, 0x0], // E
    [0xF, 0x8, 0xE, 0x8, 0x8, 0x0], // F
    [0x6, 0x8, 0xB, 0x9, 0x6, 0x0], // G
    [0x9, 0x9, 0xF, 0x9, 0x9, 0x0], // H
    [0xE, 0x4, 0x4, 0x4, 0xE, 0x0], // I
    [0x7, 0x2, 0x2, 0xA, 0x4, 0x0], // J
    [0x9, 0xA, 0xC, 0xA, 0x9, 0x0], // K
    [0x8, 0x8, 0x8, 0x8, 0xF, 0x0], // L
    [0x9, 0xF, 0xF, 0x9, 0x9, 0x0], // M
    [0x9, 0xD, 0xB, 0x9, 0x9, 0x0], // N
    [0x6, 0x9, 0x9, 0x9, 0x6, 0x0], // O
    [0xE, 0x9, 0xE, 0x8, 0x8, 0x0], // P
    [0x6, 0x9, 0x9, 0xA, 0x5, 0x0], // Q
    [0xE, 0x9, 0xE, 0xA, 0x9, 0x0], // R
    [0x6, 0x8, 0x6, 0x1, 0xE, 0x0], // S
    [0xE, 0x4, 0x4, 0x4, 0x4, 0x0], // T
    [0x9, 0x9, 0x9, 0x9, 0x6, 0x0], // U
    [0x9, 0x9, 0x9, 0x6, 0x6, 0x0], // V
    [0x9, 0x9, 0xF, 0xF, 0x9, 0x0], // W
    [0x9, 0x9, 0x6, 0x9, 0x9, 0x0], // X
    [0x9, 0x9, 0x6, 0x4, 0x4, 0x0], // Y
    [0xF, 0x1, 0x6, 0x8, 0xF, 0x0], // Z
];

const GLYPH_WIDTH: u32 = 4;
/// Rows that carry ink, the sixth row is descender space.
pub(super) const GLYPH_HEIGHT: u32 = 5;
const ADVANCE: u32 = GLYPH_WIDTH + 1;

fn glyph(ch: char) -> Option<&'static [u8; 6]> {
    match ch.to_ascii_uppercase() {
        c @ '0'..='9' => Some(&DIGITS[c as usize - '0' as usize]),
        c @ 'A'..='Z' => Some(&LETTERS[c as usize - 'A' as usize]),
        _ => None,
    }
}

/// Width of `text` drawn with square pixels of side `px`.
pub(super) fn text_width(text: &str, px: u32) -> u32 {
    let chars = text.chars().count() as u32;
    (chars * ADVANCE).saturating_sub(1) * px
}

/// Draws `text` with its top-left corner at `(x, y)`, clipping at the image edge.
pub(super) fn draw_text<I>(image: &mut I, text: &str, x: u32, y: u32, px: u32, color: Rgba<u8>)
where
    I: GenericImage<Pixel = Rgba<u8>>,
{
    let mut cx = x;
    for ch in text.chars() {
        if let Some(glyph) = glyph(ch) {
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        fill_square(image, cx + col * px, y + row as u32 * px, px, color);
                    }
                }
            }
        }
        cx += ADVANCE * px;
    }
}

fn fill_square<I>(image: &mut I, x: u32, y: u32, px: u32, color: Rgba<u8>)
where
    I: GenericImage<Pixel = Rgba<u8>>,
{
    for py in y..(y + px).min(image.height()) {
        for qx in x..(x + px).min(image.width()) {
            image.put_pixel(qx, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn width_accounts_for_spacing() {
        assert_eq!(text_width("A1", 1), 9);
        assert_eq!(text_width("P30", 4), 56);
        assert_eq!(text_width("", 3), 0);
    }

    #[test]
    fn draws_scaled_glyph() {
        let mut image = RgbaImage::new(20, 20);
        let ink = Rgba([0, 0, 0, 255]);
        draw_text(&mut image, "1", 0, 0, 2, ink);

        // top row of "1" is 0b0100
        assert_eq!(image.get_pixel(2, 0), &ink);
        assert_eq!(image.get_pixel(3, 1), &ink);
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn clips_to_a_sub_image() {
        let mut image = RgbaImage::new(20, 10);
        let ink = Rgba([0, 0, 0, 255]);
        {
            let mut cell = image::imageops::crop(&mut image, 5, 0, 6, 10);
            draw_text(&mut *cell, "88", 0, 0, 1, ink);
        }

        let inked: Vec<u32> = (0..20)
            .filter(|&x| (0..10).any(|y| image.get_pixel(x, y) == &ink))
            .collect();
        assert_eq!(inked.first(), Some(&5));
        assert_eq!(inked.last(), Some(&10));
    }

    #[test]
    fn lowercase_maps_to_uppercase() {
        assert_eq!(glyph('b'), glyph('B'));
        assert_eq!(glyph('?'), None);
    }
}
