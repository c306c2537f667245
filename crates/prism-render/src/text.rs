// SPDX-License-Identifier: CEPL-1.0
//! Single-line text atlas: glyphs laid out left to right on one 8-bit image.

/// Horizontal gap after every glyph, in pixels.
pub const GLYPH_SPACING: usize = 2;

/// An 8-bit coverage bitmap for one glyph.
#[derive(Clone, Debug, Default)]
pub struct GlyphBitmap {
    pub width: usize,
    pub rows: usize,
    /// Distance from the baseline up to the bitmap's top row.
    pub bearing_y: i32,
    /// `rows * width` bytes, row-major.
    pub pixels: Vec<u8>,
}

pub trait GlyphRasterizer {
    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap;
}

impl GlyphRasterizer for fontdue::Font {
    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap {
        let (metrics, pixels) = fontdue::Font::rasterize(self, ch, px);
        GlyphBitmap {
            width: metrics.width,
            rows: metrics.height,
            bearing_y: metrics.ymin + metrics.height as i32,
            pixels,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextAtlas {
    pub width: u32,
    pub height: u32,
    /// Row of the shared baseline, equal to the tallest bearing.
    pub baseline_y: u32,
    pub pixels: Vec<u8>,
}

impl TextAtlas {
    /// Rasterizes `text` in two passes: measure, then blit each glyph with its
    /// top at `baseline_y - bearing_y`.
    pub fn build(rasterizer: &impl GlyphRasterizer, text: &str, px: f32) -> Self {
        let glyphs: Vec<GlyphBitmap> = text.chars().map(|c| rasterizer.rasterize(c, px)).collect();

        let width: usize = glyphs.iter().map(|g| g.width + GLYPH_SPACING).sum();
        let baseline = glyphs.iter().map(|g| g.bearing_y).max().unwrap_or(0).max(0);
        let max_rows = glyphs.iter().map(|g| g.rows).max().unwrap_or(0);
        // zero-sized images are not allowed on the GPU
        let width = width.max(1);
        let height = (baseline as usize + max_rows).max(1);

        let mut pixels = vec![0u8; width * height];
        let mut pen_x = 0usize;
        for g in &glyphs {
            let top = baseline - g.bearing_y;
            for row in 0..g.rows {
                let y = top + row as i32;
                if y < 0 || y as usize >= height {
                    continue;
                }
                let dst = y as usize * width + pen_x;
                let src = row * g.width;
                pixels[dst..dst + g.width].copy_from_slice(&g.pixels[src..src + g.width]);
            }
            pen_x += g.width + GLYPH_SPACING;
        }

        TextAtlas {
            width: width as u32,
            height: height as u32,
            baseline_y: baseline as u32,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid boxes: 'A' is a cap-height glyph, 'g' hangs below the baseline.
    struct Boxes;

    impl GlyphRasterizer for Boxes {
        fn rasterize(&self, ch: char, _px: f32) -> GlyphBitmap {
            let (width, rows, bearing_y, fill) = match ch {
                'A' => (10, 20, 20, 0xff),
                'g' => (8, 18, 10, 0x80),
                _ => (0, 0, 0, 0),
            };
            GlyphBitmap { width, rows, bearing_y, pixels: vec![fill; width * rows] }
        }
    }

    #[test]
    fn atlas_dimensions_follow_measure_pass() {
        let atlas = TextAtlas::build(&Boxes, "Ag", 48.0);
        assert_eq!(atlas.width, (10 + 2) + (8 + 2));
        assert_eq!(atlas.height, 20 + 20);
        assert_eq!(atlas.baseline_y, 20);
        assert_eq!(atlas.pixels.len(), (atlas.width * atlas.height) as usize);
    }

    #[test]
    fn glyph_tops_align_to_bearing() {
        let atlas = TextAtlas::build(&Boxes, "Ag", 48.0);
        // 'A' spans rows 0..20 at x 0..10
        assert_eq!(atlas.pixel(0, 0), 0xff);
        assert_eq!(atlas.pixel(9, 19), 0xff);
        assert_eq!(atlas.pixel(0, 20), 0);
        // spacing column stays empty
        assert_eq!(atlas.pixel(10, 5), 0);
        // 'g' starts at x 12, top at baseline - 10 = 10, spans 18 rows
        assert_eq!(atlas.pixel(12, 9), 0);
        assert_eq!(atlas.pixel(12, 10), 0x80);
        assert_eq!(atlas.pixel(19, 27), 0x80);
        assert_eq!(atlas.pixel(19, 28), 0);
    }

    #[test]
    fn blank_text_still_yields_a_drawable_image() {
        let atlas = TextAtlas::build(&Boxes, "", 48.0);
        assert_eq!((atlas.width, atlas.height), (1, 1));
        let spaces = TextAtlas::build(&Boxes, "  ", 48.0);
        assert_eq!(spaces.width, 4);
        assert_eq!(spaces.height, 1);
    }
}
