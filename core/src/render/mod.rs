use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::{ImageError, ImageFormat, Rgba, RgbaImage};
use ndarray::Array2;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

use crate::*;

mod font;

/// Default nearest-neighbour upscale factor.
pub const DEFAULT_SCALE: u32 = 4;
/// Largest upscale factor, keeps a 26x255 board well inside `u32` pixel sizes.
pub const MAX_SCALE: u32 = 16;

const FACE_TOP: u32 = 15;
const COUNTER_LEFT: u32 = 18;
const COUNTER_TOP: u32 = 17;
const TIMER_RIGHT: u32 = 16;
const DIGIT_GAP: u32 = 2;
const LABEL_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to encode board image")]
    Encode(#[from] ImageError),
}

/// Composes board snapshots into PNG images with one skin.
///
/// Layout, before scaling: header bar with the mine counter on the left, the face centered and the timer on
/// the right, then the tile grid at ([`BOARD_LEFT`], [`BOARD_TOP`]). Everything is then upscaled by
/// [`scale`](Self::scale) and unopened, unmarked tiles get their coordinate label drawn on top.
#[derive(Clone, Debug)]
pub struct Renderer {
    spec: GameSpec,
    skin: Arc<Skin>,
    scale: u32,
}

impl Renderer {
    pub fn new(spec: GameSpec, skin: Arc<Skin>) -> Self {
        Self {
            spec,
            skin,
            scale: DEFAULT_SCALE,
        }
    }

    /// Sets the upscale factor, clamped to `1..=MAX_SCALE`.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.clamp(1, MAX_SCALE);
        self
    }

    pub fn spec(&self) -> GameSpec {
        self.spec
    }

    pub fn skin(&self) -> &Arc<Skin> {
        &self.skin
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Output image size in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        let (w, h) = self.skin.background.dimensions();
        (w * self.scale, h * self.scale)
    }

    /// Tile side in output pixels.
    pub fn tile_size(&self) -> u32 {
        TILE_SIZE * self.scale
    }

    /// Maps an output pixel back to the tile under it.
    pub fn tile_at_pixel(&self, x: u32, y: u32) -> Option<Coord2> {
        let tile = self.tile_size();
        let col = x.checked_sub(BOARD_LEFT * self.scale)? / tile;
        let row = y.checked_sub(BOARD_TOP * self.scale)? / tile;
        let row = Coord::try_from(row).ok()?;
        let col = Coord::try_from(col).ok()?;
        (row < self.spec.rows() && col < self.spec.cols()).then_some((row, col))
    }

    pub fn render(
        &self,
        tiles: &Array2<Tile>,
        state: GameState,
        started_at: DateTime<Utc>,
    ) -> Result<Vec<u8>, RenderError> {
        let elapsed = (Utc::now() - started_at).num_seconds().max(0);
        self.render_at(tiles, state, elapsed)
    }

    /// Same as [`render`](Self::render) with an explicit timer value.
    pub fn render_at(
        &self,
        tiles: &Array2<Tile>,
        state: GameState,
        elapsed_secs: i64,
    ) -> Result<Vec<u8>, RenderError> {
        let image = self.compose(tiles, state, elapsed_secs);
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Builds the final image without encoding it.
    pub fn compose(&self, tiles: &Array2<Tile>, state: GameState, elapsed_secs: i64) -> RgbaImage {
        let mut bg = self.skin.background.clone();

        self.draw_face(&mut bg, state);
        self.draw_counter(&mut bg, tiles);
        self.draw_timer(&mut bg, elapsed_secs);
        self.draw_tiles(&mut bg, tiles);

        let mut bg = imageops::resize(
            &bg,
            bg.width() * self.scale,
            bg.height() * self.scale,
            FilterType::Nearest,
        );
        self.draw_labels(&mut bg, tiles);
        bg
    }

    fn draw_face(&self, bg: &mut RgbaImage, state: GameState) {
        let face = self.skin.face(Face::for_state(state));
        let x = (bg.width().saturating_sub(face.width())) / 2;
        paste(bg, face, x, FACE_TOP);
    }

    fn draw_counter(&self, bg: &mut RgbaImage, tiles: &Array2<Tile>) {
        let marked = tiles.iter().filter(|t| t.marked).count() as i64;
        let mines_left = i64::from(self.spec.mines()) - marked;
        let text = format!("{mines_left:03}");

        for (i, ch) in text.chars().take(3).enumerate() {
            let digit = self.skin.digit(ch);
            let x = COUNTER_LEFT + i as u32 * (digit.width() + DIGIT_GAP);
            paste(bg, digit, x, COUNTER_TOP);
        }
    }

    fn draw_timer(&self, bg: &mut RgbaImage, elapsed_secs: i64) {
        let text = format!("{:03}", elapsed_secs.max(0));

        for (i, ch) in text.chars().rev().take(3).enumerate() {
            let digit = self.skin.digit(ch);
            let x = bg.width() as i64
                - TIMER_RIGHT as i64
                - (i as i64 + 1) * (digit.width() + DIGIT_GAP) as i64;
            imageops::replace(bg, digit, x, COUNTER_TOP.into());
        }
    }

    fn draw_tiles(&self, bg: &mut RgbaImage, tiles: &Array2<Tile>) {
        for ((row, col), &tile) in tiles.indexed_iter() {
            let sprite = self.tile_sprite(tile);
            let x = BOARD_LEFT + sprite.width() * col as u32;
            let y = BOARD_TOP + sprite.height() * row as u32;
            paste(bg, sprite, x, y);
        }
    }

    fn tile_sprite(&self, tile: Tile) -> &RgbaImage {
        let skin = &self.skin;
        match (tile.is_open, tile.is_mine, tile.marked) {
            (true, true, _) if tile.boom => skin.icon(Icon::Boom),
            (true, true, _) => skin.icon(Icon::Mine),
            (true, false, true) => skin.icon(Icon::WrongFlag),
            (true, false, false) => &skin.numbers[usize::from(tile.count.min(8))],
            (false, _, true) => skin.icon(Icon::Flag),
            (false, _, false) => skin.icon(Icon::Closed),
        }
    }

    fn draw_labels(&self, bg: &mut RgbaImage, tiles: &Array2<Tile>) {
        let tile = self.tile_size();

        for ((row, col), t) in tiles.indexed_iter() {
            if !t.is_blank() {
                continue;
            }

            let label = coord_label((row as Coord, col as Coord));
            // shrink labels like `A100` until they fit, at scale 1 they are clipped instead
            let px = (1..=self.scale)
                .rev()
                .find(|&px| font::text_width(&label, px) <= tile)
                .unwrap_or(1);
            let x = tile.saturating_sub(font::text_width(&label, px)) / 2;
            let y = tile.saturating_sub(font::GLYPH_HEIGHT * px) / 2;

            let mut cell = imageops::crop(
                bg,
                BOARD_LEFT * self.scale + tile * col as u32,
                BOARD_TOP * self.scale + tile * row as u32,
                tile,
                tile,
            );
            font::draw_text(&mut *cell, &label, x, y, px, LABEL_COLOR);
        }
    }
}

fn paste(bg: &mut RgbaImage, sprite: &RgbaImage, x: u32, y: u32) {
    imageops::replace(bg, sprite, x.into(), y.into());
}

/// Human label for a tile, row letter then 1-based column: `(1, 11)` is `B12`.
pub fn coord_label((row, col): Coord2) -> String {
    let letter = char::from(b'A' + row.min(25));
    format!("{}{}", letter, u16::from(col) + 1)
}
