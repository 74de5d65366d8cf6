use core::array;
use hashbrown::HashMap;
use image::imageops::{self, FilterType};
use image::{ImageError, Rgba, RgbaImage};
use rand::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::*;

/// Sprite sheets are looked up as `<skins_dir>/<name>.bmp`.
pub const SKIN_EXTENSION: &str = "bmp";

/// Side of a square tile sprite, in sheet pixels.
pub const TILE_SIZE: u32 = 16;
/// Left edge of the tile grid on the background.
pub const BOARD_LEFT: u32 = 12;
/// Top edge of the tile grid on the background, below the header bar.
pub const BOARD_TOP: u32 = 55;
/// Background size beyond the tile grid: side borders, header and bottom border.
pub const FRAME_SIZE: (u32, u32) = (24, 66);

const NUMBER_SPRITE: (u32, u32) = (16, 16);
const ICON_SPRITE: (u32, u32) = (16, 16);
const DIGIT_SPRITE: (u32, u32) = (11, 21);
const FACE_SPRITE: (u32, u32) = (26, 26);
const MIN_SHEET_SIZE: (u32, u32) = (144, 122);

#[derive(Error, Debug)]
pub enum SkinError {
    #[error("Skin {0:?} not found")]
    NotFound(String),
    #[error("Failed to read skin sheet {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("Skin sheet is {found:?}, needs at least {needed:?}")]
    SheetTooSmall { found: (u32, u32), needed: (u32, u32) },
}

/// Status sprites, in sheet order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Icon {
    Closed = 0,
    Pressed = 1,
    Mine = 2,
    Flag = 3,
    WrongFlag = 4,
    Boom = 5,
    Question = 6,
    PressedQuestion = 7,
}

/// Face sprites shown in the header, in sheet order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Face {
    Smile = 0,
    Pressed = 1,
    Lose = 2,
    Win = 3,
    Surprised = 4,
}

impl Face {
    pub const fn for_state(state: GameState) -> Self {
        match state {
            GameState::Win => Face::Win,
            GameState::Fail => Face::Lose,
            GameState::Prepare | GameState::Gaming => Face::Smile,
        }
    }
}

/// Pre-sliced sprites of one theme, with a background assembled for one board size.
#[derive(Clone, Debug, PartialEq)]
pub struct Skin {
    pub numbers: [RgbaImage; 9],
    pub icons: [RgbaImage; 8],
    /// `0`-`9` then a dash.
    pub digits: [RgbaImage; 11],
    pub faces: [RgbaImage; 5],
    pub background: RgbaImage,
}

impl Skin {
    pub fn from_sheet(sheet: &RgbaImage, spec: &GameSpec) -> Result<Self, SkinError> {
        let found = sheet.dimensions();
        if found.0 < MIN_SHEET_SIZE.0 || found.1 < MIN_SHEET_SIZE.1 {
            return Err(SkinError::SheetTooSmall {
                found,
                needed: MIN_SHEET_SIZE,
            });
        }

        let cut = |x: u32, y: u32, (w, h): (u32, u32)| imageops::crop_imm(sheet, x, y, w, h).to_image();

        Ok(Self {
            numbers: array::from_fn(|i| cut(i as u32 * 16, 0, NUMBER_SPRITE)),
            icons: array::from_fn(|i| cut(i as u32 * 16, 16, ICON_SPRITE)),
            digits: array::from_fn(|i| cut(i as u32 * 12, 33, DIGIT_SPRITE)),
            faces: array::from_fn(|i| cut(i as u32 * 27, 55, FACE_SPRITE)),
            background: build_background(sheet, spec),
        })
    }

    pub fn icon(&self, icon: Icon) -> &RgbaImage {
        &self.icons[icon as usize]
    }

    pub fn face(&self, face: Face) -> &RgbaImage {
        &self.faces[face as usize]
    }

    /// Digit glyph for `'0'..='9'`, anything else maps to the dash.
    pub fn digit(&self, ch: char) -> &RgbaImage {
        let index = ch.to_digit(10).map_or(10, |d| d as usize);
        &self.digits[index]
    }
}

/// Source box on the sheet and destination box on the background, as `(left, top, right, bottom)`.
type Block = ([i64; 4], [i64; 4]);

fn background_blocks(rows: i64, cols: i64) -> [Block; 15] {
    let w = cols * TILE_SIZE as i64;
    let h = rows * TILE_SIZE as i64;
    [
        // header bar
        ([0, 82, 12, 93], [0, 0, 12, 11]),
        ([13, 82, 14, 93], [12, 0, 12 + w, 11]),
        ([15, 82, 27, 93], [12 + w, 0, 24 + w, 11]),
        ([0, 94, 12, 95], [0, 11, 12, 44]),
        ([15, 94, 27, 95], [12 + w, 11, 24 + w, 44]),
        ([0, 96, 12, 107], [0, 44, 12, 55]),
        ([13, 96, 14, 107], [12, 44, 12 + w, 55]),
        ([15, 96, 27, 107], [12 + w, 44, 24 + w, 55]),
        // board frame
        ([0, 108, 12, 109], [0, 55, 12, 55 + h]),
        ([15, 108, 27, 109], [12 + w, 55, 24 + w, 55 + h]),
        ([0, 110, 12, 121], [0, 55 + h, 12, 66 + h]),
        ([13, 110, 14, 121], [12, 55 + h, 12 + w, 66 + h]),
        ([15, 110, 27, 121], [12 + w, 55 + h, 24 + w, 66 + h]),
        // counter wells
        ([28, 82, 69, 107], [16, 15, 57, 40]),
        ([28, 82, 69, 107], [w - 33, 15, 8 + w, 40]),
    ]
}

fn build_background(sheet: &RgbaImage, spec: &GameSpec) -> RgbaImage {
    let rows = u32::from(spec.rows());
    let cols = u32::from(spec.cols());
    let mut background = RgbaImage::from_pixel(
        cols * TILE_SIZE + FRAME_SIZE.0,
        rows * TILE_SIZE + FRAME_SIZE.1,
        Rgba([192, 192, 192, 255]),
    );

    for (src, dst) in background_blocks(rows.into(), cols.into()) {
        let part = imageops::crop_imm(
            sheet,
            src[0] as u32,
            src[1] as u32,
            (src[2] - src[0]) as u32,
            (src[3] - src[1]) as u32,
        )
        .to_image();
        let part = imageops::resize(
            &part,
            (dst[2] - dst[0]) as u32,
            (dst[3] - dst[1]) as u32,
            FilterType::Nearest,
        );
        imageops::replace(&mut background, &part, dst[0], dst[1]);
    }

    background
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SkinKey {
    name: String,
    rows: Coord,
    cols: Coord,
}

/// Discovers skins in a directory and caches them per board size.
#[derive(Debug)]
pub struct SkinManager {
    skins_dir: PathBuf,
    names: Vec<String>,
    cache: Mutex<HashMap<SkinKey, Arc<Skin>>>,
    rng: Mutex<SmallRng>,
}

impl SkinManager {
    pub fn new(skins_dir: impl Into<PathBuf>) -> Self {
        Self {
            skins_dir: skins_dir.into(),
            names: Vec::new(),
            cache: Mutex::new(HashMap::new()),
            rng: Mutex::new(SmallRng::seed_from_u64(clock_seed())),
        }
    }

    pub fn skins_dir(&self) -> &Path {
        &self.skins_dir
    }

    /// Re-reads the skin directory, a missing directory yields no skins.
    pub fn scan(&mut self) -> &[String] {
        self.names = match scan_dir(&self.skins_dir) {
            Ok(names) => names,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("no skin directory at {}", self.skins_dir.display());
                Vec::new()
            }
            Err(err) => {
                log::warn!(
                    "failed to scan skins in {}: {}",
                    self.skins_dir.display(),
                    err
                );
                Vec::new()
            }
        };
        log::debug!("found skins: {:?}", self.names);
        &self.names
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Skin name at `index`, falling back to the first one when out of range.
    pub fn get_by_index(&self, index: usize) -> Option<&str> {
        self.names
            .get(index)
            .or_else(|| self.names.first())
            .map(String::as_str)
    }

    pub fn get_random(&self) -> Option<&str> {
        if self.names.is_empty() {
            return None;
        }
        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..self.names.len());
        self.get_by_index(index)
    }

    pub fn load(&self, name: &str, spec: &GameSpec) -> Result<Arc<Skin>, SkinError> {
        let key = SkinKey {
            name: name.to_owned(),
            rows: spec.rows(),
            cols: spec.cols(),
        };

        if let Some(skin) = self.cache_lock().get(&key) {
            log::trace!("skin cache hit for {:?}", key);
            return Ok(Arc::clone(skin));
        }

        let skin = Arc::new(self.load_uncached(name, spec)?);
        log::debug!("loaded skin {:?} for {}", name, spec);
        let mut cache = self.cache_lock();
        // another thread may have loaded the same key meanwhile, keep the first
        Ok(Arc::clone(cache.entry(key).or_insert(skin)))
    }

    fn load_uncached(&self, name: &str, spec: &GameSpec) -> Result<Skin, SkinError> {
        let path = self.skins_dir.join(format!("{name}.{SKIN_EXTENSION}"));
        if !path.is_file() {
            return Err(SkinError::NotFound(name.to_owned()));
        }
        let sheet = image::open(&path)
            .map_err(|source| SkinError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        Skin::from_sheet(&sheet, spec)
    }

    fn cache_lock(&self) -> MutexGuard<'_, HashMap<SkinKey, Arc<Skin>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn scan_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir.read_dir()? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != SKIN_EXTENSION) {
            continue;
        }
        match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => names.push(stem.to_owned()),
            None => log::warn!("skipping skin with non UTF-8 name: {}", path.display()),
        }
    }
    names.sort();
    Ok(names)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn slices_sprite_groups() {
        let spec = Level::Beginner.spec();
        let skin = Skin::from_sheet(&sheet(), &spec).unwrap();

        assert_eq!(skin.numbers[3].dimensions(), (16, 16));
        assert_eq!(skin.numbers[3].get_pixel(5, 5), &number_color(3));
        assert_eq!(skin.icon(Icon::Flag).get_pixel(0, 0), &icon_color(3));
        assert_eq!(skin.digits[0].dimensions(), (11, 21));
        assert_eq!(skin.digit('7').get_pixel(10, 20), &digit_color(7));
        assert_eq!(skin.digit('-').get_pixel(0, 0), &digit_color(10));
        assert_eq!(skin.face(Face::Win).dimensions(), (26, 26));
        assert_eq!(skin.face(Face::Win).get_pixel(3, 3), &face_color(3));
    }

    #[test]
    fn background_scales_with_board() {
        let spec = GameSpec::new(5, 12, 3).unwrap();
        let skin = Skin::from_sheet(&sheet(), &spec).unwrap();

        assert_eq!(skin.background.dimensions(), (12 * 16 + 24, 5 * 16 + 66));
        // left border strip is copied from the sheet, not left silver
        assert_eq!(skin.background.get_pixel(0, 60), &SHEET_BASE);
    }

    #[test]
    fn narrow_board_still_builds_background() {
        let spec = GameSpec::new(2, 1, 1).unwrap();
        let skin = Skin::from_sheet(&sheet(), &spec).unwrap();
        assert_eq!(skin.background.dimensions(), (40, 98));
    }

    #[test]
    fn rejects_small_sheet() {
        let spec = Level::Beginner.spec();
        let err = Skin::from_sheet(&RgbaImage::new(100, 100), &spec).unwrap_err();
        assert!(matches!(err, SkinError::SheetTooSmall { found: (100, 100), .. }));
    }

    #[test]
    fn face_follows_state() {
        assert_eq!(Face::for_state(GameState::Prepare), Face::Smile);
        assert_eq!(Face::for_state(GameState::Gaming), Face::Smile);
        assert_eq!(Face::for_state(GameState::Win), Face::Win);
        assert_eq!(Face::for_state(GameState::Fail), Face::Lose);
    }

    #[test]
    fn missing_directory_scans_empty() {
        let mut manager = SkinManager::new(temp_dir("missing").join("nope"));
        assert!(manager.scan().is_empty());
        assert_eq!(manager.get_by_index(0), None);
        assert_eq!(manager.get_random(), None);
    }

    #[test]
    fn scans_and_selects_skins() {
        let dir = temp_dir("scan");
        sheet().save(dir.join("winxp.bmp")).unwrap();
        sheet().save(dir.join("classic.bmp")).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a skin").unwrap();

        let mut manager = SkinManager::new(&dir);
        assert_eq!(manager.scan(), ["classic", "winxp"]);
        assert_eq!(manager.get_by_index(1), Some("winxp"));
        assert_eq!(manager.get_by_index(9), Some("classic"));
        let random = manager.get_random().unwrap();
        assert!(manager.names().iter().any(|name| name == random));
    }

    #[test]
    fn load_caches_per_board_size() {
        let dir = temp_dir("load");
        sheet().save(dir.join("classic.bmp")).unwrap();
        let mut manager = SkinManager::new(&dir);
        manager.scan();

        let beginner = Level::Beginner.spec();
        let first = manager.load("classic", &beginner).unwrap();
        let again = manager.load("classic", &beginner).unwrap();
        let expert = manager.load("classic", &Level::Expert.spec()).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &expert));
        assert_eq!(first.numbers[1].get_pixel(0, 0), &number_color(1));
    }

    #[test]
    fn load_reports_missing_and_corrupt_sheets() {
        let dir = temp_dir("corrupt");
        std::fs::write(dir.join("broken.bmp"), b"definitely not a bitmap").unwrap();
        let manager = SkinManager::new(&dir);
        let spec = Level::Beginner.spec();

        assert!(matches!(
            manager.load("absent", &spec),
            Err(SkinError::NotFound(name)) if name == "absent"
        ));
        assert!(matches!(
            manager.load("broken", &spec),
            Err(SkinError::Decode { .. })
        ));
    }
}
