use anyhow::{Context, Result, ensure};
use minesweep_core::{DEFAULT_SCALE, GameSpec, Level, MAX_SCALE};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Contents of the optional TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub skins_dir: Option<PathBuf>,
    pub default_skin: Option<String>,
    pub scale: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub levels: BTreeMap<String, GameSpec>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        if let Some(scale) = config.scale {
            ensure!(
                (1..=MAX_SCALE).contains(&scale),
                "scale must be between 1 and {MAX_SCALE}, got {scale}"
            );
        }
        Ok(config)
    }
}

/// Effective settings once the config file and command line are merged.
#[derive(Debug)]
pub struct Settings {
    pub skins_dir: PathBuf,
    /// Skin name or index into the discovered skins, the first skin when unset.
    pub skin: Option<String>,
    pub scale: u32,
    pub output_dir: PathBuf,
    pub levels: BTreeMap<String, GameSpec>,
    pub spec: GameSpec,
    pub seed: Option<u64>,
}

impl From<FileConfig> for Settings {
    fn from(file: FileConfig) -> Self {
        Self {
            skins_dir: file.skins_dir.unwrap_or_else(|| PathBuf::from("skins")),
            skin: file.default_skin,
            scale: file.scale.unwrap_or(DEFAULT_SCALE),
            output_dir: file.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            levels: file.levels,
            spec: Level::default().spec(),
            seed: None,
        }
    }
}

impl Settings {
    /// Looks `name` up in the custom levels first, then in the built-in presets.
    pub fn level(&self, name: &str) -> Option<GameSpec> {
        self.levels
            .get(name)
            .copied()
            .or_else(|| name.parse::<Level>().ok().map(Level::spec))
    }

    pub fn level_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = Level::ALL.iter().map(|level| level.name()).collect();
        let custom: Vec<_> = self
            .levels
            .keys()
            .map(String::as_str)
            .filter(|name| !names.contains(name))
            .collect();
        names.extend(custom);
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::from(FileConfig::parse("").unwrap());

        assert_eq!(settings.skins_dir, PathBuf::from("skins"));
        assert_eq!(settings.scale, DEFAULT_SCALE);
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.spec, Level::Beginner.spec());
        assert!(settings.skin.is_none());
    }

    #[test]
    fn reads_custom_levels() {
        let file = FileConfig::parse(
            r#"
            skins_dir = "/srv/skins"
            default_skin = "classic"
            scale = 2

            [levels.tiny]
            rows = 3
            cols = 4
            mines = 2

            [levels.expert]
            rows = 20
            cols = 40
            mines = 150
            "#,
        )
        .unwrap();
        let settings = Settings::from(file);

        assert_eq!(settings.skin.as_deref(), Some("classic"));
        assert_eq!(settings.scale, 2);
        assert_eq!(settings.level("tiny"), Some(GameSpec::new(3, 4, 2).unwrap()));
        assert_eq!(settings.level("expert"), Some(GameSpec::new(20, 40, 150).unwrap()));
        assert_eq!(settings.level("Intermediate"), Some(Level::Intermediate.spec()));
        assert_eq!(settings.level("huge"), None);
        assert_eq!(
            settings.level_names(),
            ["beginner", "intermediate", "expert", "tiny"]
        );
    }

    #[test]
    fn rejects_out_of_range_scale() {
        for bad in ["scale = 0", "scale = 17", "scale = 30000000"] {
            let err = FileConfig::parse(bad).unwrap_err();
            assert!(err.to_string().contains("scale must be between 1 and 16"), "{err:#}");
        }
        assert_eq!(FileConfig::parse("scale = 16").unwrap().scale, Some(16));
    }

    #[test]
    fn rejects_impossible_levels() {
        let err = FileConfig::parse("[levels.bad]\nrows = 3\ncols = 3\nmines = 9\n").unwrap_err();
        assert!(format!("{err:#}").contains("Too many mines"), "{err:#}");
        assert!(FileConfig::parse("colour = \"red\"").is_err());
    }
}
