//! Shader package persistence.
//!
//! A shader package bundles a pixel function with its render settings and
//! texture channel paths in one YAML file:
//!
//! ```yaml
//! Render_Settings:
//!   Width: 800
//!   Height: 600
//!   Bloom: false
//!   Gamma: 2.2
//!   Exposure: 1.0
//! Textures:
//!   - Slot: 0
//!     Path: textures/noise.png
//! Code: |
//!   fn pixel(uv: vec2f, pixcoord: vec2f) -> vec4f { ... }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render_graph::clamp_extent;
use crate::shader_factory::DEFAULT_PIXEL_CODE;
use crate::texture::CHANNEL_COUNT;

/// Largest output dimension the viewer accepts.
pub const MAX_OUTPUT_SIZE: u32 = 4096;

/// Errors from loading or saving a shader package.
#[derive(Debug)]
pub enum SettingsError {
    /// File could not be read or written.
    Io(std::io::Error),
    /// File is not valid YAML or has mistyped fields.
    Yaml(serde_yaml::Error),
    /// File has no `Render_Settings` section.
    MissingRenderSettings,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Yaml(e) => write!(f, "YAML error: {}", e),
            SettingsError::MissingRenderSettings => write!(f, "missing Render_Settings section"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(e) => Some(e),
            SettingsError::Yaml(e) => Some(e),
            SettingsError::MissingRenderSettings => None,
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_yaml::Error> for SettingsError {
    fn from(e: serde_yaml::Error) -> Self {
        SettingsError::Yaml(e)
    }
}

// On-disk layout

#[derive(Debug, Serialize, Deserialize)]
struct PackageFile {
    #[serde(rename = "Render_Settings")]
    render_settings: Option<RenderSettingsDef>,
    #[serde(rename = "Textures", default)]
    textures: Vec<TextureDef>,
    #[serde(rename = "Code", default)]
    code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RenderSettingsDef {
    #[serde(rename = "Width")]
    width: i64,
    #[serde(rename = "Height")]
    height: i64,
    #[serde(rename = "Bloom")]
    bloom: bool,
    #[serde(rename = "Gamma")]
    gamma: f32,
    #[serde(rename = "Exposure")]
    exposure: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextureDef {
    #[serde(rename = "Slot")]
    slot: i64,
    #[serde(rename = "Path")]
    path: String,
}

/// A pixel shader with its persisted render settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderPackage {
    pub width: u32,
    pub height: u32,
    pub gamma: f32,
    pub exposure: f32,
    pub bloom_enabled: bool,
    /// Image path per texture channel; empty for none.
    pub textures: [String; CHANNEL_COUNT],
    pub code: String,
}

impl Default for ShaderPackage {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            gamma: 2.2,
            exposure: 1.0,
            bloom_enabled: false,
            textures: Default::default(),
            code: DEFAULT_PIXEL_CODE.to_string(),
        }
    }
}

impl ShaderPackage {
    /// Parse a package from YAML text.
    ///
    /// Fields absent from the file keep their defaults, except
    /// `Render_Settings`, which is required.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        let file: PackageFile = serde_yaml::from_str(yaml)?;
        let settings = file
            .render_settings
            .ok_or(SettingsError::MissingRenderSettings)?;

        let mut package = Self::default();
        let (width, height) = clamp_extent(settings.width, settings.height);
        package.width = width.min(MAX_OUTPUT_SIZE);
        package.height = height.min(MAX_OUTPUT_SIZE);
        package.bloom_enabled = settings.bloom;
        package.gamma = settings.gamma;
        package.exposure = settings.exposure;

        for texture in file.textures {
            match usize::try_from(texture.slot) {
                Ok(slot) if slot < CHANNEL_COUNT => package.textures[slot] = texture.path,
                _ => log::warn!(
                    "Ignoring texture '{}' in slot {}: slots are 0..{}",
                    texture.path,
                    texture.slot,
                    CHANNEL_COUNT
                ),
            }
        }

        if let Some(code) = file.code {
            package.code = code;
        }

        Ok(package)
    }

    /// Serialize to YAML text.
    pub fn to_yaml_string(&self) -> Result<String, SettingsError> {
        let file = PackageFile {
            render_settings: Some(RenderSettingsDef {
                width: self.width as i64,
                height: self.height as i64,
                bloom: self.bloom_enabled,
                gamma: self.gamma,
                exposure: self.exposure,
            }),
            textures: self
                .textures
                .iter()
                .enumerate()
                .map(|(slot, path)| TextureDef {
                    slot: slot as i64,
                    path: path.clone(),
                })
                .collect(),
            code: Some(self.code.clone()),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Load a package from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Load a package, falling back to defaults if the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let package = Self::load(path)?;
        log::info!("Loaded settings from {:?}", path);
        Ok(package)
    }

    /// Write the package to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        fs::write(path, self.to_yaml_string()?)?;
        log::info!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("shadervis-{}-{}.yaml", std::process::id(), name))
    }

    #[test]
    fn file_round_trip() {
        let path = temp_path("round-trip");
        let mut package = ShaderPackage::default();
        package.bloom_enabled = true;
        package.textures[2] = "noise.png".to_string();
        package.code = "fn pixel(uv: vec2f, p: vec2f) -> vec4f {\n    return vec4f(1.0);\n}\n".into();

        package.save(&path).unwrap();
        let loaded = ShaderPackage::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.width, 800);
        assert_eq!(loaded.height, 600);
        assert_eq!(loaded.gamma, 2.2);
        assert_eq!(loaded.exposure, 1.0);
        assert!(loaded.bloom_enabled);
        assert_eq!(loaded, package);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_path("does-not-exist");
        let package = ShaderPackage::load_or_default(&path).unwrap();
        assert_eq!(package, ShaderPackage::default());
    }

    #[test]
    fn missing_render_settings_is_rejected() {
        let err = ShaderPackage::from_yaml_str("Code: \"x\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::MissingRenderSettings));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let err = ShaderPackage::from_yaml_str("Render_Settings: [1, 2").unwrap_err();
        assert!(matches!(err, SettingsError::Yaml(_)));
    }

    #[test]
    fn textures_and_code_are_optional() {
        let yaml = "Render_Settings: { Width: 320, Height: 240, Bloom: false, Gamma: 1.0, Exposure: 2.0 }\n";
        let package = ShaderPackage::from_yaml_str(yaml).unwrap();
        assert_eq!((package.width, package.height), (320, 240));
        assert_eq!(package.exposure, 2.0);
        assert_eq!(package.code, DEFAULT_PIXEL_CODE);
        assert!(package.textures.iter().all(String::is_empty));
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let yaml = r#"
Render_Settings: { Width: 800, Height: 600, Bloom: false, Gamma: 2.2, Exposure: 1.0 }
Textures:
  - { Slot: 1, Path: a.png }
  - { Slot: 8, Path: b.png }
  - { Slot: -1, Path: c.png }
"#;
        let package = ShaderPackage::from_yaml_str(yaml).unwrap();
        assert_eq!(package.textures[1], "a.png");
        assert_eq!(package.textures.iter().filter(|p| !p.is_empty()).count(), 1);
    }

    #[test]
    fn dimensions_are_clamped() {
        let yaml = "Render_Settings: { Width: 0, Height: 100000, Bloom: true, Gamma: 2.2, Exposure: 1.0 }\n";
        let package = ShaderPackage::from_yaml_str(yaml).unwrap();
        assert_eq!((package.width, package.height), (1, MAX_OUTPUT_SIZE));
    }
}
