//! Overlay layout and template resource loading.
//!
//! This module handles:
//! - The fixed overlay anchors (name, prescription body, date)
//! - Optional recalibration of those anchors from `layout.json`
//! - Unit conversion for dimensions (mm, cm, in, pt)
//! - Reading the bundled `prescription.pdf` template

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::GenerateError;

/// File name of the template inside the assets directory.
pub const TEMPLATE_FILE_NAME: &str = "prescription.pdf";

/// File name of the optional layout override inside the assets directory.
pub const LAYOUT_FILE_NAME: &str = "layout.json";

/// A length in PDF points.
///
/// Deserializes from a number (points) or a string with unit,
/// e.g. `"100 mm"`, `"10 cm"`, `"1 in"`, `"12 pt"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    pub fn as_points(&self) -> f64 {
        self.0
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(s.len());
        let (number, unit) = s.split_at(split);

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("invalid number in dimension: {:?}", number.trim()))?;

        // 1 inch = 72 points
        let factor = match unit.trim().to_lowercase().as_str() {
            "" | "pt" | "point" | "points" => 1.0,
            "mm" => 72.0 / 25.4,
            "cm" => 72.0 / 2.54,
            "in" | "inch" | "inches" => 72.0,
            other => {
                return Err(format!(
                    "unknown unit '{}'. Supported: mm, cm, in, pt",
                    other
                ))
            }
        };

        Ok(Dimension(value * factor))
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl serde::de::Visitor<'_> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number of points or a string with unit (e.g. \"12 mm\")")
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Dimension, E> {
                Ok(Dimension(value as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Dimension, E> {
                Ok(Dimension(value as f64))
            }

            fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Dimension, E> {
                Ok(Dimension(value))
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Dimension, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DimensionVisitor)
    }
}

/// Placement of one text overlay.
///
/// `x`/`y` is the top-left corner of the text box in native page
/// coordinates (origin bottom-left), the box extends `h` downward.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct OverlaySpec {
    pub x: Dimension,
    pub y: Dimension,
    #[serde(default = "default_box_width")]
    pub w: Dimension,
    #[serde(default = "default_box_height")]
    pub h: Dimension,
}

impl OverlaySpec {
    pub const fn at(x: f64, y: f64) -> Self {
        Self {
            x: Dimension(x),
            y: Dimension(y),
            w: Dimension(400.0),
            h: Dimension(200.0),
        }
    }
}

fn default_box_width() -> Dimension {
    Dimension(400.0)
}

fn default_box_height() -> Dimension {
    Dimension(200.0)
}

fn default_font_size() -> Dimension {
    Dimension(12.0)
}

/// Anchors for the three overlays, calibrated against the bundled template.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Layout {
    #[serde(default = "Layout::default_name")]
    pub name: OverlaySpec,
    #[serde(default = "Layout::default_prescription")]
    pub prescription: OverlaySpec,
    #[serde(default = "Layout::default_date")]
    pub date: OverlaySpec,
    #[serde(default = "default_font_size")]
    pub font_size: Dimension,
}

impl Layout {
    fn default_name() -> OverlaySpec {
        OverlaySpec::at(130.0, 621.0)
    }

    fn default_prescription() -> OverlaySpec {
        OverlaySpec::at(140.0, 570.0)
    }

    fn default_date() -> OverlaySpec {
        OverlaySpec::at(94.0, 380.0)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            prescription: Self::default_prescription(),
            date: Self::default_date(),
            font_size: default_font_size(),
        }
    }
}

/// Paths of the bundled resources.
#[derive(Debug, Clone)]
pub struct Assets {
    pub dir: PathBuf,
}

impl Assets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn template_path(&self) -> PathBuf {
        self.dir.join(TEMPLATE_FILE_NAME)
    }

    pub fn layout_path(&self) -> PathBuf {
        self.dir.join(LAYOUT_FILE_NAME)
    }

    /// Load `layout.json` if present, the built-in anchors otherwise.
    pub fn load_layout(&self) -> Result<Layout> {
        let path = self.layout_path();
        if !path.exists() {
            tracing::debug!("No {} in {:?}, using built-in anchors", LAYOUT_FILE_NAME, self.dir);
            return Ok(Layout::default());
        }
        load_layout(&path)
    }
}

pub fn load_layout(path: &Path) -> Result<Layout> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open layout at {:?}", path))?;
    let layout: Layout = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(layout)
}

/// Read the template bytes, distinguishing a missing file from an unreadable one.
pub fn load_template(path: &Path) -> Result<Vec<u8>, GenerateError> {
    if !path.is_file() {
        return Err(GenerateError::TemplateNotFound(path.to_path_buf()));
    }
    std::fs::read(path)
        .map_err(|e| GenerateError::TemplateLoad(format!("failed to read {:?}: {}", path, e)))
}
