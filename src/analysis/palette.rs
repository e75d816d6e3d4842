//! Stable colors for model names across figures.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Category10 followed by further high-contrast colors.
pub const MODEL_COLORS: [&str; 24] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf", "#00008f", "#b5005e", "#00d7ff", "#7a4900", "#003e00", "#ff2aff",
    "#958c73", "#5d00b8", "#00a48d", "#ff8579", "#3b2c3b", "#a0d0ff", "#a09e00", "#5b5566",
];

/// Model name -> hex color.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelPalette(BTreeMap<String, String>);

impl ModelPalette {
    pub fn color(&self, model_name: &str) -> Option<&str> {
        self.0.get(model_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, color)| (name.as_str(), color.as_str()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                operation: format!("create {}", parent.display()),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create {}", path.display()),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            operation: format!("open {}", path.display()),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Assign colors to the distinct names in reverse lexicographic order,
/// cycling through [`MODEL_COLORS`].
///
/// # Examples
///
/// ```
/// use costometer::analysis::generate_model_palette;
///
/// let palette = generate_model_palette(["Full", "Null", "Full"]);
/// assert_eq!(palette.len(), 2);
/// assert_eq!(palette.color("Null"), Some("#1f77b4"));
/// assert_eq!(palette.color("Full"), Some("#ff7f0e"));
/// ```
pub fn generate_model_palette<I, S>(model_names: I) -> ModelPalette
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = model_names.into_iter().map(Into::into).collect();
    names.sort_unstable_by(|a, b| b.cmp(a));
    names.dedup();

    ModelPalette(
        names
            .into_iter()
            .zip(MODEL_COLORS.iter().cycle())
            .map(|(name, color)| (name, (*color).to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_cycle_past_the_palette() {
        let names: Vec<String> = (0..30).map(|i| format!("model {i:02}")).collect();
        let palette = generate_model_palette(names);
        assert_eq!(palette.len(), 30);
        assert_eq!(palette.color("model 29"), Some(MODEL_COLORS[0]));
        assert_eq!(palette.color("model 05"), Some(MODEL_COLORS[0]));
    }

    #[test]
    fn palette_round_trips_through_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data/exp_models_palette.json");
        let palette = generate_model_palette(["Full", "No depth", "Null"]);
        palette.save(&path).unwrap();
        assert_eq!(ModelPalette::load(&path).unwrap(), palette);
    }
}
