//! Gazetteer loading, validation, and the normalised lookup indexes.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::GeoError;

/// One place in the gazetteer file.
#[derive(Debug, Clone, Deserialize)]
pub struct GazetteerEntry {
    pub name: String,
    /// Region classification label the analytics rollups group by.
    pub region: String,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// On-disk shape of `config/gazetteer.yaml`.
#[derive(Debug, Deserialize)]
pub struct GazetteerFile {
    /// Region label assigned to unresolved texts. `unknown` when omitted.
    pub default_region: Option<String>,
    /// Shorthand → canonical place name (`NYC` → `New York`, state codes).
    #[serde(default)]
    pub abbreviations: HashMap<String, String>,
    pub places: Vec<GazetteerEntry>,
}

/// Validated gazetteer with lookup indexes over normalised keys.
#[derive(Debug)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    /// Case-folded name/alias → entry index. The exact layer.
    index: HashMap<String, usize>,
    /// Diacritic-stripped, punctuation-scrubbed key → entry index. The
    /// fuzzy layer.
    scrubbed_index: HashMap<String, usize>,
    /// Normalised shorthand → entry index.
    abbreviations: HashMap<String, usize>,
    default_region: String,
}

/// Load and validate the gazetteer from a YAML file.
///
/// # Errors
///
/// Returns [`GeoError`] if the file cannot be read, parsed, or fails
/// validation (empty names, duplicate keys, out-of-range coordinates,
/// dangling abbreviations).
pub fn load_gazetteer(path: &Path) -> Result<Gazetteer, GeoError> {
    let content = std::fs::read_to_string(path).map_err(|e| GeoError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: GazetteerFile = serde_yaml::from_str(&content)?;
    let gazetteer = Gazetteer::from_file(file)?;
    tracing::info!(
        places = gazetteer.entries.len(),
        path = %path.display(),
        "gazetteer loaded"
    );
    Ok(gazetteer)
}

impl Gazetteer {
    /// Build the lookup indexes from a parsed file.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Validation`] describing the first problem found.
    pub fn from_file(file: GazetteerFile) -> Result<Self, GeoError> {
        if file.places.is_empty() {
            return Err(GeoError::Validation(
                "gazetteer must contain at least one place".to_string(),
            ));
        }

        let mut index = HashMap::new();
        let mut scrubbed_index = HashMap::new();
        let mut seen = HashSet::new();

        for (i, entry) in file.places.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(GeoError::Validation(format!(
                    "place at position {i} has an empty name"
                )));
            }
            validate_coordinates(entry)?;

            for key_source in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let key = normalize_key(key_source);
                if key.is_empty() {
                    return Err(GeoError::Validation(format!(
                        "place '{}' has an empty alias",
                        entry.name
                    )));
                }
                if !seen.insert(key.clone()) {
                    return Err(GeoError::Validation(format!(
                        "duplicate place key '{key}' (from '{}')",
                        entry.name
                    )));
                }
                index.insert(key.clone(), i);
                scrubbed_index.entry(scrub(key_source)).or_insert(i);
            }
        }

        let mut abbreviations = HashMap::new();
        for (short, target) in &file.abbreviations {
            let Some(&i) = index.get(&normalize_key(target)) else {
                return Err(GeoError::Validation(format!(
                    "abbreviation '{short}' points at unknown place '{target}'"
                )));
            };
            abbreviations.insert(normalize_key(short), i);
        }

        Ok(Self {
            entries: file.places,
            index,
            scrubbed_index,
            abbreviations,
            default_region: file
                .default_region
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    #[must_use]
    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn exact(&self, text: &str) -> Option<&GazetteerEntry> {
        self.index
            .get(&normalize_key(text))
            .map(|&i| &self.entries[i])
    }

    pub(crate) fn scrubbed(&self, text: &str) -> Option<&GazetteerEntry> {
        self.scrubbed_index
            .get(&scrub(text))
            .map(|&i| &self.entries[i])
    }

    pub(crate) fn abbreviation(&self, text: &str) -> Option<&GazetteerEntry> {
        self.abbreviations
            .get(&normalize_key(text))
            .map(|&i| &self.entries[i])
    }
}

fn validate_coordinates(entry: &GazetteerEntry) -> Result<(), GeoError> {
    match (entry.latitude, entry.longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(GeoError::Validation(format!(
                    "place '{}' has latitude {lat} outside [-90, 90]",
                    entry.name
                )));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(GeoError::Validation(format!(
                    "place '{}' has longitude {lon} outside [-180, 180]",
                    entry.name
                )));
            }
            Ok(())
        }
        _ => Err(GeoError::Validation(format!(
            "place '{}' has only one of latitude/longitude",
            entry.name
        ))),
    }
}

/// Case-fold and collapse whitespace. The exact-layer key.
pub(crate) fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fuzzy-layer key: case-fold, strip diacritics, drop punctuation,
/// collapse whitespace.
pub(crate) fn scrub(text: &str) -> String {
    let folded: String = text.chars().map(fold_diacritic).collect();
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    normalize_key(&cleaned)
}

/// Fold the Latin accented characters that show up in place names. Anything
/// else passes through unchanged.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other,
    }
}
