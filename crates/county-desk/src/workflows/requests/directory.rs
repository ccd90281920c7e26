use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::domain::{normalize_key, Office};
use crate::config::DispatchConfig;

/// PVA and Zoning addresses for one location. Missing roles fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recipients {
    pub pva: Option<String>,
    pub zoning: Option<String>,
}

impl Recipients {
    pub fn new(pva: impl Into<String>, zoning: impl Into<String>) -> Self {
        Self {
            pva: Some(pva.into()),
            zoning: Some(zoning.into()),
        }
    }

    pub fn for_office(&self, office: Office) -> Option<&str> {
        match office {
            Office::Pva => self.pva.as_deref(),
            Office::Zoning => self.zoning.as_deref(),
        }
    }

    fn is_empty(&self) -> bool {
        self.pva.is_none() && self.zoning.is_none()
    }

    fn over(&self, defaults: &Recipients) -> Recipients {
        Recipients {
            pva: self.pva.clone().or_else(|| defaults.pva.clone()),
            zoning: self.zoning.clone().or_else(|| defaults.zoning.clone()),
        }
    }
}

/// Which mapping produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingSource {
    County,
    City,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub recipients: Recipients,
    pub source: MappingSource,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read recipient mappings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed recipient mappings: {0}")]
    Csv(#[from] csv::Error),
}

/// Recipient lookup keyed by normalized county and city names.
///
/// County entries take precedence over city entries; both are merged over the defaults.
#[derive(Debug, Clone)]
pub struct RecipientDirectory {
    counties: BTreeMap<String, Recipients>,
    cities: BTreeMap<String, Recipients>,
    defaults: Recipients,
}

impl RecipientDirectory {
    /// Directory with no mappings; every lookup resolves to `defaults`.
    pub fn new(defaults: Recipients) -> Self {
        Self {
            counties: BTreeMap::new(),
            cities: BTreeMap::new(),
            defaults,
        }
    }

    /// Directory seeded with the offices this desk serves out of the box.
    pub fn with_builtin_mappings(defaults: Recipients) -> Self {
        let mut directory = Self::new(defaults);
        directory.insert_county(
            "Carroll",
            Recipients::new("pva@carroll.example.gov", "zoning@carrollton.example.gov"),
        );
        for (city, pva, zoning) in [
            ("Warsaw", "pva@gallatin.example.gov", "zoning@warsaw.example.gov"),
            ("New Castle", "pva@henry.example.gov", "zoning@newcastle.example.gov"),
            ("Owenton", "pva@owen.example.gov", "zoning@owenton.example.gov"),
            ("Bedford", "pva@trimble.example.gov", "zoning@bedford.example.gov"),
        ] {
            directory.insert_city(city, Recipients::new(pva, zoning));
        }
        directory
    }

    /// Built-in mappings plus the optional CSV overrides named in configuration.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, DirectoryError> {
        let defaults = Recipients::new(
            config.default_pva_email.clone(),
            config.default_zoning_email.clone(),
        );
        let mut directory = Self::with_builtin_mappings(defaults);
        if let Some(path) = &config.mappings_csv {
            directory.load_csv(path)?;
        }
        Ok(directory)
    }

    pub fn insert_county(&mut self, name: &str, recipients: Recipients) {
        if let Some(key) = normalize_key(name) {
            self.counties.insert(key, recipients);
        }
    }

    pub fn insert_city(&mut self, name: &str, recipients: Recipients) {
        if let Some(key) = normalize_key(name) {
            self.cities.insert(key, recipients);
        }
    }

    pub fn defaults(&self) -> &Recipients {
        &self.defaults
    }

    /// Merges a mappings file. A missing file is not an error; it merges nothing.
    pub fn load_csv(&mut self, path: &Path) -> Result<usize, DirectoryError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "recipient mappings file not found");
                return Ok(0);
            }
            Err(source) => {
                return Err(DirectoryError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let merged = self.merge_csv(file)?;
        info!(path = %path.display(), merged, "recipient mappings loaded");
        Ok(merged)
    }

    /// Merges `type,key,pva_email,zoning_email` rows where `type` is `city` or `county`.
    ///
    /// Short rows, rows without any address and unknown types are skipped; later rows
    /// replace earlier entries for the same key. Returns the number of rows merged.
    pub fn merge_csv<R: Read>(&mut self, reader: R) -> Result<usize, DirectoryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut merged = 0;
        for record in csv_reader.records() {
            let row = record?;
            if row.len() < 2 {
                continue;
            }
            let kind = row.get(0).unwrap_or_default().to_lowercase();
            let key = row.get(1).unwrap_or_default();
            let recipients = Recipients {
                pva: non_blank(row.get(2)),
                zoning: non_blank(row.get(3)),
            };
            if recipients.is_empty() {
                continue;
            }
            match kind.as_str() {
                "city" => self.insert_city(key, recipients),
                "county" => self.insert_county(key, recipients),
                other => {
                    debug!(kind = other, "skipping mapping row with unknown type");
                    continue;
                }
            }
            merged += 1;
        }
        Ok(merged)
    }

    /// Resolves recipients in county, city, default order.
    pub fn resolve(&self, county: Option<&str>, city: Option<&str>) -> Resolution {
        if let Some(recipients) = county
            .and_then(normalize_key)
            .and_then(|key| self.counties.get(&key))
        {
            return Resolution {
                recipients: recipients.over(&self.defaults),
                source: MappingSource::County,
            };
        }
        if let Some(recipients) = city
            .and_then(normalize_key)
            .and_then(|key| self.cities.get(&key))
        {
            return Resolution {
                recipients: recipients.over(&self.defaults),
                source: MappingSource::City,
            };
        }
        Resolution {
            recipients: self.defaults.clone(),
            source: MappingSource::Default,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Recipients {
        Recipients::new("pva@example.com", "zoning@example.com")
    }

    #[test]
    fn county_mapping_wins_over_city() {
        let directory = RecipientDirectory::with_builtin_mappings(defaults());
        let resolution = directory.resolve(Some(" carroll "), Some("Warsaw"));
        assert_eq!(resolution.source, MappingSource::County);
        assert_eq!(
            resolution.recipients.pva.as_deref(),
            Some("pva@carroll.example.gov")
        );
    }

    #[test]
    fn city_mapping_used_when_county_unmapped() {
        let directory = RecipientDirectory::with_builtin_mappings(defaults());
        let resolution = directory.resolve(Some("Henry"), Some("new   castle"));
        assert_eq!(resolution.source, MappingSource::City);
        assert_eq!(
            resolution.recipients.zoning.as_deref(),
            Some("zoning@newcastle.example.gov")
        );
    }

    #[test]
    fn unknown_location_falls_back_to_defaults() {
        let directory = RecipientDirectory::with_builtin_mappings(defaults());
        let resolution = directory.resolve(Some("Owen"), Some("Nowhere"));
        assert_eq!(resolution.source, MappingSource::Default);
        assert_eq!(resolution.recipients, defaults());
        assert_eq!(directory.resolve(None, None).recipients, defaults());
    }

    #[test]
    fn csv_rows_merge_and_partial_roles_fall_back() {
        let mut directory = RecipientDirectory::new(defaults());
        let csv = "type,key,pva_email,zoning_email\n\
                   city,Sparta,pva@sparta.example.gov,\n\
                   county,Gallatin,,zoning@gallatin.example.gov\n\
                   city\n\
                   city,Glencoe,,\n\
                   region,North,pva@north.example.gov,zoning@north.example.gov\n\
                   county,  gallatin ,pva@gallatin.example.gov,zoning@gallatin.example.gov\n";
        let merged = directory.merge_csv(csv.as_bytes()).expect("csv parses");
        assert_eq!(merged, 3);

        let sparta = directory.resolve(None, Some("SPARTA"));
        assert_eq!(sparta.source, MappingSource::City);
        assert_eq!(
            sparta.recipients,
            Recipients::new("pva@sparta.example.gov", "zoning@example.com")
        );

        let gallatin = directory.resolve(Some("Gallatin"), None);
        assert_eq!(
            gallatin.recipients,
            Recipients::new("pva@gallatin.example.gov", "zoning@gallatin.example.gov")
        );
        assert_eq!(directory.resolve(None, Some("Glencoe")).source, MappingSource::Default);
    }

    #[test]
    fn missing_mappings_file_merges_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut directory = RecipientDirectory::new(defaults());
        let merged = directory
            .load_csv(&dir.path().join("mappings.csv"))
            .expect("missing file tolerated");
        assert_eq!(merged, 0);
    }

    #[test]
    fn from_config_loads_csv_overrides() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("mappings.csv");
        std::fs::write(&path, "county,Carroll,pva@override.example.gov,\n").expect("write");

        let directory = RecipientDirectory::from_config(&DispatchConfig {
            mappings_csv: Some(path),
            default_pva_email: "pva@example.com".to_string(),
            default_zoning_email: "zoning@example.com".to_string(),
        })
        .expect("directory builds");

        let resolution = directory.resolve(Some("Carroll"), Some("Ghent"));
        assert_eq!(
            resolution.recipients,
            Recipients::new("pva@override.example.gov", "zoning@example.com")
        );
    }
}
