use serde::{Deserialize, Serialize};
use std::fmt;

/// Counties whose offices accept forwarded property requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum County {
    Carroll,
    Gallatin,
    Henry,
    Owen,
    Trimble,
}

const CARROLL_CITIES: &[&str] = &["Carrollton", "Ghent", "Prestonville", "Sanders", "Worthville"];

impl County {
    pub const ALL: [County; 5] = [
        County::Carroll,
        County::Gallatin,
        County::Henry,
        County::Owen,
        County::Trimble,
    ];

    /// Case-insensitive lookup; inner whitespace is collapsed first.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = normalize_key(raw)?;
        Self::ALL
            .into_iter()
            .find(|county| county.name().eq_ignore_ascii_case(&key))
    }

    pub fn name(self) -> &'static str {
        match self {
            County::Carroll => "Carroll",
            County::Gallatin => "Gallatin",
            County::Henry => "Henry",
            County::Owen => "Owen",
            County::Trimble => "Trimble",
        }
    }

    /// Cities a request must pick from. Empty when the county takes any city.
    pub fn cities(self) -> &'static [&'static str] {
        match self {
            County::Carroll => CARROLL_CITIES,
            _ => &[],
        }
    }

    pub fn requires_city(self) -> bool {
        !self.cities().is_empty()
    }

    fn canonical_city(self, raw: &str) -> Option<&'static str> {
        let key = normalize_key(raw)?;
        self.cities()
            .iter()
            .copied()
            .find(|city| city.eq_ignore_ascii_case(&key))
    }
}

impl fmt::Display for County {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// County office a request can be forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Office {
    Pva,
    Zoning,
}

impl Office {
    pub fn label(self) -> &'static str {
        match self {
            Office::Pva => "PVA",
            Office::Zoning => "Zoning",
        }
    }
}

/// Raw request body for `/api/send-requests`.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default = "selected_by_default")]
    pub send_to_pva: bool,
    #[serde(default = "selected_by_default")]
    pub send_to_zoning: bool,
}

fn selected_by_default() -> bool {
    true
}

/// A request that passed validation; city is canonical for counties with a fixed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRequest {
    pub address: String,
    pub county: County,
    pub city: Option<String>,
    pub property_id: Option<String>,
    pub offices: Vec<Office>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("address is required")]
    MissingAddress,
    #[error("county is required")]
    MissingCounty,
    #[error("county '{0}' is not served")]
    UnknownCounty(String),
    #[error("{county} county requires a city: one of {choices}")]
    CityRequired {
        county: County,
        choices: String,
    },
    #[error("'{city}' is not a city in {county} county")]
    UnknownCity { county: County, city: String },
    #[error("select at least one office")]
    NoOfficeSelected,
}

impl DispatchRequest {
    pub fn validate(self) -> Result<PropertyRequest, DispatchError> {
        let address = self.address.trim().to_string();
        if address.is_empty() {
            return Err(DispatchError::MissingAddress);
        }

        let county_raw = self.county.trim();
        if county_raw.is_empty() {
            return Err(DispatchError::MissingCounty);
        }
        let county = County::parse(county_raw)
            .ok_or_else(|| DispatchError::UnknownCounty(county_raw.to_string()))?;

        let provided = self
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty());
        let city = if county.requires_city() {
            let Some(raw) = provided else {
                return Err(DispatchError::CityRequired {
                    county,
                    choices: county.cities().join(", "),
                });
            };
            let canonical = county
                .canonical_city(raw)
                .ok_or_else(|| DispatchError::UnknownCity {
                    county,
                    city: raw.to_string(),
                })?;
            Some(canonical.to_string())
        } else {
            provided
                .map(str::to_string)
                .or_else(|| infer_city(&address))
        };

        let mut offices = Vec::with_capacity(2);
        if self.send_to_pva {
            offices.push(Office::Pva);
        }
        if self.send_to_zoning {
            offices.push(Office::Zoning);
        }
        if offices.is_empty() {
            return Err(DispatchError::NoOfficeSelected);
        }

        let property_id = self
            .property_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Ok(PropertyRequest {
            address,
            county,
            city,
            property_id,
            offices,
        })
    }
}

/// Guesses the city from a `street, city, state zip` address.
pub fn infer_city(address: &str) -> Option<String> {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() >= 2 {
        Some(parts[parts.len() - 2].to_string())
    } else {
        None
    }
}

/// Lookup key: surrounding whitespace trimmed, inner runs collapsed, lowercased.
pub fn normalize_key(raw: &str) -> Option<String> {
    let key = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        None
    } else {
        Some(key.to_lowercase())
    }
}
