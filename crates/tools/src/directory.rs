//! Office directory: the service offices of the ten Addis Ababa sub-cities.
//!
//! The built-in directory is static reference data; lookups are
//! case-insensitive and ignore spacing and punctuation, so "nifas silk lafto"
//! and "Nifas Silk-Lafto" resolve to the same woreda.

use serde::{Deserialize, Serialize};

use crate::domain::ServiceDomain;

struct WoredaInfo {
    name: &'static str,
    landmark: &'static str,
    exchange: &'static str,
    latitude: f64,
    longitude: f64,
}

const WOREDAS: [WoredaInfo; 10] = [
    WoredaInfo { name: "Addis Ketema", landmark: "Near Merkato", exchange: "777", latitude: 9.0330, longitude: 38.7360 },
    WoredaInfo { name: "Arada", landmark: "Piassa, near St. George Cathedral", exchange: "111", latitude: 9.0370, longitude: 38.7520 },
    WoredaInfo { name: "Bole", landmark: "Bole Road, near Edna Mall", exchange: "661", latitude: 8.9950, longitude: 38.7890 },
    WoredaInfo { name: "Gullele", landmark: "Shiro Meda", exchange: "279", latitude: 9.0650, longitude: 38.7330 },
    WoredaInfo { name: "Kirkos", landmark: "Kazanchis", exchange: "515", latitude: 9.0150, longitude: 38.7630 },
    WoredaInfo { name: "Kolfe Keranio", landmark: "Kolfe Roundabout", exchange: "278", latitude: 9.0150, longitude: 38.6960 },
    WoredaInfo { name: "Lideta", landmark: "Near Lideta Church", exchange: "551", latitude: 9.0100, longitude: 38.7390 },
    WoredaInfo { name: "Nifas Silk-Lafto", landmark: "Lafto Roundabout", exchange: "471", latitude: 8.9650, longitude: 38.7420 },
    WoredaInfo { name: "Yeka", landmark: "Megenagna", exchange: "646", latitude: 9.0200, longitude: 38.8010 },
    WoredaInfo { name: "Akaki Kality", landmark: "Kality Square", exchange: "434", latitude: 8.8920, longitude: 38.7750 },
];

/// Canonical woreda names, in directory order.
pub fn woreda_names() -> Vec<&'static str> {
    WOREDAS.iter().map(|w| w.name).collect()
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve free-form user input to a canonical woreda name.
pub fn canonical_woreda(input: &str) -> Option<&'static str> {
    let wanted = normalize(input);
    if wanted.is_empty() {
        return None;
    }
    WOREDAS
        .iter()
        .find(|w| normalize(w.name) == wanted)
        .map(|w| w.name)
}

/// A service office's contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeRecord {
    pub name: String,
    pub woreda: String,
    pub service: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Lookup of offices by service domain and woreda.
#[derive(Debug, Clone)]
pub struct OfficeDirectory {
    offices: Vec<(ServiceDomain, OfficeRecord)>,
}

impl OfficeDirectory {
    /// One office per domain per woreda.
    pub fn builtin() -> Self {
        let mut offices = Vec::with_capacity(WOREDAS.len() * ServiceDomain::ALL.len());
        for woreda in &WOREDAS {
            for domain in ServiceDomain::ALL {
                offices.push((domain, office_for(domain, woreda)));
            }
        }
        Self { offices }
    }

    pub fn lookup(&self, domain: ServiceDomain, woreda: &str) -> Option<&OfficeRecord> {
        let canonical = canonical_woreda(woreda)?;
        self.offices
            .iter()
            .find(|(d, o)| *d == domain && o.woreda == canonical)
            .map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.offices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offices.is_empty()
    }
}

impl Default for OfficeDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

fn office_for(domain: ServiceDomain, woreda: &WoredaInfo) -> OfficeRecord {
    let (title, line) = match domain {
        ServiceDomain::Emergency => ("Emergency Response Center", "0911"),
        ServiceDomain::Power => ("Power Office", "2345"),
        ServiceDomain::Sanitation => ("Sanitation Office", "3456"),
        ServiceDomain::Infrastructure => ("Infrastructure Office", "1234"),
        ServiceDomain::Utility => ("Utility Office", "4567"),
    };
    let woreda_slug: String = woreda
        .name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();

    OfficeRecord {
        name: format!("{} {}", woreda.name, title),
        woreda: woreda.name.to_string(),
        service: domain.label().to_string(),
        phone: format!("+251-11-{}{}", woreda.exchange, line),
        email: format!("{}.{}@addisababa.gov.et", domain.slug(), woreda_slug),
        address: woreda.landmark.to_string(),
        latitude: woreda.latitude,
        longitude: woreda.longitude,
    }
}
