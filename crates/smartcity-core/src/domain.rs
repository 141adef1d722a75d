//! Data domains tracked by the dashboard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named category of records.
///
/// The string form doubles as the collection name in the record store, the
/// URL segment under `/api/`, and the prefix of every cache key that belongs
/// to the domain (`air:latest`, `traffic:history:50`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "air")]
    Air,
    #[serde(rename = "traffic")]
    Traffic,
    #[serde(rename = "waste")]
    Waste,
    #[serde(rename = "energy")]
    Energy,
    #[serde(rename = "incidents")]
    Incident,
    #[serde(rename = "complaints")]
    Complaint,
    #[serde(rename = "announcements")]
    Announcement,
}

impl Domain {
    /// Every domain, in display order.
    pub const ALL: [Domain; 7] = [
        Domain::Air,
        Domain::Traffic,
        Domain::Waste,
        Domain::Energy,
        Domain::Incident,
        Domain::Complaint,
        Domain::Announcement,
    ];

    /// Domains fed by sensors. These expose `latest` and `history` views.
    pub const SENSORS: [Domain; 4] = [Domain::Air, Domain::Traffic, Domain::Waste, Domain::Energy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Air => "air",
            Domain::Traffic => "traffic",
            Domain::Waste => "waste",
            Domain::Energy => "energy",
            Domain::Incident => "incidents",
            Domain::Complaint => "complaints",
            Domain::Announcement => "announcements",
        }
    }

    /// Returns `true` for sensor-fed domains.
    pub fn is_sensor(&self) -> bool {
        Self::SENSORS.contains(self)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "air" => Ok(Domain::Air),
            "traffic" => Ok(Domain::Traffic),
            "waste" => Ok(Domain::Waste),
            "energy" => Ok(Domain::Energy),
            "incidents" => Ok(Domain::Incident),
            "complaints" => Ok(Domain::Complaint),
            "announcements" => Ok(Domain::Announcement),
            other => Err(CoreError::unknown_domain(other)),
        }
    }
}
