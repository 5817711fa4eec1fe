// Gear detection from a logged gear-position channel.
// Gear labels and ratios come from a vehicle configuration document, e.g.
//
//     {"gears": {"0": "N", "1": "1st"}, "ratios": {"0": 0.0, "1": 3.17}}

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::TlmError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Gear {
    pub label: String,
    pub ratio: f64,
}

/// Read-only lookup from gear index to its label and ratio.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GearTable {
    gears: BTreeMap<u32, Gear>,
}

#[derive(Deserialize)]
struct GearConfig {
    gears: HashMap<String, String>,
    ratios: HashMap<String, f64>,
}

impl GearTable {
    /// Build a table with consecutive indices starting at 0.
    pub fn new<L: Into<String>>(gears: Vec<(L, f64)>) -> Self {
        let gears = gears
            .into_iter()
            .zip(0u32..)
            .map(|((label, ratio), idx)| {
                (
                    idx,
                    Gear {
                        label: label.into(),
                        ratio,
                    },
                )
            })
            .collect();
        Self { gears }
    }

    /// Join two aligned mappings (index -> label, index -> ratio).
    pub fn from_maps(
        labels: BTreeMap<u32, String>,
        mut ratios: BTreeMap<u32, f64>,
    ) -> Result<Self, TlmError> {
        let mut gears = BTreeMap::new();
        for (idx, label) in labels {
            let ratio = ratios
                .remove(&idx)
                .ok_or_else(|| TlmError::Config(format!("gear {} has a label but no ratio", idx)))?;
            if !ratio.is_finite() {
                return Err(TlmError::Config(format!(
                    "gear {} has a non-finite ratio",
                    idx
                )));
            }
            gears.insert(idx, Gear { label, ratio });
        }
        if let Some(idx) = ratios.keys().next() {
            return Err(TlmError::Config(format!(
                "gear {} has a ratio but no label",
                idx
            )));
        }
        Ok(Self { gears })
    }

    pub fn from_json_str(text: &str) -> Result<Self, TlmError> {
        let config: GearConfig =
            serde_json::from_str(text).map_err(|e| TlmError::Config(e.to_string()))?;
        let labels = config
            .gears
            .into_iter()
            .map(|(k, v)| Ok((parse_gear_key(&k)?, v)))
            .collect::<Result<BTreeMap<_, _>, TlmError>>()?;
        let ratios = config
            .ratios
            .into_iter()
            .map(|(k, v)| Ok((parse_gear_key(&k)?, v)))
            .collect::<Result<BTreeMap<_, _>, TlmError>>()?;
        let table = Self::from_maps(labels, ratios)?;
        if table.is_empty() {
            warn!("gear configuration defines no gears");
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, TlmError> {
        let text = fs::read_to_string(path)
            .map_err(|e| TlmError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn get(&self, index: u32) -> Option<&Gear> {
        self.gears.get(&index)
    }

    pub fn len(&self) -> usize {
        self.gears.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gears.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Gear)> {
        self.gears.iter().map(|(idx, gear)| (*idx, gear))
    }
}

fn parse_gear_key(key: &str) -> Result<u32, TlmError> {
    key.trim()
        .parse::<u32>()
        .map_err(|_| TlmError::Config(format!("invalid gear index '{}'", key)))
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GearEstimate {
    pub index: u32,
    pub label: String,
    pub ratio: f64,
}

/// Pick the gear the channel spends most samples in and look it up in `table`.
///
/// Ties go to the lowest gear index.
pub fn estimate_gear(channel: &[u32], table: &GearTable) -> Result<GearEstimate, TlmError> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &value in channel {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(u32, usize)> = None;
    let mut tied = false;
    for (&index, &count) in &counts {
        match best {
            Some((_, best_count)) if count < best_count => {}
            Some((_, best_count)) if count == best_count => tied = true,
            _ => {
                best = Some((index, count));
                tied = false;
            }
        }
    }
    let (index, count) = best.ok_or(TlmError::InsufficientData)?;
    if tied {
        warn!(index, count, "gear channel has several equally common values");
    }

    let gear = table.get(index).ok_or(TlmError::UnknownGear { index })?;
    debug!(
        index,
        count,
        samples = channel.len(),
        label = %gear.label,
        "estimated gear"
    );
    Ok(GearEstimate {
        index,
        label: gear.label.clone(),
        ratio: gear.ratio,
    })
}
