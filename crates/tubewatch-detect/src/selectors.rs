use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Embedded selector catalog.
const EMBEDDED_CATALOG: &str = include_str!("../data/selectors.toml");

/// What a probe's matches mean to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeRole {
    /// A visible match means an advertisement occupies the player.
    AdMarker,
    /// The element whose class list carries the player's ad state.
    PlayerContainer,
    /// Rendered duration text.
    Duration,
}

/// A named CSS selector with the role it plays in detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeDef {
    /// Stable name used when merging catalogs.
    pub name: String,
    pub role: ProbeRole,
    /// CSS selector, as accepted by `document.querySelector`.
    pub selector: String,
    /// Whether this probe is consulted.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Wrapper for TOML deserialization.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    ad_classes: Vec<String>,
    #[serde(rename = "probe", default)]
    probes: Vec<ProbeDef>,
}

/// Catalog of page probes, in priority order.
#[derive(Debug, Clone)]
pub struct SelectorCatalog {
    probes: Vec<ProbeDef>,
    compiled: Vec<Selector>,
    ad_classes: Vec<String>,
}

impl SelectorCatalog {
    /// Load the embedded catalog.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_CATALOG).expect("embedded selectors.toml should be valid")
    }

    /// Load a catalog from a TOML string, compiling every selector.
    pub fn from_toml(toml_str: &str) -> Result<Self, DetectError> {
        let file: CatalogFile = toml::from_str(toml_str)?;
        let compiled = file
            .probes
            .iter()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            probes: file.probes,
            compiled,
            ad_classes: file.ad_classes,
        })
    }

    /// Merge a user catalog into this one.
    /// Probes with matching names are replaced; new probes are appended.
    /// A non-empty user `ad_classes` list replaces the current one.
    pub fn merge_user(&mut self, user: &SelectorCatalog) {
        for (i, user_probe) in user.probes.iter().enumerate() {
            if let Some(pos) = self.probes.iter().position(|p| p.name == user_probe.name) {
                self.probes[pos] = user_probe.clone();
                self.compiled[pos] = user.compiled[i].clone();
            } else {
                self.probes.push(user_probe.clone());
                self.compiled.push(user.compiled[i].clone());
            }
        }
        if !user.ad_classes.is_empty() {
            self.ad_classes = user.ad_classes.clone();
        }
    }

    /// Enabled probes with the given role, in catalog order.
    pub fn probes(&self, role: ProbeRole) -> impl Iterator<Item = (&ProbeDef, &Selector)> {
        self.probes
            .iter()
            .zip(self.compiled.iter())
            .filter(move |(p, _)| p.enabled && p.role == role)
    }

    /// Selector strings with the given role, in catalog order.
    pub fn selectors(&self, role: ProbeRole) -> Vec<&str> {
        self.probes(role).map(|(p, _)| p.selector.as_str()).collect()
    }

    /// Every compiled probe, regardless of role or state.
    pub fn all(&self) -> impl Iterator<Item = (&ProbeDef, &Selector)> {
        self.probes.iter().zip(self.compiled.iter())
    }

    /// Player-container classes that mean an ad is showing.
    pub fn ad_classes(&self) -> &[String] {
        &self.ad_classes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self::embedded()
    }
}

fn compile(probe: &ProbeDef) -> Result<Selector, DetectError> {
    Selector::parse(&probe.selector).map_err(|_| DetectError::Selector {
        name: probe.name.clone(),
        selector: probe.selector.clone(),
    })
}
