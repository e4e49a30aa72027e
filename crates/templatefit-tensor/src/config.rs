//! Configuration for tensor assembly

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use templatefit_core::{Error, Result};
use templatefit_histogram::Normalization;

/// Names of the axes the assembler looks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisNames {
    /// Boson rapidity
    pub rapidity: String,
    /// Boson transverse momentum
    pub qt: String,
    /// Lepton charge
    pub charge: String,
    /// Helicity cross-section components
    pub helicity: String,
    /// Reco-level axes unrolled into fit bins, outermost first
    pub reco: Vec<String>,
    /// Down/up axis of systematic variations
    pub down_up: String,
}

impl Default for AxisNames {
    fn default() -> Self {
        Self {
            rapidity: "Zrap".to_string(),
            qt: "Zpt".to_string(),
            charge: "charge".to_string(),
            helicity: "helicities".to_string(),
            reco: vec!["mueta".to_string(), "mupt".to_string()],
            down_up: "downUpVar".to_string(),
        }
    }
}

impl AxisNames {
    /// Set the reco axes
    pub fn with_reco<S: Into<String>>(mut self, reco: Vec<S>) -> Self {
        self.reco = reco.into_iter().map(Into::into).collect();
        self
    }

    /// Set the down/up axis name
    pub fn with_down_up(mut self, name: impl Into<String>) -> Self {
        self.down_up = name.into();
        self
    }

    /// Whether `name` is one of the axes with a fixed role
    pub fn is_canonical(&self, name: &str) -> bool {
        name == self.rapidity
            || name == self.qt
            || name == self.charge
            || name == self.helicity
            || name == self.down_up
            || self.reco.iter().any(|r| r == name)
    }
}

/// Histogram rewrite applied to every variation of a systematic group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Spread a scale-factor variation over per-eta-bin nuisances
    DecorrelateInEta { sf_axis: String, reco_axis: String },
    /// Map a generator-smearing variation onto reco yields
    RecoTransport { gensmear_variation: String },
    /// Build a down/up pair from a one-sided variation
    Mirror,
}

/// A named systematic uncertainty source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystematicGroupSpec {
    /// Group name
    pub name: String,
    /// Variation names, looked up per process in the histogram store
    pub nuisances: Vec<String>,
    /// Processes the group applies to; empty means the signal only
    #[serde(default)]
    pub processes: Vec<String>,
    /// Pre-transform applied to every variation
    #[serde(default)]
    pub transform: Option<Transform>,
}

impl SystematicGroupSpec {
    /// Create a group with the given nuisances
    pub fn new<S: Into<String>>(name: impl Into<String>, nuisances: Vec<S>) -> Self {
        Self {
            name: name.into(),
            nuisances: nuisances.into_iter().map(Into::into).collect(),
            processes: Vec::new(),
            transform: None,
        }
    }

    /// Restrict the group to the given processes
    pub fn with_processes<S: Into<String>>(mut self, processes: Vec<S>) -> Self {
        self.processes = processes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pre-transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// A background process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSpec {
    /// Process name, also its key in the histogram store
    pub name: String,
    /// Sample normalization; the signal's when absent
    #[serde(default)]
    pub normalization: Option<Normalization>,
}

impl BackgroundSpec {
    /// A background normalized like the signal
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            normalization: None,
        }
    }

    /// Set its own normalization
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = Some(normalization);
        self
    }
}

/// Store key of the helicity cross-section table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistKey {
    pub process: String,
    pub variation: String,
}

impl HistKey {
    pub fn new(process: impl Into<String>, variation: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            variation: variation.into(),
        }
    }
}

/// Everything the assembler needs besides the histograms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Store name of the signal sample
    pub signal_process: String,
    /// Variation name of nominal histograms
    pub nominal_variation: String,
    /// Background processes, appended after the signals
    pub backgrounds: Vec<BackgroundSpec>,
    /// Location of the cross-section table
    pub xsec: HistKey,
    /// Charge whose rows enter the tensors
    pub selected_charge: f64,
    /// Systematic groups, in output order
    pub groups: Vec<SystematicGroupSpec>,
    /// Nuisances not profiled in the fit
    pub noprofile: Vec<String>,
    /// Nuisances without a constraint term
    pub noconstraint: Vec<String>,
    /// Nuisances of interest, by group
    pub noi_groups: IndexMap<String, Vec<String>>,
    /// Masked channel names, carried to the output
    pub masked_channels: Vec<String>,
    /// Seed of the pseudo-data generator
    pub seed: u64,
    /// Signal sample normalization
    pub normalization: Normalization,
    /// Axis names
    pub axes: AxisNames,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            signal_process: "signal".to_string(),
            nominal_variation: "nominal".to_string(),
            backgrounds: Vec::new(),
            xsec: HistKey::new("xsec", "helicity"),
            selected_charge: 1.0,
            groups: Vec::new(),
            noprofile: Vec::new(),
            noconstraint: Vec::new(),
            noi_groups: IndexMap::new(),
            masked_channels: Vec::new(),
            seed: 0,
            normalization: Normalization::default(),
            axes: AxisNames::default(),
        }
    }
}

impl AssemblyConfig {
    /// Parse from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Check settings that do not depend on the histograms
    pub fn validate(&self) -> Result<()> {
        if !self.selected_charge.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "selected charge must be finite, got {}",
                self.selected_charge
            )));
        }
        if self.axes.reco.is_empty() {
            return Err(Error::InvalidParameter(
                "at least one reco axis is required".to_string(),
            ));
        }
        for (i, group) in self.groups.iter().enumerate() {
            if self.groups[..i].iter().any(|g| g.name == group.name) {
                return Err(Error::InvalidParameter(format!(
                    "systematic group {} listed twice",
                    group.name
                )));
            }
            if group.nuisances.is_empty() {
                return Err(Error::InvalidParameter(format!(
                    "systematic group {} has no nuisances",
                    group.name
                )));
            }
        }
        for (i, bkg) in self.backgrounds.iter().enumerate() {
            if bkg.name == self.signal_process || self.backgrounds[..i].iter().any(|b| b.name == bkg.name) {
                return Err(Error::InvalidParameter(format!(
                    "background {} listed twice",
                    bkg.name
                )));
            }
        }
        self.normalization.factor()?;
        Ok(())
    }

    pub fn with_signal_process(mut self, name: impl Into<String>) -> Self {
        self.signal_process = name.into();
        self
    }

    pub fn with_background(mut self, background: BackgroundSpec) -> Self {
        self.backgrounds.push(background);
        self
    }

    pub fn with_xsec(mut self, process: impl Into<String>, variation: impl Into<String>) -> Self {
        self.xsec = HistKey::new(process, variation);
        self
    }

    pub fn with_selected_charge(mut self, charge: f64) -> Self {
        self.selected_charge = charge;
        self
    }

    pub fn with_group(mut self, group: SystematicGroupSpec) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_noprofile<S: Into<String>>(mut self, names: Vec<S>) -> Self {
        self.noprofile = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_noconstraint<S: Into<String>>(mut self, names: Vec<S>) -> Self {
        self.noconstraint = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_noi_group<S: Into<String>>(mut self, name: impl Into<String>, nuisances: Vec<S>) -> Self {
        self.noi_groups
            .insert(name.into(), nuisances.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_masked_channels<S: Into<String>>(mut self, names: Vec<S>) -> Self {
        self.masked_channels = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_axes(mut self, axes: AxisNames) -> Self {
        self.axes = axes;
        self
    }
}
