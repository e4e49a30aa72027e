//! Fit-tensor assembly from histogram templates
//!
//! Turns nominal and systematic-variation histograms into the tensors of a
//! binned likelihood fit:
//!
//! - `norm` `[bins + 1, nproc]`: nominal yields with a trailing cross-section row
//! - `logk` `[bins + 1, nproc, 2, nsyst]`: `{logkavg, logkhalfdiff}` log-kappas
//! - `sumw`, `sumw2`, `kstat`, `data_obs` `[bins]`
//! - `constraint_weights` `[nsyst]`
//!
//! together with the process and nuisance groupings used to aggregate fit
//! results (helicity, sum, helicity-meta, systematic and nuisance-of-interest
//! groups).
//!
//! ```no_run
//! use templatefit_histogram::MemoryStore;
//! use templatefit_tensor::{AssemblyConfig, SystematicGroupSpec, TensorAssembler};
//!
//! let store = MemoryStore::from_json_file("templates.json")?;
//! let config = AssemblyConfig::default()
//!     .with_group(SystematicGroupSpec::new("mass", vec!["mass_var"]))
//!     .with_seed(42);
//! let assembly = TensorAssembler::new(&store, &config).assemble()?;
//! println!("{} processes, {} nuisances", assembly.nproc(), assembly.nsyst());
//! # Ok::<(), templatefit_core::Error>(())
//! ```

pub mod assembler;
pub mod config;
pub mod grouping;
pub mod statistics;
pub mod templates;

pub use assembler::{Assembly, GroupTables, TensorAssembler, BACKGROUND_XSEC};
pub use config::{
    AssemblyConfig, AxisNames, BackgroundSpec, HistKey, SystematicGroupSpec, Transform,
};
pub use grouping::{
    build_helicity_groups, build_helicity_meta_groups, build_sum_groups,
    build_systematic_group_index, HelicityGroupKey, IndexGroups, IndexLayout, MetaGroupKey,
    SignalId, SumGroupKey,
};
pub use statistics::{kstat, log_kappa, log_kappa_pair, poisson_pseudodata, LOGK_EPSILON};
pub use templates::{nuisance_labels, Binning, Pivoted, Role};
