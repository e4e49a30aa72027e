//! Tensor assembly
//!
//! [`TensorAssembler`] pulls every template it needs from a
//! [`HistogramStore`], lays them out over the canonical binning and computes
//! the fit tensors together with the process and nuisance group tables.
//!
//! The systematic tensor is built one group at a time and concatenated at the
//! end, so raw variation histograms never outlive the group that uses them.

use crate::config::{AssemblyConfig, SystematicGroupSpec, Transform};
use crate::grouping::{
    build_helicity_groups, build_helicity_meta_groups, build_sum_groups,
    build_systematic_group_index, IndexGroups,
};
use crate::statistics::{kstat, log_kappa_pair, poisson_pseudodata};
use crate::templates::{nuisance_labels, Binning, Pivoted, Role};
use indexmap::IndexMap;
use ndarray::{concatenate, s, Array1, Array2, Array4, ArrayView4, Axis as ArrayAxis, Zip};
use std::collections::HashSet;
use templatefit_core::{Error, Result};
use templatefit_histogram::{
    decorrelate_in_eta, mirror, reco_transport, Histogram, HistogramOps, HistogramStore, Scaled,
};
use tracing::{debug, info, instrument};

/// Cross-section placeholder of background processes
pub const BACKGROUND_XSEC: f64 = -1.0;

/// A process as seen by the assembler
#[derive(Debug, Clone)]
struct Source {
    /// Store name of the sample
    sample: String,
    /// Template scale factor
    factor: f64,
    role: Role,
    /// First column of the process in `norm`
    first_column: usize,
    /// Number of columns (signal processes, or one)
    columns: usize,
}

/// All process and nuisance group tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTables {
    /// Systematic groups over nuisances
    pub syst: IndexGroups,
    /// Charge groups over processes; always empty here
    pub charge: IndexGroups,
    /// Polarization groups over processes; always empty here
    pub pol: IndexGroups,
    /// Helicity groups over processes
    pub hel: IndexGroups,
    /// Sum groups over processes
    pub sum: IndexGroups,
    /// Charge-meta groups over sum groups; always empty here
    pub charge_meta: IndexGroups,
    /// Ratio-meta groups over sum groups; always empty here
    pub ratio_meta: IndexGroups,
    /// Helicity-meta groups over sum groups
    pub hel_meta: IndexGroups,
    /// Regularization groups over processes; always empty here
    pub reg: IndexGroups,
    /// Nuisance-of-interest groups over nuisances
    pub noi: IndexGroups,
}

/// Everything written to the fit container
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Process names, signals first
    pub procs: Vec<String>,
    /// Signal process names
    pub signals: Vec<String>,
    /// Nuisance labels, in group order
    pub systs: Vec<String>,
    pub noprofile: Vec<String>,
    pub noconstraint: Vec<String>,
    pub masked_channels: Vec<String>,
    /// Number of helicity labels
    pub nhel: usize,
    pub groups: GroupTables,
    /// `[bins + 1, nproc]`, trailing row holds cross sections
    pub norm: Array2<f64>,
    /// `[bins + 1, nproc, 2, nsyst]`, `{logkavg, logkhalfdiff}` on axis 2
    pub logk: Array4<f64>,
    pub sumw: Array1<f64>,
    pub sumw2: Array1<f64>,
    pub kstat: Array1<f64>,
    pub data_obs: Array1<f64>,
    /// `[nsyst]`, 0 for unconstrained nuisances
    pub constraint_weights: Array1<f64>,
}

impl Assembly {
    /// Number of reco bins
    pub fn nbins(&self) -> usize {
        self.sumw.len()
    }

    pub fn nproc(&self) -> usize {
        self.procs.len()
    }

    pub fn nsignals(&self) -> usize {
        self.signals.len()
    }

    pub fn nsyst(&self) -> usize {
        self.systs.len()
    }
}

/// Builds an [`Assembly`] from a histogram store
pub struct TensorAssembler<'a, S: HistogramStore + ?Sized> {
    store: &'a S,
    config: &'a AssemblyConfig,
}

impl<'a, S: HistogramStore + ?Sized> TensorAssembler<'a, S> {
    pub fn new(store: &'a S, config: &'a AssemblyConfig) -> Self {
        Self { store, config }
    }

    /// Run the whole assembly
    #[instrument(skip(self), fields(signal = %self.config.signal_process, seed = self.config.seed))]
    pub fn assemble(&self) -> Result<Assembly> {
        let config = self.config;
        config.validate()?;

        let signal_factor = config.normalization.factor()?;
        let signal_store = Scaled::new(self.store, signal_factor);
        let nominal = signal_store.get(&config.signal_process, &config.nominal_variation)?;
        let binning = Binning::from_signal_nominal(&nominal, &config.axes, config.selected_charge)?;
        let nbins = binning.nbins();
        let nsignals = binning.nsignals();
        debug!(
            "{}: {} signal processes over {} reco bins",
            config.signal_process, nsignals, nbins
        );

        let signal_ids = binning.signal_ids();
        let signals: Vec<String> = signal_ids.iter().map(ToString::to_string).collect();
        let mut procs = signals.clone();
        procs.extend(config.backgrounds.iter().map(|b| b.name.clone()));
        let nproc = procs.len();

        let sources = self.sources(signal_factor, nsignals)?;

        // Nominal yields and cross sections
        let mut norm = Array2::<f64>::zeros((nbins + 1, nproc));
        let signal_rows = binning
            .pivot(&nominal, Role::Signal, None)?
            .into_nominal_rows()?;
        norm.slice_mut(s![..nbins, ..nsignals]).assign(&signal_rows.t());
        let xsec = self.store.get(&config.xsec.process, &config.xsec.variation)?;
        let xsec_row = binning.xsec_row(&xsec)?;
        norm.slice_mut(s![nbins, ..nsignals])
            .assign(&Array1::from(xsec_row));
        drop(signal_rows);

        let (sumw, sumw2) = self.asimov(&binning, &nominal)?;
        drop(nominal);

        for source in sources.iter().filter(|s| s.role == Role::Background) {
            let store = Scaled::new(self.store, source.factor);
            let hist = store.get(&source.sample, &config.nominal_variation)?;
            let row = binning.pivot(&hist, Role::Background, None)?.into_nominal_rows()?;
            norm.slice_mut(s![..nbins, source.first_column])
                .assign(&row.row(0));
            norm[[nbins, source.first_column]] = BACKGROUND_XSEC;
        }

        // Systematics, one group at a time
        let mut group_tensors: Vec<Array4<f64>> = Vec::with_capacity(config.groups.len());
        let mut group_labels: IndexMap<String, Vec<String>> = IndexMap::new();
        for group in &config.groups {
            let (labels, tensor) = self.systematic_group(group, &sources, &binning, &norm)?;
            debug!(
                "{}: {} nuisances over {} processes",
                group.name,
                labels.len(),
                group_processes(group, &config.signal_process).len()
            );
            if !labels.is_empty() {
                group_labels.insert(group.name.clone(), labels);
                group_tensors.push(tensor);
            }
        }

        let systs: Vec<String> = group_labels.values().flatten().cloned().collect();
        if let Some(label) = first_duplicate(&systs) {
            return Err(Error::DuplicateNuisance(label));
        }
        let logk = if group_tensors.is_empty() {
            Array4::zeros((nbins + 1, nproc, 2, 0))
        } else {
            let views: Vec<ArrayView4<f64>> = group_tensors.iter().map(|t| t.view()).collect();
            concatenate(ArrayAxis(3), &views)?
        };
        drop(group_tensors);

        // Nuisance flags
        let known = |names: &[String]| -> Result<Vec<String>> {
            for name in names {
                if !systs.contains(name) {
                    return Err(Error::UnknownNuisance(name.clone()));
                }
            }
            Ok(names.to_vec())
        };
        let noprofile = known(&config.noprofile)?;
        let noconstraint = known(&config.noconstraint)?;
        let constraint_weights: Array1<f64> = systs
            .iter()
            .map(|s| if noconstraint.contains(s) { 0.0 } else { 1.0 })
            .collect();

        // Group tables
        let helicities = binning.helicities();
        let hel_groups = build_helicity_groups(binning.y_labels(), binning.qt_labels(), &helicities);
        let sum_groups = build_sum_groups(
            binning.y_labels(),
            binning.qt_labels(),
            &helicities,
            &signal_ids,
        );
        let meta_groups =
            build_helicity_meta_groups(binning.y_labels(), binning.qt_labels(), &sum_groups);
        let sum = IndexGroups::resolve(&sum_groups, &procs, Error::UnknownProcess)?;
        let hel_meta = IndexGroups::resolve(&meta_groups, &sum.names, Error::UnknownProcess)?;
        let noi_groups: IndexMap<String, Vec<String>> = config
            .noi_groups
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(name, members)| (name.clone(), members.clone()))
            .collect();
        let groups = GroupTables {
            syst: build_systematic_group_index(&group_labels, &systs)?,
            hel: IndexGroups::resolve(&hel_groups, &procs, Error::UnknownProcess)?,
            sum,
            hel_meta,
            noi: IndexGroups::resolve(&noi_groups, &systs, Error::UnknownNuisance)?,
            ..GroupTables::default()
        };

        let kstat = kstat(sumw.view(), sumw2.view())?;
        let data_obs = poisson_pseudodata(sumw.view(), config.seed)?;

        info!(
            "Assembled {} processes ({} signals), {} nuisances, {} bins",
            nproc,
            nsignals,
            systs.len(),
            nbins
        );

        Ok(Assembly {
            procs,
            signals,
            systs,
            noprofile,
            noconstraint,
            masked_channels: config.masked_channels.clone(),
            nhel: binning.nhel(),
            groups,
            norm,
            logk,
            sumw,
            sumw2,
            kstat,
            data_obs,
            constraint_weights,
        })
    }

    fn sources(&self, signal_factor: f64, nsignals: usize) -> Result<Vec<Source>> {
        let mut sources = vec![Source {
            sample: self.config.signal_process.clone(),
            factor: signal_factor,
            role: Role::Signal,
            first_column: 0,
            columns: nsignals,
        }];
        for (i, bkg) in self.config.backgrounds.iter().enumerate() {
            let factor = match &bkg.normalization {
                Some(n) => n.factor()?,
                None => signal_factor,
            };
            sources.push(Source {
                sample: bkg.name.clone(),
                factor,
                role: Role::Background,
                first_column: nsignals + i,
                columns: 1,
            });
        }
        Ok(sources)
    }

    /// Per-bin yield and variance of the signal, summed over the signal axes
    fn asimov(&self, binning: &Binning, nominal: &Histogram) -> Result<(Array1<f64>, Array1<f64>)> {
        let axes = &self.config.axes;
        let projected = nominal.project_out(&[
            axes.rapidity.as_str(),
            axes.qt.as_str(),
            axes.helicity.as_str(),
        ])?;
        let variances = projected.variances().cloned().ok_or_else(|| {
            Error::InvalidInput(format!(
                "nominal {} has no variances for sumw2",
                nominal.name()
            ))
        })?;
        let variance_hist = Histogram::new(
            projected.name(),
            projected.axes().to_vec(),
            variances,
            None,
        )?;

        let sumw = binning
            .pivot(&projected, Role::Background, None)?
            .into_nominal_rows()?
            .row(0)
            .to_owned();
        let sumw2 = binning
            .pivot(&variance_hist, Role::Background, None)?
            .into_nominal_rows()?
            .row(0)
            .to_owned();
        Ok((sumw, sumw2))
    }

    /// Nuisance labels and `[bins + 1, nproc, 2, nsyst_g]` tensor of one group
    #[instrument(skip(self, sources, binning, norm), fields(group = %group.name))]
    fn systematic_group(
        &self,
        group: &SystematicGroupSpec,
        sources: &[Source],
        binning: &Binning,
        norm: &Array2<f64>,
    ) -> Result<(Vec<String>, Array4<f64>)> {
        let (nrows, nproc) = norm.dim();
        let mut expected: Option<Vec<String>> = None;
        let mut tensor: Option<Array4<f64>> = None;

        for process in group_processes(group, &self.config.signal_process) {
            let source = sources
                .iter()
                .find(|s| s.sample == process)
                .ok_or_else(|| Error::UnknownProcess(process.to_string()))?;

            let mut labels = Vec::new();
            let mut blocks = Vec::with_capacity(group.nuisances.len());
            for nuisance in &group.nuisances {
                let hist = self.variation(source, group, nuisance)?;
                let pivoted = binning.pivot(&hist, source.role, Some(&self.config.axes.down_up))?;
                drop(hist);
                labels.extend(nuisance_labels(nuisance, &pivoted.extras));
                blocks.push(pivoted);
            }

            if let Some(first) = &expected {
                if *first != labels {
                    return Err(Error::InvalidInput(format!(
                        "process {} realizes nuisances {:?} in group {}, expected {:?}",
                        source.sample, labels, group.name, first
                    )));
                }
            } else {
                tensor = Some(Array4::zeros((nrows, nproc, 2, labels.len())));
                expected = Some(labels);
            }

            if let Some(tensor) = tensor.as_mut() {
                let mut offset = 0;
                for block in blocks {
                    let width = block.values.dim().1;
                    write_log_kappa(tensor, &block, norm, source, offset)?;
                    offset += width;
                }
            }
        }

        let labels = expected.unwrap_or_default();
        let tensor = tensor.unwrap_or_else(|| Array4::zeros((nrows, nproc, 2, 0)));
        Ok((labels, tensor))
    }

    /// Fetch one variation of a process and apply the group's pre-transform
    fn variation(
        &self,
        source: &Source,
        group: &SystematicGroupSpec,
        nuisance: &str,
    ) -> Result<Histogram> {
        let store = Scaled::new(self.store, source.factor);
        let variation = store.get(&source.sample, nuisance)?;
        let Some(transform) = &group.transform else {
            return Ok(variation);
        };
        let nominal = store.get(&source.sample, &self.config.nominal_variation)?;
        match transform {
            Transform::DecorrelateInEta { sf_axis, reco_axis } => {
                decorrelate_in_eta(&nominal, &variation, sf_axis, reco_axis)
            }
            Transform::RecoTransport { gensmear_variation } => {
                let gensmear = store.get(&source.sample, gensmear_variation)?;
                reco_transport(&variation, &nominal, &gensmear)
            }
            Transform::Mirror => mirror(&nominal, &variation, &self.config.axes.down_up),
        }
    }
}

fn first_duplicate(labels: &[String]) -> Option<String> {
    let mut seen = HashSet::with_capacity(labels.len());
    labels
        .iter()
        .find(|label| !seen.insert(label.as_str()))
        .cloned()
}

/// Processes a group applies to; the signal sample when none are listed
fn group_processes<'g>(group: &'g SystematicGroupSpec, signal: &'g str) -> Vec<&'g str> {
    if group.processes.is_empty() {
        vec![signal]
    } else {
        group.processes.iter().map(String::as_str).collect()
    }
}

/// Fill the `{logkavg, logkhalfdiff}` entries of one pivoted variation
fn write_log_kappa(
    tensor: &mut Array4<f64>,
    block: &Pivoted,
    norm: &Array2<f64>,
    source: &Source,
    offset: usize,
) -> Result<()> {
    let (rows, width, nbins, _) = block.values.dim();
    if rows != source.columns {
        return Err(Error::size_mismatch(source.columns, rows, &source.sample));
    }
    let columns = source.first_column..source.first_column + rows;
    let nominal = norm
        .slice(s![..nbins, columns.clone()])
        .insert_axis(ArrayAxis(2));
    let nominal = nominal
        .broadcast((nbins, rows, width))
        .ok_or_else(|| Error::shape_mismatch(&[nbins, rows, width], nominal.shape(), "nominal"))?;

    // [rows, width, bins] -> [bins, rows, width]
    let down = block
        .values
        .index_axis(ArrayAxis(3), 0)
        .permuted_axes([2, 0, 1]);
    let up = block
        .values
        .index_axis(ArrayAxis(3), 1)
        .permuted_axes([2, 0, 1]);

    let mut target = tensor.slice_mut(s![..nbins, columns, .., offset..offset + width]);
    let (avg, half) = target.multi_slice_mut((s![.., .., 0, ..], s![.., .., 1, ..]));
    Zip::from(avg)
        .and(half)
        .and(&down)
        .and(&up)
        .and(&nominal)
        .for_each(|a, h, &d, &u, &n| {
            let (avg, half) = log_kappa_pair(d, u, n);
            *a = avg;
            *h = half;
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackgroundSpec;
    use approx::assert_relative_eq;
    use ndarray::{ArrayD, Dimension, IxDyn};
    use templatefit_histogram::{Axis, MemoryStore, Normalization};

    fn signal_axes() -> Vec<Axis> {
        vec![
            Axis::variable("Zrap", vec![0.0, 0.4]).unwrap(),
            Axis::variable("Zpt", vec![0.0, 3.0]).unwrap(),
            Axis::variable("mueta", vec![-1.0, 0.0, 1.0]).unwrap(),
            Axis::variable("mupt", vec![25.0, 35.0]).unwrap(),
            Axis::variable("charge", vec![-2.0, 0.0, 2.0]).unwrap(),
            Axis::category("helicities", vec!["L", "A"]),
        ]
    }

    fn filled(axes: Vec<Axis>, f: impl Fn(&[usize]) -> f64, with_variances: bool) -> Histogram {
        let shape: Vec<usize> = axes.iter().map(Axis::len).collect();
        let values = ArrayD::from_shape_fn(IxDyn(&shape), |idx| f(idx.slice()));
        let variances = with_variances.then(|| values.clone());
        Histogram::new("h", axes, values, variances).unwrap()
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let nominal = filled(signal_axes(), |i| 10.0 + i[2] as f64 + i[5] as f64, true);
        store.insert("signal", "nominal", nominal);

        let mut var_axes = signal_axes();
        var_axes.push(Axis::category("downUpVar", vec!["down", "up"]));
        let variation = filled(
            var_axes,
            |i| {
                let nom = 10.0 + i[2] as f64 + i[5] as f64;
                if i[6] == 0 { nom / 1.1 } else { nom * 1.1 }
            },
            false,
        );
        store.insert("signal", "scale_var", variation);

        let xsec = filled(
            vec![
                Axis::variable("Zrap", vec![0.0, 0.4, 0.8]).unwrap(),
                Axis::variable("Zpt", vec![0.0, 3.0, 6.0]).unwrap(),
                Axis::category("helicities", vec!["L", "A"]),
            ],
            |i| 100.0 + i[2] as f64,
            false,
        );
        store.insert("xsec", "helicity", xsec);

        let bkg_axes = vec![
            Axis::variable("charge", vec![-2.0, 0.0, 2.0]).unwrap(),
            Axis::variable("mueta", vec![-1.0, 0.0, 1.0]).unwrap(),
            Axis::variable("mupt", vec![25.0, 35.0]).unwrap(),
        ];
        store.insert("ttbar", "nominal", filled(bkg_axes, |i| i[1] as f64 * 5.0, true));
        store
    }

    #[test]
    fn test_assemble_small() {
        let store = store();
        let config = AssemblyConfig::default()
            .with_background(BackgroundSpec::new("ttbar").with_normalization(Normalization::new(2.0, 1.0, 1000.0)))
            .with_group(SystematicGroupSpec::new("scale", vec!["scale_var"]))
            .with_noconstraint(vec!["scale_var"]);
        let assembly = TensorAssembler::new(&store, &config).assemble().unwrap();

        assert_eq!(assembly.procs, vec!["helXsec_L_y_0.2_qt_1.5", "helXsec_A_y_0.2_qt_1.5", "ttbar"]);
        assert_eq!(assembly.nbins(), 2);
        assert_eq!(assembly.norm.dim(), (3, 3));
        assert_eq!(assembly.norm[[0, 1]], 11.0);
        assert_eq!(assembly.norm[[2, 0]], 100.0);
        assert_eq!(assembly.norm[[2, 1]], 101.0);
        assert_eq!(assembly.norm[[1, 2]], 10.0);
        assert_eq!(assembly.norm[[2, 2]], BACKGROUND_XSEC);

        assert_eq!(assembly.sumw.to_vec(), vec![21.0, 23.0]);
        assert_eq!(assembly.sumw2.to_vec(), vec![21.0, 23.0]);
        assert_relative_eq!(assembly.kstat[0], 21.0);

        assert_eq!(assembly.systs, vec!["scale_var"]);
        assert_eq!(assembly.logk.dim(), (3, 3, 2, 1));
        for b in 0..2 {
            for p in 0..2 {
                assert_relative_eq!(assembly.logk[[b, p, 0, 0]], (1.1f64).ln(), epsilon = 1e-12);
                assert_relative_eq!(assembly.logk[[b, p, 1, 0]], 0.0, epsilon = 1e-12);
            }
            assert_eq!(assembly.logk[[b, 2, 0, 0]], 0.0);
        }
        assert_eq!(assembly.constraint_weights.to_vec(), vec![0.0]);
        assert_eq!(assembly.groups.syst.members, vec![vec![0]]);
        assert_eq!(assembly.groups.hel.members, vec![vec![0, 1]]);
    }

    #[test]
    fn test_missing_variation_is_fatal() {
        let store = store();
        let config =
            AssemblyConfig::default().with_group(SystematicGroupSpec::new("scale", vec!["nope"]));
        assert!(matches!(
            TensorAssembler::new(&store, &config).assemble(),
            Err(Error::MissingHistogram { .. })
        ));
    }

    #[test]
    fn test_unknown_flag_is_fatal() {
        let store = store();
        let config = AssemblyConfig::default()
            .with_group(SystematicGroupSpec::new("scale", vec!["scale_var"]))
            .with_noprofile(vec!["other"]);
        assert!(matches!(
            TensorAssembler::new(&store, &config).assemble(),
            Err(Error::UnknownNuisance(name)) if name == "other"
        ));
    }
}
