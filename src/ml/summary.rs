// ============================================================
// Layer 5 — Parameter Summaries
// ============================================================
// Walks a module and reports one line per float parameter:
// its shape, and on request mean / std / min / max of its
// values. Logged at start-up and at every log interval so a
// run can be checked for dead or exploding weights.

use burn::{
    module::{ModuleVisitor, ParamId},
    prelude::*,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSummary {
    /// Position of the parameter in module traversal order
    pub index: usize,
    pub shape: Vec<usize>,
    pub stats: Option<ParamStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamStats {
    pub mean: f64,
    pub std:  f64,
    pub min:  f64,
    pub max:  f64,
}

impl ParamStats {
    pub fn from_values(values: &[f32]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
        Some(Self { mean, std: var.sqrt(), min, max })
    }
}

/// Shapes only
pub fn list_params<B: Backend, M: Module<B>>(module: &M) -> Vec<ParamSummary> {
    let mut collector = Collector { with_stats: false, out: Vec::new() };
    module.visit(&mut collector);
    collector.out
}

/// Shapes and value statistics. Reads every weight back from the
/// device, so keep it to the periodic log points.
pub fn summarize_params<B: Backend, M: Module<B>>(module: &M) -> Vec<ParamSummary> {
    let mut collector = Collector { with_stats: true, out: Vec::new() };
    module.visit(&mut collector);
    collector.out
}

/// Shape-only lines go to INFO, statistics to DEBUG
pub fn log_summaries(summaries: &[ParamSummary]) {
    for s in summaries {
        match s.stats {
            Some(st) => tracing::debug!(
                "param[{:>2}] {:?} mean={:+.4} std={:.4} min={:+.4} max={:+.4}",
                s.index, s.shape, st.mean, st.std, st.min, st.max
            ),
            None => tracing::info!("param[{:>2}] {:?}", s.index, s.shape),
        }
    }
}

struct Collector {
    with_stats: bool,
    out:        Vec<ParamSummary>,
}

impl<B: Backend> ModuleVisitor<B> for Collector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        let stats = if self.with_stats {
            tensor
                .clone()
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .ok()
                .and_then(|v| ParamStats::from_values(&v))
        } else {
            None
        };
        self.out.push(ParamSummary {
            index: self.out.len(),
            shape: tensor.dims().to_vec(),
            stats,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, nn::LinearConfig};

    type TestBackend = NdArray;

    #[test]
    fn test_stats_from_values() {
        let st = ParamStats::from_values(&[1.0, 3.0]).unwrap();
        assert_eq!(st.mean, 2.0);
        assert_eq!(st.std, 1.0);
        assert_eq!(st.min, 1.0);
        assert_eq!(st.max, 3.0);
        assert!(ParamStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_lists_every_parameter() {
        let device = Default::default();
        let linear = LinearConfig::new(4, 3).init::<TestBackend>(&device);

        let listed = list_params::<TestBackend, _>(&linear);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].shape, vec![4, 3]);
        assert!(listed[0].stats.is_none());

        let summarized = summarize_params::<TestBackend, _>(&linear);
        assert!(summarized.iter().all(|s| s.stats.is_some()));
    }
}
