// ============================================================
// Layer 5 — Exponential Moving Average of Weights
// ============================================================
// After every optimiser step each parameter x is folded into
// its shadow copy:
//
//   shadow ← (1 - μ) · x + μ · shadow        μ = decay (0.999)
//
// The live model keeps training on its raw weights; snapshots
// and evaluation use a copy that carries the shadow weights.
//
// Shadows live on the inner (non-autodiff) backend, keyed by
// ParamId, which `model.valid()` preserves.

use std::collections::HashMap;

use burn::{
    module::{ModuleMapper, ModuleVisitor, ParamId},
    prelude::*,
};

pub struct Ema<B: Backend> {
    decay:  f64,
    shadow: HashMap<ParamId, Tensor<B, 1>>,
}

impl<B: Backend> Ema<B> {
    pub fn new(decay: f64) -> Self {
        Self { decay, shadow: HashMap::new() }
    }

    /// Start tracking every float parameter of `module` at its current value
    pub fn from_module<M: Module<B>>(decay: f64, module: &M) -> Self {
        let mut ema = Self::new(decay);
        module.visit(&mut Register { ema: &mut ema });
        ema
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn len(&self) -> usize {
        self.shadow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }

    pub fn register<const D: usize>(&mut self, id: ParamId, value: Tensor<B, D>) {
        self.shadow.insert(id, flatten(value));
    }

    /// Blend `x` into the shadow of `id` and return the new average.
    /// An unregistered parameter starts its shadow at `x`.
    pub fn update<const D: usize>(&mut self, id: ParamId, x: Tensor<B, D>) -> Tensor<B, D> {
        let shape = x.shape();
        let x = flatten(x);
        let average = match self.shadow.remove(&id) {
            Some(shadow) => x.mul_scalar(1.0 - self.decay) + shadow.mul_scalar(self.decay),
            None => x,
        };
        self.shadow.insert(id, average.clone());
        average.reshape(shape)
    }

    pub fn get<const D: usize>(&self, id: &ParamId, shape: [usize; D]) -> Option<Tensor<B, D>> {
        self.shadow.get(id).map(|t| t.clone().reshape(shape))
    }

    /// Fold every float parameter of `module` into its shadow
    pub fn update_module<M: Module<B>>(&mut self, module: &M) {
        module.visit(&mut Update { ema: self });
    }

    /// A copy of `module` with each tracked parameter replaced by its shadow
    pub fn apply<M: Module<B>>(&self, module: M) -> M {
        module.map(&mut Swap { ema: self })
    }
}

fn flatten<B: Backend, const D: usize>(t: Tensor<B, D>) -> Tensor<B, 1> {
    let n = t.shape().num_elements();
    t.reshape([n])
}

// ─── Module walkers ───────────────────────────────────────────────────────────
struct Register<'a, B: Backend> {
    ema: &'a mut Ema<B>,
}

impl<B: Backend> ModuleVisitor<B> for Register<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        self.ema.register(id, tensor.clone());
    }
}

struct Update<'a, B: Backend> {
    ema: &'a mut Ema<B>,
}

impl<B: Backend> ModuleVisitor<B> for Update<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        self.ema.update(id, tensor.clone());
    }
}

struct Swap<'a, B: Backend> {
    ema: &'a Ema<B>,
}

impl<B: Backend> ModuleMapper<B> for Swap<'_, B> {
    fn map_float<const D: usize>(&mut self, id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        self.ema.get(&id, tensor.dims()).unwrap_or(tensor)
    }
}
