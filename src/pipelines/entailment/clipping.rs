use burn::{
    module::{Module, ModuleVisitor, ParamId},
    optim::GradientsParams,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let squares = (grad.clone() * grad).sum().into_scalar();
            self.total += squares.elem::<f64>();
        }
    }
}

struct Rescale<'a> {
    grads: &'a mut GradientsParams,
    scale: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id.clone(), grad.mul_scalar(self.scale));
        }
    }
}

/// The L2 norm of all gradients of `module` taken together
pub fn global_norm<B: AutodiffBackend, M: Module<B>>(module: &M, grads: &GradientsParams) -> f64 {
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);

    visitor.total.sqrt()
}

/// Scale every gradient by `clip_norm / global_norm` when the global norm exceeds `clip_norm`.
/// Returns the gradients and their norm before clipping.
pub fn clip_by_global_norm<B: AutodiffBackend, M: Module<B>>(
    module: &M,
    mut grads: GradientsParams,
    clip_norm: f64,
) -> (GradientsParams, f64) {
    let norm = global_norm::<B, M>(module, &grads);

    if norm > clip_norm && norm.is_finite() {
        let mut visitor = Rescale {
            grads: &mut grads,
            scale: clip_norm / norm,
        };
        module.visit(&mut visitor);
    }

    (grads, norm)
}
