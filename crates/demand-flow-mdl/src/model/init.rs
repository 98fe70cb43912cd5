//! Deterministic parameter initialization.
//!
//! Candle's CPU generator cannot be seeded, so reproducible models are
//! obtained by re-drawing every randomly initialized variable of a `VarMap`
//! from a seeded `StdRng`, visiting variables in sorted name order:
//!
//! | Variable | Distribution |
//! |----------|--------------|
//! | conv / linear `weight` | U(-1/√fan_in, 1/√fan_in) |
//! | conv / linear `bias` | 0 |
//! | fusion `w_c`, `w_p`, `w_t` | N(0, 1) |
//! | batch-norm (`bn*`) | untouched |

use candle_core::Tensor;
use candle_nn::VarMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use tracing::debug;

use crate::error::{MdlError, MdlResult};

/// Re-draw all randomly initialized parameters of `varmap` from `seed`.
///
/// Returns the number of variables rewritten.
pub fn reseed(varmap: &VarMap, seed: u64) -> MdlResult<usize> {
    let data = varmap.data().lock().map_err(|e| MdlError::TensorError {
        message: format!("VarMap lock poisoned: {}", e),
    })?;

    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, 1.0).map_err(|e| MdlError::TensorError {
        message: format!("Invalid normal distribution: {}", e),
    })?;

    let mut rewritten = 0;
    for name in names {
        let var = &data[name];
        let mut segments = name.split('.');
        let leaf = segments.next_back().unwrap_or_default();
        if segments.any(|s| s.starts_with("bn")) {
            continue;
        }

        let count = var.elem_count();
        let values: Vec<f32> = match leaf {
            "bias" => vec![0.0; count],
            "w_c" | "w_p" | "w_t" => (0..count).map(|_| normal.sample(&mut rng)).collect(),
            "weight" => {
                let fan_in = (count / var.dims()[0]).max(1);
                let bound = 1.0 / (fan_in as f32).sqrt();
                let uniform = Uniform::new_inclusive(-bound, bound);
                (0..count).map(|_| uniform.sample(&mut rng)).collect()
            }
            _ => continue,
        };

        let tensor = Tensor::from_vec(values, var.shape(), var.device())
            .and_then(|t| t.to_dtype(var.dtype()))
            .map_err(map_candle)?;
        var.set(&tensor).map_err(map_candle)?;
        rewritten += 1;
    }

    debug!(seed = seed, rewritten = rewritten, "Reseeded model parameters");
    Ok(rewritten)
}

/// Total number of scalar parameters (including batch-norm statistics).
pub fn param_count(varmap: &VarMap) -> usize {
    varmap.all_vars().iter().map(|v| v.elem_count()).sum()
}

fn map_candle(e: candle_core::Error) -> MdlError {
    MdlError::TensorError {
        message: format!("Parameter init error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;

    fn build_small(varmap: &VarMap) {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
        candle_nn::conv2d(2, 3, 3, Default::default(), vb.pp("conv")).unwrap();
        candle_nn::batch_norm(3, 1e-5, vb.pp("bn1")).unwrap();
    }

    fn snapshot(varmap: &VarMap, name: &str) -> Vec<f32> {
        varmap.data().lock().unwrap()[name]
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap()
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = VarMap::new();
        let b = VarMap::new();
        build_small(&a);
        build_small(&b);

        assert_eq!(reseed(&a, 42).unwrap(), 2);
        reseed(&b, 42).unwrap();
        assert_eq!(snapshot(&a, "conv.weight"), snapshot(&b, "conv.weight"));

        reseed(&b, 43).unwrap();
        assert_ne!(snapshot(&a, "conv.weight"), snapshot(&b, "conv.weight"));
    }

    #[test]
    fn test_bias_zeroed_and_batch_norm_untouched() {
        let varmap = VarMap::new();
        build_small(&varmap);
        reseed(&varmap, 1).unwrap();

        assert!(snapshot(&varmap, "conv.bias").iter().all(|&v| v == 0.0));
        assert!(snapshot(&varmap, "bn1.running_var").iter().all(|&v| v == 1.0));
        assert!(snapshot(&varmap, "bn1.weight").iter().all(|&v| v == 1.0));

        let bound = 1.0 / 18f32.sqrt();
        assert!(snapshot(&varmap, "conv.weight")
            .iter()
            .all(|v| v.abs() <= bound));
    }

    #[test]
    fn test_param_count() {
        let varmap = VarMap::new();
        build_small(&varmap);
        // conv: 3*2*3*3 + 3, bn: 4 * 3
        assert_eq!(param_count(&varmap), 54 + 3 + 12);
    }
}
