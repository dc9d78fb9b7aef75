use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::config::SolverConfig;

/// 領域境界の割合。反射体 / 炉心 / 硬化炉心 / 反射体 の 4 領域に分割する。
pub const REGION_FRACTIONS: [f32; 3] = [0.2, 0.56, 0.8];

/// 領域数。
pub const NUM_REGIONS: usize = REGION_FRACTIONS.len() + 1;

// 各断面積の領域別倍率。基準値に乗じて領域ごとの定数値を得る。
const SIGMA_T1_FACTORS: [f32; NUM_REGIONS] = [0.5, 1.0, 1.5, 0.5];
const SIGMA_T2_FACTORS: [f32; NUM_REGIONS] = [0.5, 1.0, 2.0, 0.5];
const SIGMA_S11_FACTORS: [f32; NUM_REGIONS] = [1.2, 1.0, 0.6, 1.2];
const SIGMA_S12_FACTORS: [f32; NUM_REGIONS] = [1.0, 1.0, 0.5, 1.0];
const SIGMA_S21_FACTORS: [f32; NUM_REGIONS] = [1.0, 1.0, 1.0, 1.0];
const SIGMA_S22_FACTORS: [f32; NUM_REGIONS] = [1.2, 1.0, 0.7, 1.2];

/// 格子点ごとの区分一定な材料プロファイル。
///
/// 断面積は格子点あたり 1 値、線源は格子点あたり 1 値（テンソル化の際に
/// 方向数 N へ複製）を保持します。生成は純粋で決定的です。
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProfile {
    pub sigma_t1: Vec<f32>,
    pub sigma_t2: Vec<f32>,
    pub sigma_s11: Vec<f32>,
    pub sigma_s12: Vec<f32>,
    pub sigma_s21: Vec<f32>,
    pub sigma_s22: Vec<f32>,
    pub q1: Vec<f32>,
    pub q2: Vec<f32>,
}

/// 残差損失が消費するテンソル化済みの材料場。
///
/// 断面積は (n, 1)、線源は方向数へ複製した (n, N) の形状を持ちます。
#[derive(Debug, Clone)]
pub struct MaterialFields<B: Backend> {
    pub sigma_t1: Tensor<B, 2>,
    pub sigma_t2: Tensor<B, 2>,
    pub sigma_s11: Tensor<B, 2>,
    pub sigma_s12: Tensor<B, 2>,
    pub sigma_s21: Tensor<B, 2>,
    pub sigma_s22: Tensor<B, 2>,
    pub q1: Tensor<B, 2>,
    pub q2: Tensor<B, 2>,
}

impl MaterialProfile {
    /// 設定の基準値と固定の領域分割から材料プロファイルを生成します。
    pub fn generate(config: &SolverConfig, n_points: usize) -> Self {
        Self {
            sigma_t1: piecewise_profile(n_points, config.sigma_t1, &SIGMA_T1_FACTORS),
            sigma_t2: piecewise_profile(n_points, config.sigma_t2, &SIGMA_T2_FACTORS),
            sigma_s11: piecewise_profile(n_points, config.sigma_s11, &SIGMA_S11_FACTORS),
            sigma_s12: piecewise_profile(n_points, config.sigma_s12, &SIGMA_S12_FACTORS),
            sigma_s21: piecewise_profile(n_points, config.sigma_s21, &SIGMA_S21_FACTORS),
            sigma_s22: piecewise_profile(n_points, config.sigma_s22, &SIGMA_S22_FACTORS),
            q1: source_profile(n_points, config.source, config.source_fraction),
            q2: source_profile(n_points, config.source, config.source_fraction),
        }
    }

    /// プロファイルをテンソル化します。線源は方向数 `directions` へ複製します。
    pub fn to_tensors<B: Backend>(&self, directions: usize, device: &B::Device) -> MaterialFields<B> {
        MaterialFields {
            sigma_t1: column_tensor(&self.sigma_t1, device),
            sigma_t2: column_tensor(&self.sigma_t2, device),
            sigma_s11: column_tensor(&self.sigma_s11, device),
            sigma_s12: column_tensor(&self.sigma_s12, device),
            sigma_s21: column_tensor(&self.sigma_s21, device),
            sigma_s22: column_tensor(&self.sigma_s22, device),
            q1: replicated_tensor(&self.q1, directions, device),
            q2: replicated_tensor(&self.q2, directions, device),
        }
    }
}

/// 領域境界の格子点添字。`floor(n_points × fraction)` で求める。
pub fn region_bounds(n_points: usize) -> [usize; NUM_REGIONS + 1] {
    [
        0,
        (n_points as f32 * REGION_FRACTIONS[0]) as usize,
        (n_points as f32 * REGION_FRACTIONS[1]) as usize,
        (n_points as f32 * REGION_FRACTIONS[2]) as usize,
        n_points,
    ]
}

/// 区分一定プロファイルを生成します。
///
/// 基準値で初期化した後、割合の昇順に領域ごとの値を上書きします。
/// 添字範囲が重なった場合は後の代入が優先されます。
fn piecewise_profile(n_points: usize, baseline: f32, factors: &[f32; NUM_REGIONS]) -> Vec<f32> {
    let mut values = vec![baseline; n_points];
    let bounds = region_bounds(n_points);
    for (region, factor) in factors.iter().enumerate() {
        for value in &mut values[bounds[region]..bounds[region + 1]] {
            *value = baseline * factor;
        }
    }
    values
}

/// 線源プロファイルを生成します。
///
/// 全点を強度で埋めた後、有効割合より先の点を 0 で上書きします。
fn source_profile(n_points: usize, magnitude: f32, fraction: f32) -> Vec<f32> {
    let mut values = vec![magnitude; n_points];
    let cutoff = (n_points as f32 * fraction) as usize;
    for value in &mut values[cutoff.min(n_points)..] {
        *value = 0.0;
    }
    values
}

fn column_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(values, device).reshape([values.len(), 1])
}

fn replicated_tensor<B: Backend>(
    values: &[f32],
    directions: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut data = Vec::with_capacity(values.len() * directions);
    for value in values {
        for _ in 0..directions {
            data.push(*value);
        }
    }
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([values.len(), directions])
}
