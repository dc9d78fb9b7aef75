use std::path::Path;
use std::time::Instant;

use burn::backend::NdArray;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::Tensor;

use crate::MODEL_FILENAME;
use crate::config::SolverConfig;
use crate::geometry::SpatialGrid;
use crate::model::{FluxModel, FluxModelConfig};
use crate::pinn::angular_moments;
use crate::quadrature::QuadratureSet;

type InferBackend = NdArray<f32>;

/// 学習済み近似器からスカラー束を評価する照会オブジェクト。
///
/// 推論専用であり、計算グラフの保持は行いません。
pub struct FluxQuery<B: Backend> {
    model: FluxModel<B>,
    quad: QuadratureSet,
    grid: SpatialGrid,
    device: B::Device,
}

impl<B: Backend> FluxQuery<B> {
    pub fn new(
        model: FluxModel<B>,
        quad: QuadratureSet,
        grid: SpatialGrid,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            quad,
            grid,
            device,
        }
    }

    /// 指定位置のスカラー束を両群について評価します。
    ///
    /// `positions` を省略した場合は学習に用いた格子点で評価します。
    pub fn predict(&self, positions: Option<&[f32]>) -> (Vec<f32>, Vec<f32>) {
        let positions = positions.unwrap_or_else(|| self.grid.points());
        let n = positions.len();
        let z = Tensor::<B, 1>::from_floats(positions, &self.device).reshape([n, 1]);
        let psi1 = self.model.forward(z.clone());
        let psi2 = self.model.forward_group2(z);
        let phi0_g1 = angular_moments(&psi1, &self.quad).phi0;
        let phi0_g2 = angular_moments(&psi2, &self.quad).phi0;
        (
            phi0_g1.into_data().to_vec::<f32>().unwrap(),
            phi0_g2.into_data().to_vec::<f32>().unwrap(),
        )
    }
}

/// `infer`サブコマンドを実行します。
///
/// ファイルから学習済みモデルを読み込み、指定位置（省略時は学習格子）の
/// スカラー束を表として出力します。
pub fn run(positions: Option<&[f32]>) -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();

    if !Path::new(MODEL_FILENAME).exists() {
        return Err(format!(
            "モデルファイル '{}' が見つかりません。\n最初に 'train' コマンドでモデルを学習・保存してください。",
            MODEL_FILENAME
        )
        .into());
    }

    let config = SolverConfig::new();
    let quad = QuadratureSet::gauss_legendre(config.quadrature_order)?;
    let grid = SpatialGrid::uniform(config.n_points, config.z_max)?;

    println!("\n推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();

    println!("保存済みモデルを '{}' からロード中...", MODEL_FILENAME);
    let model = match FluxModelConfig::new(config.hidden_size, quad.order())
        .init::<InferBackend>(&device)
        .load_file(
            MODEL_FILENAME,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            &device,
        ) {
        Ok(loaded_model) => loaded_model,
        Err(e) => return Err(Box::new(e)),
    };

    let eval_positions: Vec<f32> = match positions {
        Some(given) => given.to_vec(),
        None => grid.points().to_vec(),
    };

    let query = FluxQuery::new(model, quad, grid, device);
    let (phi0_g1, phi0_g2) = query.predict(Some(&eval_positions));
    let inference_duration = inference_start.elapsed();

    println!("{:>10}  {:>12}  {:>12}", "z", "phi0 (群1)", "phi0 (群2)");
    for ((z, p1), p2) in eval_positions.iter().zip(&phi0_g1).zip(&phi0_g2) {
        println!("{z:>10.4}  {p1:>12.6}  {p2:>12.6}");
    }
    println!("=> 推論時間: {:.2?}", inference_duration);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_with_default_grid() -> FluxQuery<InferBackend> {
        let device = Default::default();
        let config = SolverConfig::new();
        let quad = QuadratureSet::gauss_legendre(config.quadrature_order).unwrap();
        let grid = SpatialGrid::uniform(config.n_points, config.z_max).unwrap();
        let model = FluxModelConfig::new(config.hidden_size, quad.order()).init(&device);
        FluxQuery::new(model, quad, grid, device)
    }

    #[test]
    fn default_prediction_covers_training_grid() {
        let query = query_with_default_grid();
        let (phi0_g1, phi0_g2) = query.predict(None);
        assert_eq!(phi0_g1.len(), 50);
        assert_eq!(phi0_g2.len(), 50);
    }

    #[test]
    fn custom_positions_return_matching_length() {
        let query = query_with_default_grid();
        let positions = [0.0f32, 25.0, 50.0, 75.0, 100.0];
        let (phi0_g1, phi0_g2) = query.predict(Some(&positions));
        assert_eq!(phi0_g1.len(), 5);
        assert_eq!(phi0_g2.len(), 5);
    }
}
