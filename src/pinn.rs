use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::backend::AutodiffBackend;

use crate::error::{TransportError, TransportResult};
use crate::materials::MaterialFields;
use crate::quadrature::QuadratureSet;

/// 角度フラックスの角度モーメント。
///
/// φ0 はスカラー束（0 次モーメント）、φ1 は 1 次モーメントです。
/// φ1 は残差には現れませんが、非等方項拡張のための診断量として
/// 併せて計算します。
#[derive(Debug, Clone)]
pub struct AngularMoments<B: Backend> {
    pub phi0: Tensor<B, 2>,
    pub phi1: Tensor<B, 2>,
}

/// 境界ペナルティの重み。
#[derive(Debug, Clone, Copy)]
pub struct BoundaryWeights {
    pub left: f32,
    pub right: f32,
}

/// 残差損失の出力。
///
/// 損失スカラーに加え、ロギングと γ の適応更新に使う切り離し済みの
/// 診断テンソルを返します。
#[derive(Debug)]
pub struct LossOutput<B: AutodiffBackend> {
    /// 近似器の全パラメータについて微分可能な損失スカラー。
    pub loss: Tensor<B, 1>,
    /// 群1のスカラー束 φ0（計算グラフから切り離し済み、形状 (n, 1)）。
    pub phi0_g1: Tensor<B::InnerBackend, 2>,
    /// 群2のスカラー束 φ0（同上）。
    pub phi0_g2: Tensor<B::InnerBackend, 2>,
    /// 群1の 1 次モーメント φ1（診断用）。
    pub phi1_g1: Tensor<B::InnerBackend, 2>,
    /// 群2の 1 次モーメント φ1（診断用）。
    pub phi1_g2: Tensor<B::InnerBackend, 2>,
    /// 点ごとの二乗残差 r²(z)（γ の適応更新用、形状 (n, 1)）。
    pub residual_sq: Tensor<B::InnerBackend, 2>,
}

/// 角度モーメント φ0 = Σ_d w_d·ψ_d と φ1 = Σ_d μ_d·w_d·ψ_d を計算します。
pub fn angular_moments<B: Backend>(psi: &Tensor<B, 2>, quad: &QuadratureSet) -> AngularMoments<B> {
    let device = psi.device();
    let w = quad.weight_row::<B>(&device);
    let mu = quad.mu_row::<B>(&device);
    let phi0 = (psi.clone() * w.clone()).sum_dim(1);
    let phi1 = (psi.clone() * mu * w).sum_dim(1);
    AngularMoments { phi0, phi1 }
}

/// 全方向の空間微分 ∂ψ/∂z を逆方向自動微分で求めます。
///
/// 方向列ごとにスカラー和の backward を 1 回実行し、選点テンソル z に
/// ついての勾配を列として集めて (n, N) の行列に組み立てます。
/// z は `require_grad` 済みである必要があります。
pub fn spatial_derivative<B: AutodiffBackend>(
    psi: &Tensor<B, 2>,
    z: &Tensor<B, 2>,
) -> Tensor<B, 2> {
    let [n_points, directions] = psi.dims();
    let mut columns = Vec::with_capacity(directions);
    for d in 0..directions {
        let grads = psi.clone().slice([0..n_points, d..d + 1]).sum().backward();
        let dpsi_dz = z.grad(&grads).unwrap();
        columns.push(Tensor::<B, 2>::from_inner(dpsi_dz));
    }
    Tensor::cat(columns, 1)
}

/// 二群結合の輸送方程式残差から損失スカラーを組み立てます。
///
/// 点・方向ごとの残差
/// `μ·∂ψ1/∂z + σt1·ψ1 + μ·∂ψ2/∂z + σt2·ψ2
///  − 0.5·[(σs12+σs11)·φ0_1 + (σs21+σs22)·φ0_2] − 0.5·(Q1+Q2)`
/// を二乗して方向について和をとり、点別重み γ で加重して
/// `0.5·Σ γ(z)·r²(z)` とします。さらに真空境界条件を弱形式で課す
/// 境界ペナルティ `0.5·γ_b·Σ(流入方向 ψ)²` を両群・両境界について
/// 加えます。左境界では添字 N/2 以降（μ > 0）、右境界では添字 N/2
/// 未満（μ < 0）が流入方向です。
pub fn residual_loss<B: AutodiffBackend>(
    psi1: &Tensor<B, 2>,
    psi2: &Tensor<B, 2>,
    z: &Tensor<B, 2>,
    quad: &QuadratureSet,
    fields: &MaterialFields<B>,
    gamma: &Tensor<B, 2>,
    boundary: BoundaryWeights,
) -> TransportResult<LossOutput<B>> {
    let directions = quad.order();
    let [n_points, _] = z.dims();
    check_prediction_shape(psi1, n_points, directions)?;
    check_prediction_shape(psi2, n_points, directions)?;

    let device = psi1.device();
    let mu = quad.mu_row::<B>(&device);

    let moments1 = angular_moments(psi1, quad);
    let moments2 = angular_moments(psi2, quad);

    let dpsi1_dz = spatial_derivative(psi1, z);
    let dpsi2_dz = spatial_derivative(psi2, z);

    // 群内・群間散乱をまとめた流入散乱源。(n, 1) で方向軸へブロードキャストされる。
    let inscatter = (moments1.phi0.clone() * (fields.sigma_s12.clone() + fields.sigma_s11.clone())
        + moments2.phi0.clone() * (fields.sigma_s21.clone() + fields.sigma_s22.clone()))
    .mul_scalar(0.5);
    let external = (fields.q1.clone() + fields.q2.clone()).mul_scalar(0.5);

    let residual = mu.clone() * dpsi1_dz
        + fields.sigma_t1.clone() * psi1.clone()
        + mu * dpsi2_dz
        + fields.sigma_t2.clone() * psi2.clone()
        - inscatter
        - external;

    let residual_sq = (residual.clone() * residual).sum_dim(1);
    let interior = (gamma.clone() * residual_sq.clone()).sum().mul_scalar(0.5);

    let half = directions / 2;
    let left_g1 = boundary_penalty(psi1, 0..1, half..directions, boundary.left);
    let left_g2 = boundary_penalty(psi2, 0..1, half..directions, boundary.left);
    let right_g1 = boundary_penalty(psi1, n_points - 1..n_points, 0..half, boundary.right);
    let right_g2 = boundary_penalty(psi2, n_points - 1..n_points, 0..half, boundary.right);

    let loss = interior + left_g1 + left_g2 + right_g1 + right_g2;

    Ok(LossOutput {
        loss,
        phi0_g1: moments1.phi0.inner(),
        phi0_g2: moments2.phi0.inner(),
        phi1_g1: moments1.phi1.inner(),
        phi1_g2: moments2.phi1.inner(),
        residual_sq: residual_sq.inner(),
    })
}

/// 境界 1 点における流入方向フラックスの二乗和ペナルティ。
fn boundary_penalty<B: AutodiffBackend>(
    psi: &Tensor<B, 2>,
    point: std::ops::Range<usize>,
    incoming: std::ops::Range<usize>,
    weight: f32,
) -> Tensor<B, 1> {
    let incoming_flux = psi.clone().slice([point, incoming]);
    (incoming_flux.clone() * incoming_flux)
        .sum()
        .mul_scalar(0.5 * weight)
}

fn check_prediction_shape<B: Backend>(
    psi: &Tensor<B, 2>,
    n_points: usize,
    directions: usize,
) -> TransportResult<()> {
    let dims = psi.dims();
    if dims != [n_points, directions] {
        return Err(TransportError::ShapeMismatch {
            expected: format!("[{n_points}, {directions}]"),
            actual: format!("{dims:?}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::geometry::SpatialGrid;
    use crate::materials::MaterialProfile;
    use crate::model::FluxModelConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn setup(
        config: &SolverConfig,
    ) -> (
        QuadratureSet,
        Tensor<TestBackend, 2>,
        MaterialFields<TestBackend>,
        Tensor<TestBackend, 2>,
    ) {
        let device = Default::default();
        let quad = QuadratureSet::gauss_legendre(config.quadrature_order).unwrap();
        let grid = SpatialGrid::uniform(config.n_points, config.z_max).unwrap();
        let fields = MaterialProfile::generate(config, grid.len())
            .to_tensors::<TestBackend>(quad.order(), &device);
        let z = grid.collocation_tensor::<TestBackend>(&device);
        let gamma = Tensor::<TestBackend, 2>::ones([grid.len(), 1], &device);
        (quad, z, fields, gamma)
    }

    #[test]
    fn loss_is_non_negative() {
        let device = Default::default();
        let config = SolverConfig::new()
            .with_quadrature_order(4)
            .with_n_points(10);
        let (quad, z, fields, gamma) = setup(&config);
        let model = FluxModelConfig::new(8, quad.order()).init::<TestBackend>(&device);
        let psi1 = model.forward(z.clone());
        let psi2 = model.forward_group2(z.clone());
        let boundary = BoundaryWeights { left: 10.0, right: 10.0 };
        let output = residual_loss(&psi1, &psi2, &z, &quad, &fields, &gamma, boundary).unwrap();
        let loss = output.loss.into_scalar();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn zero_flux_and_zero_source_give_zero_loss() {
        let device = Default::default();
        let config = SolverConfig::new()
            .with_quadrature_order(4)
            .with_n_points(10)
            .with_source(0.0);
        let (quad, z, fields, gamma) = setup(&config);
        let model = FluxModelConfig::new(8, quad.order()).init::<TestBackend>(&device);
        // 出力を 0 に潰しても z との計算グラフは保たれる。
        let psi1 = model.forward(z.clone()).mul_scalar(0.0);
        let psi2 = model.forward_group2(z.clone()).mul_scalar(0.0);
        let boundary = BoundaryWeights { left: 10.0, right: 10.0 };
        let output = residual_loss(&psi1, &psi2, &z, &quad, &fields, &gamma, boundary).unwrap();
        assert!(output.loss.into_scalar().abs() < 1e-10);
    }

    #[test]
    fn wrong_direction_count_is_a_shape_mismatch() {
        let device = Default::default();
        let config = SolverConfig::new()
            .with_quadrature_order(4)
            .with_n_points(10);
        let (quad, z, fields, gamma) = setup(&config);
        let psi_bad = Tensor::<TestBackend, 2>::zeros([10, 6], &device);
        let boundary = BoundaryWeights { left: 1.0, right: 1.0 };
        let result = residual_loss(&psi_bad, &psi_bad, &z, &quad, &fields, &gamma, boundary);
        assert!(matches!(result, Err(TransportError::ShapeMismatch { .. })));
    }

    #[test]
    fn wrong_point_count_is_a_shape_mismatch() {
        let device = Default::default();
        let config = SolverConfig::new()
            .with_quadrature_order(4)
            .with_n_points(10);
        let (quad, z, fields, gamma) = setup(&config);
        let psi_bad = Tensor::<TestBackend, 2>::zeros([9, 4], &device);
        let boundary = BoundaryWeights { left: 1.0, right: 1.0 };
        let result = residual_loss(&psi_bad, &psi_bad, &z, &quad, &fields, &gamma, boundary);
        assert!(matches!(result, Err(TransportError::ShapeMismatch { .. })));
    }

    #[test]
    fn moments_contract_with_quadrature_weights() {
        let device = Default::default();
        let quad = QuadratureSet::gauss_legendre(4).unwrap();
        // 等方的な ψ ≡ 1 なら φ0 = Σw = 2、φ1 = Σ μ·w = 0。
        let psi = Tensor::<TestBackend, 2>::ones([3, 4], &device);
        let moments = angular_moments(&psi, &quad);
        let phi0 = moments.phi0.into_data().to_vec::<f32>().unwrap();
        let phi1 = moments.phi1.into_data().to_vec::<f32>().unwrap();
        for value in phi0 {
            assert!((value - 2.0).abs() < 1e-5);
        }
        for value in phi1 {
            assert!(value.abs() < 1e-5);
        }
    }

    #[test]
    fn spatial_derivative_matches_linear_profile() {
        let device = Default::default();
        let grid = SpatialGrid::uniform(5, 4.0).unwrap();
        let z = grid.collocation_tensor::<TestBackend>(&device);
        // ψ(z, d) = 3z を全方向に複製すると ∂ψ/∂z ≡ 3。
        let psi = Tensor::cat(vec![z.clone().mul_scalar(3.0); 4], 1);
        let dpsi_dz = spatial_derivative(&psi, &z);
        assert_eq!(dpsi_dz.dims(), [5, 4]);
        for value in dpsi_dz.into_data().to_vec::<f32>().unwrap() {
            assert!((value - 3.0).abs() < 1e-5);
        }
    }
}
