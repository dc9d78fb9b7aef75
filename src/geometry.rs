use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::backend::AutodiffBackend;

use crate::error::{TransportError, TransportResult};

/// スラブ形状の 1 次元空間格子。
///
/// 0 から z_max までを等間隔に分割した狭義単調増加の点列を保持します。
/// 構築後は不変です。
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    points: Vec<f32>,
    z_max: f32,
}

impl SpatialGrid {
    /// n_points 点の等間隔格子を生成します。
    ///
    /// n_points < 2 または z_max ≤ 0 の場合は
    /// [`TransportError::InvalidConfiguration`] を返します。
    pub fn uniform(n_points: usize, z_max: f32) -> TransportResult<Self> {
        if n_points < 2 {
            return Err(TransportError::InvalidConfiguration(format!(
                "空間格子は 2 点以上である必要があります: {n_points}"
            )));
        }
        if z_max <= 0.0 {
            return Err(TransportError::InvalidConfiguration(format!(
                "スラブの厚さは正である必要があります: {z_max}"
            )));
        }
        let spacing = z_max / (n_points - 1) as f32;
        let points = (0..n_points).map(|i| i as f32 * spacing).collect();
        Ok(Self { points, z_max })
    }

    /// 格子点数。
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 格子点列（昇順）。
    pub fn points(&self) -> &[f32] {
        &self.points
    }

    /// 格子間隔。
    pub fn spacing(&self) -> f32 {
        self.z_max / (self.points.len() - 1) as f32
    }

    /// 格子点を形状 (n, 1) のテンソルとして返します（推論用）。
    pub fn position_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(self.points.as_slice(), device).reshape([self.len(), 1])
    }

    /// 勾配追跡を有効にした選点テンソルを返します。
    ///
    /// 返るテンソルに対する任意のスカラー関数は、各点座標について
    /// 微分可能です（残差損失の ∂ψ/∂z 計算に用います）。
    pub fn collocation_tensor<B: AutodiffBackend>(&self, device: &B::Device) -> Tensor<B, 2> {
        self.position_tensor::<B>(device).require_grad()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_spans_zero_to_z_max() {
        let grid = SpatialGrid::uniform(50, 100.0).unwrap();
        assert_eq!(grid.len(), 50);
        assert_eq!(grid.points()[0], 0.0);
        assert!((grid.points()[49] - 100.0).abs() < 1e-4);
        assert!((grid.points()[1] - 100.0 / 49.0).abs() < 1e-5);
        for pair in grid.points().windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn two_point_grid_is_allowed() {
        let grid = SpatialGrid::uniform(2, 1.0).unwrap();
        assert_eq!(grid.points(), &[0.0, 1.0]);
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        assert!(SpatialGrid::uniform(1, 100.0).is_err());
        assert!(SpatialGrid::uniform(0, 100.0).is_err());
        assert!(SpatialGrid::uniform(50, 0.0).is_err());
        assert!(SpatialGrid::uniform(50, -1.0).is_err());
    }
}
