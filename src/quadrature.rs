use std::f64::consts::PI;

use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::error::{TransportError, TransportResult};

/// Newton 法の収束判定と反復上限。
const NEWTON_TOLERANCE: f64 = 1e-14;
const NEWTON_MAX_STEPS: usize = 100;

/// 離散座標法で用いる角度求積セット（Legendre-Gauss）。
///
/// 区間 [-1, 1] 上の求積点 μ と重み w を保持します。点は昇順に並び、
/// 前半（添字 < N/2）が μ < 0、後半（添字 ≥ N/2）が μ > 0 に対応します。
/// 構築後は不変です。
#[derive(Debug, Clone)]
pub struct QuadratureSet {
    nodes: Vec<f32>,
    weights: Vec<f32>,
}

impl QuadratureSet {
    /// 次数 N の Legendre-Gauss 求積点と重みを生成します。
    ///
    /// N が正の偶数でない場合は [`TransportError::InvalidConfiguration`] を返します。
    pub fn gauss_legendre(order: usize) -> TransportResult<Self> {
        if order == 0 || order % 2 != 0 {
            return Err(TransportError::InvalidConfiguration(format!(
                "求積次数 N は正の偶数である必要があります: {order}"
            )));
        }

        let n = order;
        let mut nodes = vec![0.0f64; n];
        let mut weights = vec![0.0f64; n];

        // 対称性より正側の根だけ Newton 法で求め、負側へ折り返す。
        let half = n / 2;
        for i in 0..half {
            // Chebyshev 近似を初期値とする。i=0 が最大根。
            let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            for _ in 0..NEWTON_MAX_STEPS {
                let (p, dp) = legendre_with_derivative(n, x);
                let dx = p / dp;
                x -= dx;
                if dx.abs() < NEWTON_TOLERANCE {
                    break;
                }
            }
            let (_, dp) = legendre_with_derivative(n, x);
            let w = 2.0 / ((1.0 - x * x) * dp * dp);
            nodes[i] = -x;
            nodes[n - 1 - i] = x;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }

        Ok(Self {
            nodes: nodes.into_iter().map(|v| v as f32).collect(),
            weights: weights.into_iter().map(|v| v as f32).collect(),
        })
    }

    /// 求積の次数 N。
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// 求積点 μ（昇順）。
    pub fn nodes(&self) -> &[f32] {
        &self.nodes
    }

    /// 求積重み w。
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// 求積点を形状 (1, N) のテンソルとして返します（方向軸へのブロードキャスト用）。
    pub fn mu_row<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(self.nodes.as_slice(), device).reshape([1, self.order()])
    }

    /// 求積重みを形状 (1, N) のテンソルとして返します。
    pub fn weight_row<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(self.weights.as_slice(), device).reshape([1, self.order()])
    }
}

/// Legendre 多項式 P_n(x) とその導関数を三項漸化式で評価します。
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let p_next = ((2 * k - 1) as f64 * x * p - (k - 1) as f64 * p_prev) / k as f64;
        p_prev = p;
        p = p_next;
    }
    let dp = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_two_matches_analytic_values() {
        let quad = QuadratureSet::gauss_legendre(2).unwrap();
        let expected = 1.0 / 3.0f32.sqrt();
        assert!((quad.nodes()[0] + expected).abs() < 1e-6);
        assert!((quad.nodes()[1] - expected).abs() < 1e-6);
        assert!((quad.weights()[0] - 1.0).abs() < 1e-6);
        assert!((quad.weights()[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weights_are_positive_and_sum_to_two() {
        for order in [2usize, 4, 8, 16] {
            let quad = QuadratureSet::gauss_legendre(order).unwrap();
            assert_eq!(quad.order(), order);
            assert!(quad.weights().iter().all(|&w| w > 0.0));
            let total: f32 = quad.weights().iter().sum();
            assert!((total - 2.0).abs() < 1e-5, "Σw = {total}");
        }
    }

    #[test]
    fn nodes_are_ascending_inside_open_interval() {
        let quad = QuadratureSet::gauss_legendre(8).unwrap();
        for pair in quad.nodes().windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(quad.nodes().iter().all(|&mu| mu > -1.0 && mu < 1.0));
    }

    #[test]
    fn upper_half_indices_carry_positive_directions() {
        let quad = QuadratureSet::gauss_legendre(4).unwrap();
        assert!(quad.nodes()[..2].iter().all(|&mu| mu < 0.0));
        assert!(quad.nodes()[2..].iter().all(|&mu| mu > 0.0));
    }

    #[test]
    fn invalid_orders_are_rejected() {
        assert!(QuadratureSet::gauss_legendre(0).is_err());
        assert!(QuadratureSet::gauss_legendre(3).is_err());
        assert!(QuadratureSet::gauss_legendre(7).is_err());
    }
}
