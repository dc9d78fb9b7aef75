use burn::config::Config;

use crate::error::{TransportError, TransportResult};

/// 輸送 PINN ソルバーの設定。
///
/// 角度求積の次数、空間格子、材料定数、境界ペナルティ、学習率などを
/// まとめて保持します。検証は [`SolverConfig::validate`] で構築時に
/// 一括して行います（学習中に遅延して失敗することはありません）。
#[derive(Config, Debug)]
pub struct SolverConfig {
    /// 角度求積（Legendre-Gauss）の次数 N。正の偶数であること。
    #[config(default = 8)]
    pub quadrature_order: usize,

    /// 隠れ層の幅 H。
    #[config(default = 40)]
    pub hidden_size: usize,

    /// 空間格子の点数。
    #[config(default = 50)]
    pub n_points: usize,

    /// スラブの厚さ z_max。
    #[config(default = 100.0)]
    pub z_max: f32,

    /// 群1の全断面積の基準値。
    #[config(default = 0.5)]
    pub sigma_t1: f32,

    /// 群2の全断面積の基準値。
    #[config(default = 0.8)]
    pub sigma_t2: f32,

    /// 群内散乱断面積 1→1 の基準値。
    #[config(default = 0.3)]
    pub sigma_s11: f32,

    /// 群間散乱断面積 1→2 の基準値。
    #[config(default = 0.1)]
    pub sigma_s12: f32,

    /// 群間散乱断面積 2→1 の基準値（上方散乱）。
    #[config(default = 0.02)]
    pub sigma_s21: f32,

    /// 群内散乱断面積 2→2 の基準値。
    #[config(default = 0.5)]
    pub sigma_s22: f32,

    /// 外部線源の強度。
    #[config(default = 1.0)]
    pub source: f32,

    /// 線源が有効なスラブ先頭側の割合（0〜1）。
    #[config(default = 0.8)]
    pub source_fraction: f32,

    /// 左境界（真空境界）ペナルティの重み。
    #[config(default = 10.0)]
    pub gamma_left: f32,

    /// 右境界（真空境界）ペナルティの重み。
    #[config(default = 10.0)]
    pub gamma_right: f32,

    /// Adam の学習率。
    #[config(default = 1e-3)]
    pub learning_rate: f64,

    /// 収束判定の閾値 |loss_t - loss_{t-1}| < ε。
    #[config(default = 1e-6)]
    pub epsilon: f32,

    /// 点別残差重み γ の適応更新を有効にするか（実験的）。
    #[config(default = false)]
    pub adaptive_weighting: bool,
}

impl SolverConfig {
    /// 設定値を検証します。不正な値があれば [`TransportError::InvalidConfiguration`] を返します。
    pub fn validate(&self) -> TransportResult<()> {
        if self.quadrature_order == 0 || self.quadrature_order % 2 != 0 {
            return Err(TransportError::InvalidConfiguration(format!(
                "求積次数 N は正の偶数である必要があります: {}",
                self.quadrature_order
            )));
        }
        if self.hidden_size == 0 {
            return Err(TransportError::InvalidConfiguration(
                "隠れ層の幅は 1 以上である必要があります".into(),
            ));
        }
        if self.n_points < 2 {
            return Err(TransportError::InvalidConfiguration(format!(
                "空間格子は 2 点以上である必要があります: {}",
                self.n_points
            )));
        }
        if self.z_max <= 0.0 {
            return Err(TransportError::InvalidConfiguration(format!(
                "スラブの厚さは正である必要があります: {}",
                self.z_max
            )));
        }
        if !(0.0..=1.0).contains(&self.source_fraction) {
            return Err(TransportError::InvalidConfiguration(format!(
                "線源の有効割合は 0〜1 の範囲である必要があります: {}",
                self.source_fraction
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(TransportError::InvalidConfiguration(format!(
                "学習率は正である必要があります: {}",
                self.learning_rate
            )));
        }
        if self.epsilon <= 0.0 {
            return Err(TransportError::InvalidConfiguration(format!(
                "収束閾値 ε は正である必要があります: {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}
