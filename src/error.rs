use thiserror::Error;

/// 輸送 PINN ソルバーで発生するエラー。
#[derive(Error, Debug)]
pub enum TransportError {
    /// 構築時の設定検証で検出される致命的なエラー。
    #[error("設定が不正です: {0}")]
    InvalidConfiguration(String),

    /// 損失計算時のテンソル形状不一致。
    #[error("形状が一致しません: 期待 {expected}, 実際 {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// 損失が有限値でなくなった場合（学習の発散）。
    #[error("イテレーション {iteration} で損失が発散しました: {value}")]
    NumericalDivergence { iteration: usize, value: f32 },

    #[error("I/O エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("モデルの保存/読み込みに失敗しました: {0}")]
    Record(#[from] burn::record::RecorderError),
}

pub type TransportResult<T> = Result<T, TransportError>;
