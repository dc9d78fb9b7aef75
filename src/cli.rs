use clap::{Parser, Subcommand};

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A two-group slab-geometry transport PINN with Burn", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します（train または infer）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 輸送 PINN モデルを学習し、結果をファイルに保存します
    Train {
        /// ログ出力のイテレーション間隔（0 で無効）
        #[arg(long, default_value_t = 100)]
        log_interval: usize,

        /// イテレーション数の上限（省略時は収束まで無制限）
        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// 保存されたモデルを使い、スカラー束を評価します
    Infer {
        /// 評価位置 z のカンマ区切りリスト（省略時は学習格子）
        #[arg(long, value_delimiter = ',')]
        positions: Option<Vec<f32>>,
    },
}
