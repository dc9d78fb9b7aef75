//! # 二群スラブ形状中性子輸送 PINN
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）により
//! 二群・1次元スラブ形状の中性子輸送方程式を近似的に解くプログラムです。
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）と`infer`（推論）の
//! 機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --max-iterations 5000
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer --positions 0,25,50,75,100
//! ```

use clap::Parser;
use sn_pinn::cli::{Cli, Commands};
use sn_pinn::{inference, training};

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、`train`または`infer`の処理に振り分けます。
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Train {
            log_interval,
            max_iterations,
        } => training::run(log_interval, max_iterations),
        Commands::Infer { positions } => inference::run(positions.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("エラー: {e}");
        std::process::exit(1);
    }
}
