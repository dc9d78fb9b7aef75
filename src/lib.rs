//! # 二群スラブ形状中性子輸送 PINN ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）により
//! 二群・1次元スラブ形状の中性子輸送方程式を近似的に解くための主要な
//! コンポーネントを提供します。
//!
//! ネットワーク自身の角度フラックス出力とその空間微分を離散座標法の
//! 輸送方程式に代入し、残差と真空境界条件ペナルティの和を最小化する
//! ことで、教師データなしに学習します。

pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod materials;
pub mod model;
pub mod pinn;
pub mod quadrature;
pub mod training;

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "flux_model.mpk";

/// 学習ログを書き出すファイル名
pub const LOG_FILENAME: &str = "training_log.txt";
