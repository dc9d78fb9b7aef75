use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::Tensor;
use plotters::prelude::*;

use crate::config::SolverConfig;
use crate::error::{TransportError, TransportResult};
use crate::geometry::SpatialGrid;
use crate::materials::MaterialProfile;
use crate::model::{FluxModel, FluxModelConfig};
use crate::pinn::{BoundaryWeights, LossOutput, residual_loss};
use crate::quadrature::QuadratureSet;
use crate::{LOG_FILENAME, MODEL_FILENAME};

/// 学習に用いるバックエンド。
pub type TrainBackend = Autodiff<NdArray<f32>>;

type InnerBackend = NdArray<f32>;

/// γ の適応更新で分母に加える下駄。
const GAMMA_FLOOR: f32 = 1e-6;

/// 学習ループの停止理由。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// |loss_t − loss_{t−1}| < ε を満たした。
    Converged,
    /// イテレーション上限に達した。
    MaxIterationsReached,
}

/// 学習結果。損失履歴は記録された分だけを保持します（余分な詰め物なし）。
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub loss_history: Vec<f32>,
    pub stop_reason: StopReason,
    pub iterations: usize,
}

/// イテレーションごとに更新される学習状態。
///
/// 点別残差重み γ（既定は全 1）と、適応重み付けが有効な場合の
/// 目標残差ベクトルをここで明示的に引き回します。
struct TrainingState {
    iteration: usize,
    previous_loss: f32,
    loss_history: Vec<f32>,
    gamma: Tensor<TrainBackend, 2>,
    target_residual: Option<Tensor<InnerBackend, 2>>,
}

/// 収束まで最適化ループを駆動するトレーナ。
///
/// 設定の検証は構築時に一括して行い、学習中に設定起因で失敗する
/// ことはありません。
pub struct Trainer {
    config: SolverConfig,
}

impl Trainer {
    /// 設定を検証してトレーナを構築します。
    pub fn new(config: SolverConfig) -> TransportResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 学習ループを実行します。
    ///
    /// `log_interval` イテレーションごとに損失とスカラー束のスナップショットを
    /// `sink` に書き出します（0 で無効）。`max_iterations` が `None` の場合、
    /// 収束するまでループし続けます。損失が有限値でなくなった場合は
    /// [`TransportError::NumericalDivergence`] を返します。
    pub fn train<W: Write>(
        &self,
        log_interval: usize,
        max_iterations: Option<usize>,
        sink: &mut W,
    ) -> TransportResult<(FluxModel<TrainBackend>, TrainOutcome)> {
        let device = Default::default();

        let quad = QuadratureSet::gauss_legendre(self.config.quadrature_order)?;
        let grid = SpatialGrid::uniform(self.config.n_points, self.config.z_max)?;
        let fields = MaterialProfile::generate(&self.config, grid.len())
            .to_tensors::<TrainBackend>(quad.order(), &device);

        let mut model =
            FluxModelConfig::new(self.config.hidden_size, quad.order()).init::<TrainBackend>(&device);
        let mut optim = AdamConfig::new().init();

        // 選点テンソルは全イテレーションで再利用する。順伝播のたびに
        // 新しい計算グラフが構築され、backward 後に解放される。
        let z = grid.collocation_tensor::<TrainBackend>(&device);
        let boundary = BoundaryWeights {
            left: self.config.gamma_left,
            right: self.config.gamma_right,
        };

        let mut state = TrainingState {
            iteration: 0,
            previous_loss: f32::INFINITY,
            loss_history: Vec::new(),
            gamma: Tensor::ones([grid.len(), 1], &device),
            target_residual: None,
        };

        let stop_reason = loop {
            if let Some(cap) = max_iterations {
                if state.iteration >= cap {
                    break StopReason::MaxIterationsReached;
                }
            }
            state.iteration += 1;

            let psi1 = model.forward(z.clone());
            let psi2 = model.forward_group2(z.clone());
            let output = residual_loss(&psi1, &psi2, &z, &quad, &fields, &state.gamma, boundary)?;

            let loss_value = output.loss.clone().into_scalar();
            if !loss_value.is_finite() {
                return Err(TransportError::NumericalDivergence {
                    iteration: state.iteration,
                    value: loss_value,
                });
            }
            state.loss_history.push(loss_value);

            if log_interval != 0 && state.iteration % log_interval == 0 {
                log_iteration(sink, state.iteration, loss_value, &output)?;
                println!("[Iter {}] Loss: {:.6}", state.iteration, loss_value);
            }

            if self.config.adaptive_weighting {
                update_gamma(&mut state, &output);
            }

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(self.config.learning_rate, model, grads);

            if (loss_value - state.previous_loss).abs() < self.config.epsilon {
                break StopReason::Converged;
            }
            state.previous_loss = loss_value;
        };

        let outcome = TrainOutcome {
            iterations: state.iteration,
            loss_history: state.loss_history,
            stop_reason,
        };
        Ok((model, outcome))
    }
}

/// 点別残差重み γ を更新します（実験的）。
///
/// 現在の残差の大きさと初回に記録した目標残差の比を、両群合算の
/// スカラー束の大きさで正規化して新しい γ とします。収束の遅い
/// 領域の重みを相対的に増やすことを意図しています。
// TODO: 正規化に用いるスカラー束（群別か合算か）を基準プロファイルで検証する。
fn update_gamma(state: &mut TrainingState, output: &LossOutput<TrainBackend>) {
    let magnitude = output.residual_sq.clone().sqrt();
    let target = state
        .target_residual
        .get_or_insert_with(|| magnitude.clone().add_scalar(GAMMA_FLOOR))
        .clone();
    let phi_total = (output.phi0_g1.clone() + output.phi0_g2.clone())
        .abs()
        .add_scalar(GAMMA_FLOOR);
    let ratio = magnitude / (target * phi_total);
    state.gamma = Tensor::from_inner(ratio);
}

/// 1 イテレーション分のログをシンクに書き出します。
fn log_iteration<W: Write>(
    sink: &mut W,
    iteration: usize,
    loss: f32,
    output: &LossOutput<TrainBackend>,
) -> TransportResult<()> {
    writeln!(sink, "Iter {iteration}: {loss}")?;
    let phi0_g1 = output.phi0_g1.clone().into_data().to_vec::<f32>().unwrap();
    let phi0_g2 = output.phi0_g2.clone().into_data().to_vec::<f32>().unwrap();
    writeln!(sink, "phi0_g1: {phi0_g1:?}")?;
    writeln!(sink, "phi0_g2: {phi0_g2:?}")?;
    Ok(())
}

/// `train`サブコマンドを実行します。
///
/// 既定設定でモデルを学習し、損失グラフの描画と学習済みモデルの
/// ファイル保存を行います。学習ログはテキストファイルに書き出し、
/// 早期リターンを含むすべての経路で確実にクローズされます。
pub fn run(log_interval: usize, max_iterations: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let config = SolverConfig::new();
    let trainer = Trainer::new(config)?;

    let log_file = File::create(LOG_FILENAME)?;
    let mut sink = BufWriter::new(log_file);

    println!("学習を開始します (二群スラブ輸送方程式) - バックエンド: NdArray (CPU)");
    let training_start = Instant::now();
    let (model, outcome) = trainer.train(log_interval, max_iterations, &mut sink)?;
    sink.flush()?;
    let training_duration = training_start.elapsed();

    match outcome.stop_reason {
        StopReason::Converged => {
            println!("収束しました（{} イテレーション）。", outcome.iterations)
        }
        StopReason::MaxIterationsReached => {
            println!("イテレーション上限に達しました（{}）。", outcome.iterations)
        }
    }
    println!("=> 学習時間: {:.2?}", training_duration);

    plot_loss_history(&outcome.loss_history)?;
    println!("=> 損失グラフを 'loss_graph.png' に保存しました。");

    println!("学習済みモデルを保存中...");
    model.save_file(
        MODEL_FILENAME,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
    )?;
    println!("=> モデルを '{}' に保存しました。", MODEL_FILENAME);

    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(loss_hist: &[f32]) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new("loss_graph.png", (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let max_log_loss = loss_hist.first().unwrap_or(&1.0).log10();
    let min_log_loss = loss_hist.last().unwrap_or(&1e-6).log10() - 0.5;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..loss_hist.len(), min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Iterations")
        .draw()?;
    chart
        .draw_series(LineSeries::new(
            loss_hist
                .iter()
                .enumerate()
                .map(|(i, &val)| (i, val.log10())),
            &RED,
        ))?
        .label("Residual Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
