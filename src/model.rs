use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 群2を評価する際の空間座標のスケール係数。
///
/// 1 つの近似器を両群で共有し、群2は 0.75·z で評価することで
/// 両群の空間依存性を結合させるモデル化です。
pub const GROUP2_INPUT_SCALE: f32 = 0.75;

/// 角度フラックス近似器の設定。
#[derive(Config, Debug)]
pub struct FluxModelConfig {
    /// 隠れ層の幅 H。
    pub hidden_size: usize,
    /// 出力する方向数 N（求積次数と一致させる）。
    pub directions: usize,
}

impl FluxModelConfig {
    /// 新しい近似器を初期化します。
    pub fn init<B: Backend>(&self, device: &B::Device) -> FluxModel<B> {
        FluxModel {
            input: LinearConfig::new(1, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.directions).init(device),
            activation: Tanh::new(),
        }
    }
}

/// 角度フラックスの近似器。
///
/// 空間座標 z を入力とし、N 方向の角度フラックス値を予測する
/// 1 隠れ層のネットワーク（1 → H → tanh → N）です。
#[derive(Module, Debug)]
pub struct FluxModel<B: Backend> {
    input: Linear<B>,
    output: Linear<B>,
    activation: Tanh,
}

impl<B: Backend> FluxModel<B> {
    /// 群1の順伝播を実行します。入力は形状 (n, 1)、出力は (n, N)。
    pub fn forward(&self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.input.forward(z);
        let x = self.activation.forward(x);
        self.output.forward(x)
    }

    /// 群2の順伝播を実行します。同じ近似器を 0.75·z で評価します。
    pub fn forward_group2(&self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(z.mul_scalar(GROUP2_INPUT_SCALE))
    }
}
