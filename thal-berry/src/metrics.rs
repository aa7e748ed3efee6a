//! 分割评价指标与损失.
//!
//! 预测张量统一为 `[B, K, H, W, L]` 的类别概率, 标签为 `[B, H, W, L]`.

use ndarray::{Array1, Array4, Array5, ArrayView4, ArrayView5, Axis, Zip};
use thiserror::Error;

/// 指标配置或输入错误.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricError {
    /// 类别数为 0.
    #[error("类别数必须为正")]
    NoClasses,

    /// 标签取值列表长度与类别数不一致.
    #[error("类别数为 {num_classes}, 但给出了 {values} 个标签取值")]
    ValueCount {
        /// 类别数.
        num_classes: usize,
        /// 标签取值个数.
        values: usize,
    },

    /// 按 one-hot 模式构造的损失接收了整数标签.
    #[error("未提供标签取值列表, 无法对整数标签做 one-hot 编码")]
    MissingValues,

    /// 预测与标签形状不一致.
    #[error("预测形状 {prediction:?} 与标签形状 {ground_truth:?} 不一致")]
    Shape {
        /// 预测形状.
        prediction: Vec<usize>,
        /// 标签 (one-hot 后) 形状.
        ground_truth: Vec<usize>,
    },
}

/// 将标签 `[B, H, W, L]` 编码为 `[B, K, H, W, L]`, 第 `k` 个通道为 `gt == values[k]`.
pub fn one_hot(gt: ArrayView4<i32>, values: &[i32]) -> Array5<f32> {
    let (b, h, w, l) = gt.dim();
    let mut out = Array5::zeros((b, values.len(), h, w, l));
    for (k, &v) in values.iter().enumerate() {
        Zip::from(out.index_axis_mut(Axis(1), k))
            .and(&gt)
            .for_each(|o, &g| *o = if g == v { 1.0 } else { 0.0 });
    }
    out
}

/// 逐体素取概率最大的类别, 再加上 `offset`. 并列时取编号最小者.
///
/// 第二阶段模型的输出通道 `k` 对应核团编号 `k + 1`, 此时 `offset = 1`.
pub fn argmax_labels(pred: ArrayView5<f32>, offset: i32) -> Array4<i32> {
    let (b, _, h, w, l) = pred.dim();
    let mut out = Array4::zeros((b, h, w, l));
    Zip::from(&mut out)
        .and(pred.lanes(Axis(1)))
        .for_each(|o, lane| {
            let mut best = 0;
            for (k, &p) in lane.iter().enumerate() {
                if p > lane[best] {
                    best = k;
                }
            }
            *o = best as i32 + offset;
        });
    out
}

/// Dice 损失的输出.
#[derive(Debug, Clone, PartialEq)]
pub struct DiceOutput {
    /// 各通道损失的平均值.
    pub overall: f64,

    /// 各通道损失 (已在 batch 上平均).
    pub per_channel: Array1<f64>,
}

/// V-Net 软 Dice 损失.
///
/// 对每个样本每个通道, `score = (2 Σ p g + eps) / (Σ p² + Σ g² + eps)`,
/// 在 batch 上取平均后 `loss = 1 - score`; 总损失为各通道损失的平均.
#[derive(Debug, Clone, PartialEq)]
pub struct DiceLoss {
    num_classes: usize,
    eps: f64,
    values: Option<Vec<i32>>,
}

impl DiceLoss {
    /// 默认平滑项.
    pub const EPS: f64 = 1e-6;

    /// 接收整数标签的损失, `values[k]` 为第 `k` 个通道对应的标签取值.
    pub fn new(num_classes: usize, values: Vec<i32>) -> Result<Self, MetricError> {
        if num_classes == 0 {
            return Err(MetricError::NoClasses);
        }
        if values.len() != num_classes {
            return Err(MetricError::ValueCount {
                num_classes,
                values: values.len(),
            });
        }
        Ok(Self {
            num_classes,
            eps: Self::EPS,
            values: Some(values),
        })
    }

    /// 接收 one-hot 标签的损失.
    pub fn for_one_hot(num_classes: usize) -> Result<Self, MetricError> {
        if num_classes == 0 {
            return Err(MetricError::NoClasses);
        }
        Ok(Self {
            num_classes,
            eps: Self::EPS,
            values: None,
        })
    }

    /// 修改平滑项.
    #[inline]
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// 类别数.
    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// 以整数标签 `[B, H, W, L]` 计算损失.
    pub fn forward_labels(
        &self,
        pred: ArrayView5<f32>,
        gt: ArrayView4<i32>,
    ) -> Result<DiceOutput, MetricError> {
        let values = self.values.as_deref().ok_or(MetricError::MissingValues)?;
        let gt = one_hot(gt, values);
        self.forward_one_hot(pred, gt.view())
    }

    /// 以 one-hot 标签 `[B, K, H, W, L]` 计算损失.
    pub fn forward_one_hot(
        &self,
        pred: ArrayView5<f32>,
        gt: ArrayView5<f32>,
    ) -> Result<DiceOutput, MetricError> {
        if pred.shape() != gt.shape() || pred.len_of(Axis(1)) != self.num_classes {
            return Err(MetricError::Shape {
                prediction: pred.shape().to_vec(),
                ground_truth: gt.shape().to_vec(),
            });
        }
        let batch = pred.len_of(Axis(0));
        let mut score = Array1::<f64>::zeros(self.num_classes);
        for (p, g) in pred.outer_iter().zip(gt.outer_iter()) {
            for (k, (pk, gk)) in p.outer_iter().zip(g.outer_iter()).enumerate() {
                let (mut inter, mut union) = (0f64, 0f64);
                Zip::from(&pk).and(&gk).for_each(|&a, &b| {
                    let (a, b) = (a as f64, b as f64);
                    inter += a * b;
                    union += a * a + b * b;
                });
                score[k] += (2.0 * inter + self.eps) / (union + self.eps);
            }
        }
        if batch > 0 {
            score /= batch as f64;
        }
        let per_channel = score.mapv(|s| 1.0 - s);
        let overall = per_channel.mean().unwrap_or(0.0);
        Ok(DiceOutput {
            overall,
            per_channel,
        })
    }
}
