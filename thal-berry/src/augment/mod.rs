//! 几何数据增强.
//!
//! 每个变换同时作用于体数据 `[C, H, W, L]` 与标签 `[H, W, L]`, 并返回采样参数的文字描述.
//! 插值策略由 [`crate::ndimage::Resample`] 按数据类型固定:
//! 体数据逐通道三次 B 样条 + reflect, 标签最近邻 + nearest.
//!
//! 每个随机变换持有自己的随机源 ([`AugmentRng`]), 不依赖任何进程级全局状态.
//! 多线程加载时, 每个工作线程应持有独立播种的变换.

use ndarray::{Array3, Array4, ArrayView3, ArrayView4};
use rand::Rng;
use thiserror::Error;

mod compose;
mod elastic;
mod flip;
mod rotate;
mod shift;
mod zoom;

pub use compose::Compose;
pub use elastic::{ElasticConfig, ElasticDeformation};
pub use flip::HorizontalFlip;
pub use rotate::{RandomRotate, RotateConfig};
pub use shift::{RandomShift, ShiftConfig};
pub use zoom::{RandomZoom, ZoomConfig};

/// 数据增强使用的随机源.
pub type AugmentRng = rand::rngs::StdRng;

/// 一次变换的结果.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmented {
    /// 变换后的体数据.
    pub volume: Array4<f32>,

    /// 变换后的标签.
    pub label: Array3<i32>,

    /// 采样参数描述. 未执行任何变换时为空串.
    pub details: String,
}

impl Augmented {
    /// 不做任何变换, 仅复制输入.
    pub fn unchanged(volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Self {
        Self {
            volume: volume.to_owned(),
            label: label.to_owned(),
            details: String::new(),
        }
    }
}

/// 空间变换.
pub trait Transform: Send {
    /// 变换名.
    fn name(&self) -> &'static str;

    /// 对一对 (体数据, 标签) 做变换. 输入不会被修改.
    ///
    /// # 注意
    ///
    /// 体数据与标签空间形状不一致时 panic.
    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented;
}

/// 增强配置错误.
#[derive(Debug, Error, PartialEq)]
pub enum AugmentError {
    /// 旋转平面列表为空.
    #[error("旋转平面列表为空")]
    EmptyAxes,

    /// 旋转平面的两个轴相同或越界.
    #[error("非法旋转平面 {0:?}")]
    InvalidAxisPair((usize, usize)),

    /// 旋转角度范围为 0.
    #[error("旋转角度范围必须为正")]
    ZeroAngleSpectrum,

    /// 采样区间上界小于下界.
    #[error("非法采样区间 [{low}, {high})")]
    InvalidRange {
        /// 下界.
        low: f64,
        /// 上界.
        high: f64,
    },

    /// 缩放系数非正.
    #[error("缩放系数必须为正, 实际下界为 {0}")]
    NonPositiveZoom(f64),

    /// 高斯平滑标准差为负.
    #[error("sigma 不能为负: {0}")]
    NegativeSigma(f64),

    /// 形变幅度为负.
    #[error("alpha 不能为负: {0}")]
    NegativeAlpha(f64),

    /// 参数不是有限值.
    #[error("参数 `{0}` 不是有限值")]
    NonFinite(&'static str),
}

/// 半开区间 `[low, high)` 上的均匀分布. `low == high` 时退化为常数.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRange {
    low: f64,
    high: f64,
}

impl UniformRange {
    /// 创建区间, 检查端点有限且 `low <= high`.
    pub fn new(low: f64, high: f64) -> Result<Self, AugmentError> {
        if !low.is_finite() {
            return Err(AugmentError::NonFinite("low"));
        }
        if !high.is_finite() {
            return Err(AugmentError::NonFinite("high"));
        }
        if low > high {
            return Err(AugmentError::InvalidRange { low, high });
        }
        Ok(Self { low, high })
    }

    /// 下界.
    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// 上界.
    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// 采样一次.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.low == self.high {
            self.low
        } else {
            rng.random_range(self.low..self.high)
        }
    }
}

/// 检查体数据与标签的空间形状一致.
#[inline]
pub(crate) fn check_pair(volume: &ArrayView4<f32>, label: &ArrayView3<i32>) {
    let (_, h, w, l) = volume.dim();
    assert_eq!(
        (h, w, l),
        label.dim(),
        "体数据空间形状与标签形状不一致"
    );
}

#[cfg(test)]
pub(crate) mod test_util {
    use ndarray::{Array3, Array4};

    /// 通道间数值不同, 空间上平滑变化的测试体数据.
    pub fn volume(c: usize, shape: (usize, usize, usize)) -> Array4<f32> {
        Array4::from_shape_fn((c, shape.0, shape.1, shape.2), |(c, h, w, l)| {
            (c as f32 + 1.0) * ((h as f32 * 0.3).sin() + (w as f32 * 0.2).cos() + l as f32 * 0.05)
        })
    }

    /// 取值为 `{0, 1, 5}` 的块状测试标签.
    pub fn label(shape: (usize, usize, usize)) -> Array3<i32> {
        Array3::from_shape_fn(shape, |(h, w, l)| match (h / 3 + w / 4 + l / 2) % 3 {
            0 => 0,
            1 => 1,
            _ => 5,
        })
    }

    /// 标签取值是否都在 `{0, 1, 5}` 中.
    pub fn values_subset(label: &Array3<i32>) -> bool {
        label.iter().all(|v| matches!(v, 0 | 1 | 5))
    }
}
