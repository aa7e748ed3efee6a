use super::{check_pair, AugmentError, AugmentRng, Augmented, Transform, UniformRange};
use crate::ndimage;
use ndarray::{ArrayView3, ArrayView4};

/// 随机缩放配置.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomConfig {
    range: UniformRange,
}

impl ZoomConfig {
    /// 缩放系数在 `[low, high)` 内均匀采样, 要求 `0 < low <= high`.
    pub fn new(low: f64, high: f64) -> Result<Self, AugmentError> {
        let range = UniformRange::new(low, high)?;
        if low <= 0.0 {
            return Err(AugmentError::NonPositiveZoom(low));
        }
        Ok(Self { range })
    }

    /// 采样区间.
    #[inline]
    pub fn range(&self) -> UniformRange {
        self.range
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            range: UniformRange {
                low: 0.85,
                high: 1.15,
            },
        }
    }
}

/// 随机各向同性缩放.
///
/// 输出空间形状为 `round(dim * factor)`, 与输入不同. 调用方负责之后的裁剪或补零.
#[derive(Debug, Clone)]
pub struct RandomZoom {
    rng: AugmentRng,
    config: ZoomConfig,
}

impl RandomZoom {
    /// 创建变换.
    pub fn new(rng: AugmentRng, config: ZoomConfig) -> Self {
        Self { rng, config }
    }
}

impl Transform for RandomZoom {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        check_pair(&volume, &label);
        let factor = self.config.range.sample(&mut self.rng);
        Augmented {
            volume: ndimage::zoom(&volume, factor),
            label: ndimage::zoom(&label, factor),
            details: format!("zoom_factor:{factor}"),
        }
    }
}
