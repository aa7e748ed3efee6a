use super::{check_pair, Augmented, Transform};
use ndarray::{ArrayView3, ArrayView4, Axis};

/// 沿空间第 0 轴 (左右) 镜像. 没有随机性, 不做插值.
#[derive(Debug, Clone, Copy, Default)]
pub struct HorizontalFlip;

impl HorizontalFlip {
    /// 镜像所沿的空间轴.
    pub const AXIS: usize = 0;

    /// 创建变换.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Transform for HorizontalFlip {
    fn name(&self) -> &'static str {
        "flip"
    }

    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        check_pair(&volume, &label);

        // 体数据第 0 维为通道.
        let mut v = volume;
        v.invert_axis(Axis(Self::AXIS + 1));
        let mut l = label;
        l.invert_axis(Axis(Self::AXIS));

        let volume = v.as_standard_layout().into_owned();
        let label = l.as_standard_layout().into_owned();
        Augmented {
            volume,
            label,
            details: format!("flip_axis:{}", Self::AXIS),
        }
    }
}
