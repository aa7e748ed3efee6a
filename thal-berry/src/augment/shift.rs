use super::{check_pair, AugmentError, AugmentRng, Augmented, Transform, UniformRange};
use crate::ndimage;
use ndarray::{ArrayView3, ArrayView4};

/// 随机平移配置.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftConfig {
    range: UniformRange,
}

impl ShiftConfig {
    /// 每个空间轴的平移量在 `[low, high)` 内独立采样.
    pub fn new(low: f64, high: f64) -> Result<Self, AugmentError> {
        Ok(Self {
            range: UniformRange::new(low, high)?,
        })
    }

    /// 采样区间.
    #[inline]
    pub fn range(&self) -> UniformRange {
        self.range
    }
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            range: UniformRange {
                low: -5.0,
                high: 5.0,
            },
        }
    }
}

/// 随机亚体素平移, 形状不变.
#[derive(Debug, Clone)]
pub struct RandomShift {
    rng: AugmentRng,
    config: ShiftConfig,
}

impl RandomShift {
    /// 创建变换.
    pub fn new(rng: AugmentRng, config: ShiftConfig) -> Self {
        Self { rng, config }
    }
}

impl Transform for RandomShift {
    fn name(&self) -> &'static str {
        "shift"
    }

    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        check_pair(&volume, &label);
        let range = self.config.range;
        let offset = [(); 3].map(|_| range.sample(&mut self.rng));
        Augmented {
            volume: ndimage::shift(&volume, offset),
            label: ndimage::shift(&label, offset),
            details: format!(
                "shift_values:[{}, {}, {}]",
                offset[0], offset[1], offset[2]
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::test_util;
    use rand::SeedableRng;

    #[test]
    fn test_shift_shape_and_details() {
        let vol = test_util::volume(2, (8, 7, 6));
        let label = test_util::label((8, 7, 6));
        let mut t = RandomShift::new(AugmentRng::seed_from_u64(5), ShiftConfig::default());
        let out = t.apply(vol.view(), label.view());
        assert_eq!(out.volume.dim(), vol.dim());
        assert_eq!(out.label.dim(), label.dim());
        assert!(test_util::values_subset(&out.label));

        let inner = out
            .details
            .strip_prefix("shift_values:[")
            .and_then(|s| s.strip_suffix(']'))
            .unwrap();
        let values: Vec<f64> = inner.split(", ").map(|v| v.parse().unwrap()).collect();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| (-5.0..5.0).contains(v)));
    }

    /// 整数平移时标签严格按位移动.
    #[test]
    fn test_integer_shift_label() {
        let mut t = RandomShift::new(
            AugmentRng::seed_from_u64(0),
            ShiftConfig::new(2.0, 2.0).unwrap(),
        );
        let vol = test_util::volume(1, (6, 6, 6));
        let label = test_util::label((6, 6, 6));
        let out = t.apply(vol.view(), label.view());
        assert_eq!(out.details, "shift_values:[2, 2, 2]");
        assert_eq!(out.label[(4, 5, 3)], label[(2, 3, 1)]);
        // nearest 边界: 复制边缘.
        assert_eq!(out.label[(0, 1, 0)], label[(0, 0, 0)]);
    }
}
