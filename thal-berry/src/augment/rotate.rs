use super::{check_pair, AugmentError, AugmentRng, Augmented, Transform};
use crate::ndimage;
use ndarray::{ArrayView3, ArrayView4};
use rand::Rng;

/// 随机旋转配置.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateConfig {
    angle_spectrum: u32,
    axes: Vec<(usize, usize)>,
}

impl RotateConfig {
    /// 角度在 `[-angle_spectrum, angle_spectrum)` 内取整数, 旋转平面从 `axes` 中均匀选取.
    pub fn new(angle_spectrum: u32, axes: Vec<(usize, usize)>) -> Result<Self, AugmentError> {
        if angle_spectrum == 0 {
            return Err(AugmentError::ZeroAngleSpectrum);
        }
        if axes.is_empty() {
            return Err(AugmentError::EmptyAxes);
        }
        if let Some(&bad) = axes.iter().find(|(a, b)| a == b || *a > 2 || *b > 2) {
            return Err(AugmentError::InvalidAxisPair(bad));
        }
        Ok(Self {
            angle_spectrum,
            axes,
        })
    }

    /// 角度范围.
    #[inline]
    pub fn angle_spectrum(&self) -> u32 {
        self.angle_spectrum
    }

    /// 候选旋转平面.
    #[inline]
    pub fn axes(&self) -> &[(usize, usize)] {
        &self.axes
    }
}

impl Default for RotateConfig {
    /// 15 度, 三个坐标平面.
    fn default() -> Self {
        Self {
            angle_spectrum: 15,
            axes: vec![(1, 0), (2, 1), (2, 0)],
        }
    }
}

/// 随机选取旋转平面和整数角度, 绕数组中心旋转, 形状不变.
#[derive(Debug, Clone)]
pub struct RandomRotate {
    rng: AugmentRng,
    config: RotateConfig,
}

impl RandomRotate {
    /// 创建变换.
    pub fn new(rng: AugmentRng, config: RotateConfig) -> Self {
        Self { rng, config }
    }

    /// 采样 (旋转平面, 角度).
    fn draw(&mut self) -> ((usize, usize), i32) {
        let axes = self.config.axes[self.rng.random_range(0..self.config.axes.len())];
        let s = self.config.angle_spectrum as i32;
        (axes, self.rng.random_range(-s..s))
    }
}

impl Transform for RandomRotate {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        check_pair(&volume, &label);
        let (axes, angle) = self.draw();
        let degrees = angle as f64;
        Augmented {
            volume: ndimage::rotate(&volume, axes, degrees),
            label: ndimage::rotate(&label, axes, degrees),
            details: format!("rotate_angle:{angle}_axis:({}, {})", axes.0, axes.1),
        }
    }
}
