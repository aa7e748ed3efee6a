use super::{check_pair, AugmentError, AugmentRng, Augmented, Transform};
use crate::ndimage::{self, gaussian_filter, Displacement};
use crate::Idx3d;
use ndarray::{Array3, ArrayView3, ArrayView4};
use rand::Rng;
use rand_distr::StandardNormal;

/// 弹性形变配置.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticConfig {
    alpha: f64,
    sigma: f64,
}

impl ElasticConfig {
    /// `alpha` 为位移幅度, `sigma` 为平滑噪声的高斯标准差 (体素). 两者均须为非负有限值.
    pub fn new(alpha: f64, sigma: f64) -> Result<Self, AugmentError> {
        if !alpha.is_finite() {
            return Err(AugmentError::NonFinite("alpha"));
        }
        if !sigma.is_finite() {
            return Err(AugmentError::NonFinite("sigma"));
        }
        if alpha < 0.0 {
            return Err(AugmentError::NegativeAlpha(alpha));
        }
        if sigma < 0.0 {
            return Err(AugmentError::NegativeSigma(sigma));
        }
        Ok(Self { alpha, sigma })
    }

    /// 位移幅度.
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// 高斯平滑标准差.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            alpha: 2000.0,
            sigma: 50.0,
        }
    }
}

/// 逐体素弹性形变.
///
/// 每个空间轴各生成一个位移场: 标准正态噪声经高斯平滑 (reflect) 后乘以 `alpha`.
/// 采样坐标为规则网格加位移场, 形状不变.
#[derive(Debug, Clone)]
pub struct ElasticDeformation {
    rng: AugmentRng,
    config: ElasticConfig,
}

impl ElasticDeformation {
    /// 创建变换.
    pub fn new(rng: AugmentRng, config: ElasticConfig) -> Self {
        Self { rng, config }
    }

    /// 生成单个轴的位移分量.
    fn field(&mut self, shape: Idx3d) -> Array3<f64> {
        let noise =
            Array3::from_shape_simple_fn(shape, || self.rng.sample::<f64, _>(StandardNormal));
        let mut d = gaussian_filter(noise.view(), self.config.sigma);
        d *= self.config.alpha;
        d
    }
}

impl Transform for ElasticDeformation {
    fn name(&self) -> &'static str {
        "elastic"
    }

    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        check_pair(&volume, &label);
        let ElasticConfig { alpha, sigma } = self.config;
        let details = format!("elastic_alpha:{alpha} sigma:{sigma}");

        // 位移恒为 0, 跳过噪声生成.
        if alpha == 0.0 {
            return Augmented {
                details,
                ..Augmented::unchanged(volume, label)
            };
        }

        let shape = label.dim();
        let fields = [self.field(shape), self.field(shape), self.field(shape)];
        let displacement = Displacement::new(fields);
        Augmented {
            volume: ndimage::map_coordinates(&volume, &displacement),
            label: ndimage::map_coordinates(&label, &displacement),
            details,
        }
    }
}
