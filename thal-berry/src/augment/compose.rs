use super::{
    AugmentRng, Augmented, ElasticConfig, ElasticDeformation, HorizontalFlip, RandomRotate,
    RandomShift, RandomZoom, RotateConfig, ShiftConfig, Transform, ZoomConfig,
};
use log::debug;
use ndarray::{Array3, Array4, ArrayView3, ArrayView4};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// 随机组合变换.
///
/// 每次调用先打乱变换池顺序, 然后进行两轮抽取: 每轮从池中均匀选出一个变换,
/// 以 0.5 的概率作用在当前结果上. 同一变换可能被选中两次, 此时两次采样相互独立.
/// 描述按执行顺序以 `|` 连接.
pub struct Compose {
    rng: AugmentRng,
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    /// 抽取轮数.
    pub const ROUNDS: usize = 2;

    /// 每轮被选中的变换的执行概率.
    pub const APPLY_PROBABILITY: f64 = 0.5;

    /// 由自定义变换池创建. `rng` 仅用于选择与打乱, 各变换使用自己的随机源.
    pub fn new(rng: AugmentRng, transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { rng, transforms }
    }

    /// 由 `seed` 创建包含全部五种默认配置变换的组合. 每个变换的随机源由同一主随机源派生.
    pub fn with_default_pool(seed: u64) -> Self {
        let mut master = AugmentRng::seed_from_u64(seed);
        let rng = AugmentRng::from_rng(&mut master);
        let transforms: Vec<Box<dyn Transform>> = vec![
            Box::new(RandomRotate::new(
                AugmentRng::from_rng(&mut master),
                RotateConfig::default(),
            )),
            Box::new(HorizontalFlip::new()),
            Box::new(RandomZoom::new(
                AugmentRng::from_rng(&mut master),
                ZoomConfig::default(),
            )),
            Box::new(RandomShift::new(
                AugmentRng::from_rng(&mut master),
                ShiftConfig::default(),
            )),
            Box::new(ElasticDeformation::new(
                AugmentRng::from_rng(&mut master),
                ElasticConfig::default(),
            )),
        ];
        Self { rng, transforms }
    }

    /// 变换池大小.
    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// 变换池是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// 变换池中各变换的名字, 按当前顺序.
    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// 对一对 (体数据, 标签) 做随机组合增强. 变换池为空时原样返回, 描述为空串.
    pub fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        if self.transforms.is_empty() {
            return Augmented::unchanged(volume, label);
        }
        self.transforms.shuffle(&mut self.rng);

        let mut current: Option<(Array4<f32>, Array3<i32>)> = None;
        let mut details = Vec::with_capacity(Self::ROUNDS);
        for round in 0..Self::ROUNDS {
            let idx = self.rng.random_range(0..self.transforms.len());
            if self.rng.random::<f64>() >= Self::APPLY_PROBABILITY {
                continue;
            }
            let t = &mut self.transforms[idx];
            let out = match &current {
                Some((v, l)) => t.apply(v.view(), l.view()),
                None => t.apply(volume.view(), label.view()),
            };
            debug!("第 {round} 轮执行 {}: {}", t.name(), out.details);
            if !out.details.is_empty() {
                details.push(out.details);
            }
            current = Some((out.volume, out.label));
        }

        match current {
            Some((volume, label)) => Augmented {
                volume,
                label,
                details: details.join("|"),
            },
            None => Augmented::unchanged(volume, label),
        }
    }
}

impl Transform for Compose {
    fn name(&self) -> &'static str {
        "compose"
    }

    #[inline]
    fn apply(&mut self, volume: ArrayView4<f32>, label: ArrayView3<i32>) -> Augmented {
        Compose::apply(self, volume, label)
    }
}

impl std::fmt::Debug for Compose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compose")
            .field("transforms", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::test_util;
    use ndarray::{s, Array3, Array4};

    #[test]
    fn test_empty_pool() {
        let vol = test_util::volume(2, (4, 4, 4));
        let label = test_util::label((4, 4, 4));
        let mut c = Compose::new(AugmentRng::seed_from_u64(0), vec![]);
        assert!(c.is_empty());
        let out = c.apply(vol.view(), label.view());
        assert_eq!(out.volume, vol);
        assert_eq!(out.label, label);
        assert_eq!(out.details, "");
    }

    /// 单一翻转变换池: 执行次数由描述决定, 输出与之对应.
    #[test]
    fn test_flip_only_pool() {
        let vol = Array4::<f32>::from_shape_fn((2, 10, 10, 10), |(c, h, w, l)| {
            (c * 1000 + h * 100 + w * 10 + l) as f32
        });
        let label = Array3::<i32>::ones((10, 10, 10));
        let flipped = vol.slice(s![.., ..;-1, .., ..]).to_owned();

        for seed in 0..8 {
            let mut c = Compose::new(
                AugmentRng::seed_from_u64(seed),
                vec![Box::new(HorizontalFlip::new())],
            );
            let out = c.apply(vol.view(), label.view());
            assert_eq!(out.label, label);
            match out.details.as_str() {
                "" | "flip_axis:0|flip_axis:0" => assert_eq!(out.volume, vol),
                "flip_axis:0" => assert_eq!(out.volume, flipped),
                other => panic!("unexpected details {other}"),
            }
        }
    }

    #[test]
    fn test_seed_determinism() {
        let vol = test_util::volume(2, (10, 9, 8));
        let label = test_util::label((10, 9, 8));
        for seed in [0, 1, 17] {
            let mut a = Compose::with_default_pool(seed);
            let mut b = Compose::with_default_pool(seed);
            for _ in 0..3 {
                let x = a.apply(vol.view(), label.view());
                let y = b.apply(vol.view(), label.view());
                assert_eq!(x, y);
                assert!(test_util::values_subset(&x.label));
                assert!(x.details.split('|').filter(|d| !d.is_empty()).count() <= 2);
            }
            assert_eq!(a.names(), b.names());
        }
    }

    /// 各描述都应来自池中的某个变换.
    #[test]
    fn test_details_prefixes() {
        let vol = test_util::volume(1, (6, 6, 6));
        let label = test_util::label((6, 6, 6));
        let mut c = Compose::new(
            AugmentRng::seed_from_u64(3),
            vec![
                Box::new(HorizontalFlip::new()),
                Box::new(RandomShift::new(
                    AugmentRng::seed_from_u64(4),
                    ShiftConfig::default(),
                )),
            ],
        );
        let mut applied = 0;
        for _ in 0..20 {
            let out = c.apply(vol.view(), label.view());
            assert_eq!(out.volume.dim(), vol.dim());
            for d in out.details.split('|').filter(|d| !d.is_empty()) {
                assert!(d == "flip_axis:0" || d.starts_with("shift_values:["), "{d}");
                applied += 1;
            }
        }
        assert!(applied > 0);
    }
}
