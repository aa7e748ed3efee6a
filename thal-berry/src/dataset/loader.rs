//! 批量加载器.

use log::debug;
use ndarray::{stack, Array4, Array5, ArrayView3, ArrayView4, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::thalamus::{ThalamusDataset, ThalamusSample};
use crate::augment::{AugmentRng, Compose};
use crate::LoadError;

/// 加载器配置.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// 每批样本数, 必须为正.
    pub batch_size: usize,

    /// 每个 epoch 是否打乱样本顺序.
    pub shuffle: bool,

    /// 随机种子. 打乱顺序与逐样本增强都由它派生.
    pub seed: u64,

    /// 是否对每个样本做随机组合增强.
    pub augment: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            seed: 1234,
            augment: false,
        }
    }
}

impl LoaderConfig {
    /// 训练集常用配置: 打乱, 批大小 4.
    pub fn train(seed: u64) -> Self {
        Self {
            batch_size: 4,
            shuffle: true,
            seed,
            ..Self::default()
        }
    }
}

/// 一批样本.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 各样本的数据文件名.
    pub names: Vec<String>,

    /// 体数据 `[B, C, H, W, L]`.
    pub volume: Array5<f32>,

    /// ROI 标签 `[B, H, W, L]`.
    pub label: Array4<i32>,

    /// 核团标签 `[B, H, W, L]`. 仅当每个样本都带核团标签时存在.
    pub nuclei: Option<Array4<i32>>,
}

impl Batch {
    /// 批大小.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 把若干样本拼接为一批. 样本形状必须一致.
    pub fn collate(samples: Vec<ThalamusSample>) -> Result<Self, LoadError> {
        let volumes: Vec<ArrayView4<f32>> = samples.iter().map(|s| s.volume.view()).collect();
        let labels: Vec<ArrayView3<i32>> = samples.iter().map(|s| s.label.view()).collect();
        let volume = stack(Axis(0), &volumes)?;
        let label = stack(Axis(0), &labels)?;
        let nuclei = samples
            .iter()
            .map(|s| s.nuclei.as_ref().map(|n| n.view()))
            .collect::<Option<Vec<_>>>()
            .filter(|v| !v.is_empty())
            .map(|v| stack(Axis(0), &v))
            .transpose()?;
        Ok(Self {
            names: samples.into_iter().map(|s| s.name).collect(),
            volume,
            label,
            nuclei,
        })
    }
}

/// 由 `(seed, epoch, index)` 派生一个 64 位种子 (SplitMix64 终混).
pub fn mix_seed(seed: u64, epoch: u64, index: u64) -> u64 {
    let mut z = seed
        ^ epoch.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ index.wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// 单个 epoch 的批量加载器, 迭代产生 [`Batch`].
///
/// 同一 `(seed, epoch)` 下样本顺序与每个样本的增强结果都是确定的,
/// 与是否启用 `rayon` 无关.
#[derive(Debug)]
pub struct ThalamusLoader<'a> {
    dataset: &'a ThalamusDataset,
    config: LoaderConfig,
    epoch: u64,
    order_rev: Vec<usize>,
}

impl<'a> ThalamusLoader<'a> {
    /// 创建第 `epoch` 个 epoch 的加载器.
    ///
    /// # 注意
    ///
    /// `config.batch_size == 0` 时 panic.
    pub fn new(dataset: &'a ThalamusDataset, config: LoaderConfig, epoch: u64) -> Self {
        assert!(config.batch_size > 0, "batch_size 必须为正");
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if config.shuffle {
            let mut rng = AugmentRng::seed_from_u64(mix_seed(config.seed, epoch, u64::MAX));
            order.shuffle(&mut rng);
        }
        debug!("epoch {epoch} 样本顺序: {order:?}");
        order.reverse();
        Self {
            dataset,
            config,
            epoch,
            order_rev: order,
        }
    }

    /// 加载器配置.
    #[inline]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// 读取单个样本.
    fn load(&self, idx: usize) -> Result<ThalamusSample, LoadError> {
        if self.config.augment {
            let seed = mix_seed(self.config.seed, self.epoch, idx as u64);
            let mut compose = Compose::with_default_pool(seed);
            self.dataset.get_augmented(idx, &mut compose)
        } else {
            self.dataset.get(idx)
        }
    }

    fn load_all(&self, idx: &[usize]) -> Result<Vec<ThalamusSample>, LoadError> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                use rayon::prelude::*;
                idx.par_iter().map(|&i| self.load(i)).collect()
            } else {
                idx.iter().map(|&i| self.load(i)).collect()
            }
        }
    }
}

impl Iterator for ThalamusLoader<'_> {
    type Item = Result<Batch, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.order_rev.is_empty() {
            return None;
        }
        let take = self.config.batch_size.min(self.order_rev.len());
        let idx: Vec<usize> = self
            .order_rev
            .split_off(self.order_rev.len() - take)
            .into_iter()
            .rev()
            .collect();
        Some(self.load_all(&idx).and_then(Batch::collate))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.len();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ThalamusLoader<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.order_rev.len().div_ceil(self.config.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::thalamus::tests::fake_dataset;
    use crate::dataset::Division;

    #[test]
    fn test_batches_in_order() {
        let (_root, d, r, n) = fake_dataset((4, 4, 4));
        let ds = ThalamusDataset::open(&d, &r, 0, Division::Train)
            .unwrap()
            .with_nuclei(&n)
            .unwrap()
            .with_crop((4, 4, 4));
        let config = LoaderConfig {
            batch_size: 4,
            ..LoaderConfig::default()
        };
        let loader = ThalamusLoader::new(&ds, config, 0);
        assert_eq!(loader.len(), 5);

        let batches: Vec<Batch> = loader.map(Result::unwrap).collect();
        assert_eq!(batches.len(), 5);
        assert_eq!(batches[0].volume.dim(), (4, 2, 4, 4, 4));
        assert_eq!(batches[0].label.dim(), (4, 4, 4, 4));
        assert_eq!(batches[4].len(), 3);
        assert_eq!(batches[4].nuclei.as_ref().map(|n| n.dim()), Some((3, 4, 4, 4)));
        // 第 0 折训练集从 5 号开始.
        assert_eq!(batches[0].names[0], "MTBI005_v1_data.nii");
        assert_eq!(batches[4].names[2], "MTBI023_v1_data.nii");
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let (_root, d, r, _) = fake_dataset((4, 4, 4));
        let ds = ThalamusDataset::open(&d, &r, 3, Division::Train)
            .unwrap()
            .with_crop((4, 4, 4));
        let names = |epoch| -> Vec<String> {
            ThalamusLoader::new(&ds, LoaderConfig::train(7), epoch)
                .flat_map(|b| b.unwrap().names)
                .collect()
        };
        let a = names(0);
        assert_eq!(a, names(0));
        assert_eq!(a.len(), 19);
        let mut sorted = a.clone();
        sorted.sort();
        let mut b = names(1);
        assert_ne!(a, b);
        b.sort();
        assert_eq!(sorted, b);
    }

    #[test]
    fn test_augmented_batches_deterministic() {
        let (_root, d, r, _) = fake_dataset((6, 6, 6));
        let ds = ThalamusDataset::open(&d, &r, 0, Division::Val)
            .unwrap()
            .with_crop((6, 6, 6));
        let config = LoaderConfig {
            batch_size: 2,
            augment: true,
            ..LoaderConfig::default()
        };
        let a: Vec<Batch> = ThalamusLoader::new(&ds, config, 2).map(Result::unwrap).collect();
        let b: Vec<Batch> = ThalamusLoader::new(&ds, config, 2).map(Result::unwrap).collect();
        assert_eq!(a, b);
        assert_eq!(a[0].volume.dim(), (2, 2, 6, 6, 6));
        assert!(a[0].nuclei.is_none());
    }

    #[test]
    fn test_mix_seed_spreads() {
        assert_ne!(mix_seed(0, 0, 0), mix_seed(0, 0, 1));
        assert_ne!(mix_seed(0, 1, 0), mix_seed(0, 0, 1));
        assert_eq!(mix_seed(3, 4, 5), mix_seed(3, 4, 5));
    }
}
