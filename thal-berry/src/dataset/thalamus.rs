//! 丘脑数据集.
//!
//! 数据目录与标签目录中的文件各自按文件名排序后一一对应, 再由交叉验证划分
//! ([`super::split`]) 选出当前折当前划分的样本. 对应文件名 `_` 之前的部分
//! (受试者编号) 必须相同.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{Array3, Array4, Zip};

use super::split::{fold, Division};
use crate::augment::Compose;
use crate::consts::CROP_SIZE;
use crate::data::crop::{center_crop3, center_crop4, fit_to_shape3, fit_to_shape4};
use crate::{DwiVolume, Idx3d, LoadError, NucleiLabel};

/// 单个样本.
#[derive(Debug, Clone, PartialEq)]
pub struct ThalamusSample {
    /// 数据文件名.
    pub name: String,

    /// 体数据 `[C, H, W, L]`.
    pub volume: Array4<f32>,

    /// 第一阶段 (ROI) 标签 `[H, W, L]`.
    pub label: Array3<i32>,

    /// 第二阶段 (核团) 标签 `[H, W, L]`, 仅在数据集配置了核团标签目录时存在.
    pub nuclei: Option<Array3<i32>>,
}

/// 列出目录下所有条目的文件名, 升序.
fn sorted_names(dir: &Path) -> Result<Vec<String>, LoadError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// 文件名中的受试者编号, 即第一个 `_` 之前的部分.
#[inline]
fn subject_of(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

/// 一个标签目录.
#[derive(Debug, Clone)]
struct LabelDir {
    dir: PathBuf,
    files: Vec<String>,
}

impl LabelDir {
    fn open(dir: &Path) -> Result<Self, LoadError> {
        Ok(Self {
            dir: dir.to_owned(),
            files: sorted_names(dir)?,
        })
    }

    /// 第 `i` 个文件名, 并检查其受试者编号与 `data_name` 一致.
    fn name_for(&self, i: usize, data_name: &str) -> Result<&str, LoadError> {
        let name = self.files.get(i).ok_or(LoadError::OutOfRange {
            index: i,
            len: self.files.len(),
        })?;
        if subject_of(name) != subject_of(data_name) {
            return Err(LoadError::SubjectMismatch {
                data: data_name.to_owned(),
                label: name.clone(),
            });
        }
        Ok(name)
    }

    fn load(&self, name: &str) -> Result<Array3<i32>, LoadError> {
        Ok(NucleiLabel::open(self.dir.join(name))?.into_data())
    }
}

/// 某一折某一划分的丘脑数据集.
#[derive(Debug, Clone)]
pub struct ThalamusDataset {
    data_dir: PathBuf,
    data_files: Vec<String>,
    label: LabelDir,
    nuclei: Option<LabelDir>,
    indices: &'static [usize],
    fold: usize,
    division: Division,
    crop: Idx3d,
}

impl ThalamusDataset {
    /// 打开数据集. `data_dir` 存放多通道体数据, `label_dir` 存放 ROI 标签.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        data_dir: P,
        label_dir: Q,
        fold_index: usize,
        division: Division,
    ) -> Result<Self, LoadError> {
        let split = fold(fold_index)?;
        let data_dir = data_dir.as_ref().to_owned();
        let data_files = sorted_names(&data_dir)?;
        let label = LabelDir::open(label_dir.as_ref())?;
        debug!(
            "打开数据集 {}: 折 {fold_index}, 划分 {division}, {} 个数据文件",
            data_dir.display(),
            data_files.len()
        );
        Ok(Self {
            data_dir,
            data_files,
            label,
            nuclei: None,
            indices: split.indices(division),
            fold: fold_index,
            division,
            crop: CROP_SIZE,
        })
    }

    /// 额外加载第二阶段 (核团) 标签.
    pub fn with_nuclei<P: AsRef<Path>>(mut self, nuclei_dir: P) -> Result<Self, LoadError> {
        self.nuclei = Some(LabelDir::open(nuclei_dir.as_ref())?);
        Ok(self)
    }

    /// 修改裁剪尺寸, 默认为 [`CROP_SIZE`].
    #[inline]
    pub fn with_crop(mut self, crop: Idx3d) -> Self {
        self.crop = crop;
        self
    }

    /// 样本数.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// 是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// 折编号.
    #[inline]
    pub fn fold(&self) -> usize {
        self.fold
    }

    /// 划分.
    #[inline]
    pub fn division(&self) -> Division {
        self.division
    }

    /// 裁剪尺寸.
    #[inline]
    pub fn crop(&self) -> Idx3d {
        self.crop
    }

    /// 第 `idx` 个样本对应的数据文件名.
    pub fn name(&self, idx: usize) -> Result<&str, LoadError> {
        let i = *self.indices.get(idx).ok_or(LoadError::OutOfRange {
            index: idx,
            len: self.len(),
        })?;
        self.data_files
            .get(i)
            .map(String::as_str)
            .ok_or(LoadError::OutOfRange {
                index: i,
                len: self.data_files.len(),
            })
    }

    /// 读取第 `idx` 个样本, 不裁剪.
    fn load_raw(&self, idx: usize) -> Result<ThalamusSample, LoadError> {
        let name = self.name(idx)?;
        let i = self.indices[idx];
        let label_name = self.label.name_for(i, name)?;
        let nuclei_name = match &self.nuclei {
            Some(n) => Some(n.name_for(i, name)?),
            None => None,
        };

        let volume = DwiVolume::open(self.data_dir.join(name))?.into_data();
        let label = self.label.load(label_name)?;
        let (_, h, w, l) = volume.dim();
        if (h, w, l) != label.dim() {
            return Err(LoadError::ShapeMismatch {
                volume: (h, w, l),
                label: label.dim(),
            });
        }
        let nuclei = match (&self.nuclei, nuclei_name) {
            (Some(dir), Some(n)) => {
                let nuclei = dir.load(n)?;
                if nuclei.dim() != label.dim() {
                    return Err(LoadError::ShapeMismatch {
                        volume: (h, w, l),
                        label: nuclei.dim(),
                    });
                }
                Some(nuclei)
            }
            _ => None,
        };
        Ok(ThalamusSample {
            name: name.to_owned(),
            volume,
            label,
            nuclei,
        })
    }

    /// 读取第 `idx` 个样本, 并中心裁剪到裁剪尺寸.
    ///
    /// # 注意
    ///
    /// 原始数据任一空间轴小于裁剪尺寸时 panic.
    pub fn get(&self, idx: usize) -> Result<ThalamusSample, LoadError> {
        let s = self.load_raw(idx)?;
        Ok(ThalamusSample {
            name: s.name,
            volume: center_crop4(s.volume.view(), self.crop),
            label: center_crop3(s.label.view(), self.crop),
            nuclei: s.nuclei.map(|n| center_crop3(n.view(), self.crop)),
        })
    }

    /// 读取第 `idx` 个样本, 中心裁剪后做一次随机组合增强, 再裁剪或补零回裁剪尺寸.
    ///
    /// ROI 标签与核团标签经过完全相同的变换.
    pub fn get_augmented(
        &self,
        idx: usize,
        compose: &mut Compose,
    ) -> Result<ThalamusSample, LoadError> {
        let s = self.get(idx)?;
        let packed = match &s.nuclei {
            Some(n) => pack_labels(&s.label, n)?,
            None => s.label.clone(),
        };
        let out = compose.apply(s.volume.view(), packed.view());
        debug!("{}: {}", s.name, out.details);

        let volume = fit_to_shape4(out.volume.view(), self.crop);
        let packed = fit_to_shape3(out.label.view(), self.crop);
        let (label, nuclei) = match s.nuclei {
            Some(_) => {
                let (l, n) = unpack_labels(&packed);
                (l, Some(n))
            }
            None => (packed, None),
        };
        Ok(ThalamusSample {
            name: s.name,
            volume,
            label,
            nuclei,
        })
    }

    /// 按顺序迭代全部样本.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Result<ThalamusSample, LoadError>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

const PACK_SHIFT: u32 = 15;
const PACK_MASK: i32 = (1 << PACK_SHIFT) - 1;

/// 将两个同形状标签打包为一个. 最近邻重采样对打包值与对两个标签分别采样结果相同.
fn pack_labels(roi: &Array3<i32>, nuclei: &Array3<i32>) -> Result<Array3<i32>, LoadError> {
    let bad = roi
        .iter()
        .chain(nuclei.iter())
        .find(|&&v| !(0..=PACK_MASK).contains(&v));
    if let Some(&v) = bad {
        return Err(LoadError::LabelOutOfRange(v));
    }
    let mut out = Array3::zeros(roi.dim());
    Zip::from(&mut out)
        .and(roi)
        .and(nuclei)
        .for_each(|o, &r, &n| *o = (n << PACK_SHIFT) | r);
    Ok(out)
}

fn unpack_labels(packed: &Array3<i32>) -> (Array3<i32>, Array3<i32>) {
    (
        packed.mapv(|v| v & PACK_MASK),
        packed.mapv(|v| v >> PACK_SHIFT),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::augment::{AugmentRng, HorizontalFlip};
    use crate::consts::DATASET_LEN;
    use crate::{write_label, write_volume};
    use rand::SeedableRng;
    use tempfile::TempDir;

    /// 在临时目录下生成 24 个会话的小型数据集, 返回 (根目录, 数据, ROI, 核团) 目录.
    pub(crate) fn fake_dataset(shape: Idx3d) -> (TempDir, PathBuf, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let dirs = ["data", "roi", "nuclei"].map(|d| root.path().join(d));
        for d in dirs.iter() {
            fs::create_dir(d).unwrap();
        }
        for i in 0..DATASET_LEN {
            let subject = format!("MTBI{i:03}");
            let vol = Array4::from_shape_fn((2, shape.0, shape.1, shape.2), |(c, h, w, l)| {
                (i * 10 + c) as f32 + (h + w + l) as f32 * 0.01
            });
            let roi = Array3::from_shape_fn(shape, |(h, _, _)| (h % 2) as i32);
            let nuclei = Array3::from_shape_fn(shape, |(h, w, _)| ((h + w) % 4) as i32 * (h % 2) as i32);
            write_volume(dirs[0].join(format!("{subject}_v1_data.nii")), &vol, None).unwrap();
            write_label(dirs[1].join(format!("{subject}_v1_roi.nii")), &roi, None).unwrap();
            write_label(dirs[2].join(format!("{subject}_v1_nuclei.nii")), &nuclei, None).unwrap();
        }
        let [d, r, n] = dirs;
        (root, d, r, n)
    }

    #[test]
    fn test_get_and_crop() {
        let (_root, d, r, n) = fake_dataset((6, 5, 4));
        let ds = ThalamusDataset::open(&d, &r, 0, Division::Test)
            .unwrap()
            .with_nuclei(&n)
            .unwrap()
            .with_crop((4, 4, 4));
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.name(2).unwrap(), "MTBI002_v1_data.nii");

        let s = ds.get(1).unwrap();
        assert_eq!(s.volume.dim(), (2, 4, 4, 4));
        assert_eq!(s.label.dim(), (4, 4, 4));
        assert_eq!(s.nuclei.as_ref().map(|n| n.dim()), Some((4, 4, 4)));
        // h 方向从 1 开始裁剪.
        assert_eq!(s.label[(0, 0, 0)], 1);
        assert!((s.volume[(1, 0, 0, 0)] - 11.01).abs() < 1e-5);

        assert!(matches!(ds.get(3), Err(LoadError::OutOfRange { index: 3, len: 3 })));
        assert_eq!(ds.iter().len(), 3);
    }

    #[test]
    fn test_subject_mismatch() {
        let (_root, d, r, _) = fake_dataset((4, 4, 4));
        fs::rename(r.join("MTBI003_v1_roi.nii"), r.join("MTBI003x_v1_roi.nii")).unwrap();
        let ds = ThalamusDataset::open(&d, &r, 0, Division::Val)
            .unwrap()
            .with_crop((4, 4, 4));
        assert!(matches!(ds.get(0), Err(LoadError::SubjectMismatch { .. })));
    }

    #[test]
    fn test_unknown_fold() {
        let (_root, d, r, _) = fake_dataset((4, 4, 4));
        assert!(matches!(
            ThalamusDataset::open(&d, &r, 9, Division::Train),
            Err(LoadError::UnknownFold(9))
        ));
    }

    /// 两个标签经过同一变换.
    #[test]
    fn test_augment_keeps_labels_aligned() {
        let (_root, d, r, n) = fake_dataset((6, 6, 6));
        let ds = ThalamusDataset::open(&d, &r, 1, Division::Train)
            .unwrap()
            .with_nuclei(&n)
            .unwrap()
            .with_crop((6, 6, 6));
        let plain = ds.get(0).unwrap();
        let mut compose = Compose::with_default_pool(5);
        for _ in 0..4 {
            let s = ds.get_augmented(0, &mut compose).unwrap();
            assert_eq!(s.volume.dim(), (2, 6, 6, 6));
            let nuclei = s.nuclei.unwrap();
            // 核团标签只在 ROI 内部非零.
            Zip::from(&s.label).and(&nuclei).for_each(|&r, &n| {
                assert!(r == 1 || n == 0);
            });
            assert_eq!(s.name, plain.name);
        }

        let mut flip = Compose::new(AugmentRng::seed_from_u64(0), vec![Box::new(HorizontalFlip)]);
        let s = ds.get_augmented(0, &mut flip).unwrap();
        assert_eq!(s.nuclei.unwrap().dim(), (6, 6, 6));
    }

    #[test]
    fn test_pack_round_trip() {
        let roi = Array3::from_shape_fn((2, 2, 2), |(h, w, l)| ((h + w + l) % 2) as i32);
        let nuclei = Array3::from_shape_fn((2, 2, 2), |(h, w, l)| (h * 4 + w * 2 + l) as i32);
        let packed = pack_labels(&roi, &nuclei).unwrap();
        assert_eq!(unpack_labels(&packed), (roi.clone(), nuclei));

        let neg = Array3::from_elem((2, 2, 2), -1);
        assert!(matches!(pack_labels(&roi, &neg), Err(LoadError::LabelOutOfRange(-1))));
    }
}
