//! 两阶段预测结果的合并与写出.

use super::components::remove_small_components;
use crate::data::crop::pad_to_shape;
use crate::{write_label, Idx3d, LoadError};
use ndarray::{Array3, ArrayView3, Zip};
use nifti::NiftiHeader;
use std::path::{Path, PathBuf};

/// 两阶段合并: 逐体素相乘.
///
/// 第一阶段结果为 {0, 1}, 第二阶段为核团编号, 乘积即 ROI 内的核团编号.
pub fn combine_stages(roi: ArrayView3<i32>, nuclei: ArrayView3<i32>) -> Array3<i32> {
    assert_eq!(roi.dim(), nuclei.dim());
    let mut out = Array3::zeros(roi.dim());
    Zip::from(&mut out)
        .and(&roi)
        .and(&nuclei)
        .for_each(|o, &a, &b| *o = a * b);
    out
}

/// 对称补零回原始尺寸. 每轴前侧补 `total / 2`, 其余补在后侧.
///
/// # 注意
///
/// `pred` 任一轴大于 `original` 时 panic.
#[inline]
pub fn pad_to_original(pred: ArrayView3<i32>, original: Idx3d) -> Array3<i32> {
    pad_to_shape(pred, original)
}

/// 数据文件名中会话前缀, 即 `_data` 之前的部分 (例如 `MTBI001_v1`).
pub fn session_prefix(data_name: &str) -> &str {
    data_name.split("_data").next().unwrap_or(data_name)
}

/// 一个会话的两阶段预测.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePredictions {
    /// 剔除小连通域后的第一阶段预测.
    pub step1: Array3<i32>,

    /// 第二阶段预测.
    pub step2: Array3<i32>,

    /// 合并结果.
    pub comb: Array3<i32>,
}

impl StagePredictions {
    /// 由两阶段的类别图构造: 第一阶段先剔除小连通域, 再与第二阶段合并.
    pub fn new(roi: ArrayView3<i32>, nuclei: ArrayView3<i32>) -> Self {
        let step1 = remove_small_components(roi);
        let comb = combine_stages(step1.view(), nuclei.view());
        Self {
            step1,
            step2: nuclei.to_owned(),
            comb,
        }
    }

    /// 三个结果都补零回原始尺寸.
    pub fn pad_to(&self, original: Idx3d) -> Self {
        Self {
            step1: pad_to_original(self.step1.view(), original),
            step2: pad_to_original(self.step2.view(), original),
            comb: pad_to_original(self.comb.view(), original),
        }
    }

    /// 写出 `{prefix}_model_{fold}_pred_{step1,step2,comb}.nii.gz`, 返回三个路径.
    pub fn write<P: AsRef<Path>>(
        &self,
        out_dir: P,
        prefix: &str,
        fold: usize,
        reference: Option<&NiftiHeader>,
    ) -> Result<[PathBuf; 3], LoadError> {
        let out_dir = out_dir.as_ref();
        let paths = ["step1", "step2", "comb"]
            .map(|s| out_dir.join(format!("{prefix}_model_{fold}_pred_{s}.nii.gz")));
        write_label(&paths[0], &self.step1, reference)?;
        write_label(&paths[1], &self.step2, reference)?;
        write_label(&paths[2], &self.comb, reference)?;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NucleiLabel;
    use ndarray::s;

    #[test]
    fn test_combine() {
        let roi = Array3::from_shape_fn((2, 2, 2), |(h, _, _)| h as i32);
        let nuclei = Array3::from_shape_fn((2, 2, 2), |(_, w, l)| (w * 2 + l + 1) as i32);
        let c = combine_stages(roi.view(), nuclei.view());
        assert_eq!(c.slice(s![0, .., ..]).sum(), 0);
        assert_eq!(c[(1, 1, 1)], 4);
    }

    #[test]
    fn test_session_prefix() {
        assert_eq!(session_prefix("MTBI001_v1_data.nii.gz"), "MTBI001_v1");
        assert_eq!(session_prefix("plain.nii"), "plain.nii");
    }

    #[test]
    fn test_predictions_pipeline() {
        let mut roi = Array3::<i32>::zeros((8, 8, 8));
        roi.slice_mut(s![1..5, 1..5, 1..5]).fill(1);
        roi[(7, 7, 7)] = 1;
        let nuclei = Array3::from_elem((8, 8, 8), 3);

        let p = StagePredictions::new(roi.view(), nuclei.view());
        assert_eq!(p.step1.sum(), 64);
        assert_eq!(p.comb.sum(), 64 * 3);

        let padded = p.pad_to((11, 8, 10));
        assert_eq!(padded.comb.dim(), (11, 8, 10));
        // 前侧补 1, 后侧补 2.
        assert_eq!(padded.comb[(2, 1, 2)], 3);
        assert_eq!(padded.comb[(1, 1, 1)], 0);
        assert_eq!(padded.step2.slice(s![1..9, .., 1..9]).sum(), 8 * 8 * 8 * 3);

        let dir = tempfile::tempdir().unwrap();
        let paths = padded.write(dir.path(), "MTBI001_v1", 3, None).unwrap();
        assert!(paths[2].ends_with("MTBI001_v1_model_3_pred_comb.nii.gz"));
        let back = NucleiLabel::open(&paths[0]).unwrap();
        assert_eq!(back.data(), padded.step1.view());
    }
}
