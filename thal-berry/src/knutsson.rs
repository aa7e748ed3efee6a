//! Knutsson 5D 映射与边缘图.
//!
//! 张量主特征向量 `e = (x, y, z)` 具有符号二义性 (`e` 与 `-e` 等价), 不适合直接做差分.
//! Knutsson 映射把它变换为关于符号不变的 5 维向量:
//!
//! ```text
//! k1 = x² - y²
//! k2 = 2xy
//! k3 = 2xz
//! k4 = 2yz
//! k5 = (2z² - x² - y²) / √3
//! ```
//!
//! 边缘图为 5 个分量在三个空间轴上中心差分 (界外补零) 所得 Jacobian 的 Frobenius 范数.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ndarray::{s, Array3, Array4, ArrayView4, Axis, Zip};
use nifti::NiftiHeader;
use num::Float;

use crate::consts::KNUTSSON_CHANNELS;
use crate::{write_scalar, write_volume, DwiVolume, LoadError, NiftiHeaderAttr};

/// 由特征向量 `[C, H, W, L]` (`C >= 3`, 只使用前三个通道) 计算 Knutsson 映射 `[5, H, W, L]`.
///
/// # 注意
///
/// `C < 3` 时 panic.
pub fn knutsson_5d<T: Float>(ev: ArrayView4<T>) -> Array4<T> {
    let (c, h, w, l) = ev.dim();
    assert!(c >= 3, "特征向量至少需要 3 个分量, 实际为 {c}");

    let two = T::one() + T::one();
    let three = two + T::one();
    let sqrt3 = three.sqrt();

    let mut out = Array4::zeros((KNUTSSON_CHANNELS, h, w, l));
    Zip::from(out.lanes_mut(Axis(0)))
        .and(ev.index_axis(Axis(0), 0))
        .and(ev.index_axis(Axis(0), 1))
        .and(ev.index_axis(Axis(0), 2))
        .for_each(|mut k, &x, &y, &z| {
            k[0] = x * x - y * y;
            k[1] = two * x * y;
            k[2] = two * x * z;
            k[3] = two * y * z;
            k[4] = (two * z * z - x * x - y * y) / sqrt3;
        });
    out
}

/// 对 `[K, H, W, L]` 的每个分量沿三个空间轴做中心差分 `(next - prev) / 2`, 界外取 0.
///
/// 返回 `[3K, H, W, L]`, 第 `3i + a` 个通道为第 `i` 个分量沿空间轴 `a` 的差分.
pub fn jacobian<T: Float>(k: ArrayView4<T>) -> Array4<T> {
    let (c, h, w, l) = k.dim();
    let half = (T::one() + T::one()).recip();
    let mut out = Array4::zeros((3 * c, h, w, l));
    for (i, comp) in k.outer_iter().enumerate() {
        for axis in 0..3 {
            let mut dst = out.index_axis_mut(Axis(0), 3 * i + axis);
            let n = comp.len_of(Axis(axis));
            if n == 0 {
                continue;
            }
            // next 部分: dst[j] += comp[j + 1], j < n - 1.
            // prev 部分: dst[j] -= comp[j - 1], j >= 1.
            Zip::from(dst.slice_axis_mut(Axis(axis), (..n - 1).into()))
                .and(comp.slice_axis(Axis(axis), (1..).into()))
                .for_each(|d, &v| *d = *d + v);
            Zip::from(dst.slice_axis_mut(Axis(axis), (1..).into()))
                .and(comp.slice_axis(Axis(axis), (..n - 1).into()))
                .for_each(|d, &v| *d = *d - v);
            dst.mapv_inplace(|v| v * half);
        }
    }
    out
}

/// 边缘强度: 每个体素上 Jacobian 所有通道平方和的平方根.
pub fn edge_map<T: Float>(jac: ArrayView4<T>) -> Array3<T> {
    let (_, h, w, l) = jac.dim();
    let mut acc = Array3::<T>::zeros((h, w, l));
    for ch in jac.outer_iter() {
        Zip::from(&mut acc).and(&ch).for_each(|a, &v| *a = *a + v * v);
    }
    acc.mapv_inplace(|v| v.sqrt());
    acc
}

/// 在路径末尾直接追加后缀 (而非替换扩展名).
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// 一个会话的 Knutsson 映射与边缘图.
#[derive(Debug, Clone)]
pub struct KnutssonMaps {
    header: Box<NiftiHeader>,
    vectors: Array4<f32>,
    edge: Array3<f32>,
}

impl NiftiHeaderAttr for KnutssonMaps {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl KnutssonMaps {
    /// 5D 映射文件名后缀.
    pub const VECTORS_SUFFIX: &'static str = "_knutsson_5D.nii";

    /// 边缘图文件名后缀.
    pub const EDGE_SUFFIX: &'static str = "_knutsson_edgemap.nii";

    /// 由已加载的特征向量计算. 特征向量至少需要 3 个通道.
    pub fn compute(ev: &DwiVolume) -> Result<Self, LoadError> {
        if ev.channels() < 3 {
            return Err(LoadError::TooFewChannels {
                expected: 3,
                actual: ev.channels(),
            });
        }
        let vectors = knutsson_5d(ev.data().slice(s![..3, .., .., ..]));
        let edge = edge_map(jacobian(vectors.view()).view());
        Ok(Self {
            header: Box::new(ev.header().clone()),
            vectors,
            edge,
        })
    }

    /// 读取特征向量 nii 文件 (`*DT_EV.nii`) 并计算.
    pub fn from_eigenvector_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        Self::compute(&DwiVolume::open(path)?)
    }

    /// Knutsson 映射 `[5, H, W, L]`.
    #[inline]
    pub fn vectors(&self) -> &Array4<f32> {
        &self.vectors
    }

    /// 边缘图 `[H, W, L]`.
    #[inline]
    pub fn edge(&self) -> &Array3<f32> {
        &self.edge
    }

    /// 写出 `{prefix}_knutsson_5D.nii` 与 `{prefix}_knutsson_edgemap.nii`, 返回两个路径.
    pub fn write<P: AsRef<Path>>(&self, prefix: P) -> Result<(PathBuf, PathBuf), LoadError> {
        let prefix = prefix.as_ref();
        let vp = with_suffix(prefix, Self::VECTORS_SUFFIX);
        let ep = with_suffix(prefix, Self::EDGE_SUFFIX);
        write_volume(&vp, &self.vectors, Some(&self.header))?;
        write_scalar(&ep, &self.edge, Some(&self.header))?;
        Ok((vp, ep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array4};

    #[test]
    fn test_knutsson_unit_vectors() {
        // e = x 轴, y 轴, z 轴.
        let ev = Array4::from_shape_fn((3, 3, 1, 1), |(c, h, _, _)| {
            if c == h {
                1.0f64
            } else {
                0.0
            }
        });
        let k = knutsson_5d(ev.view());
        let at = |h: usize| k.slice(s![.., h, 0, 0]).to_owned();
        let r3 = 3f64.sqrt();
        assert_eq!(at(0), arr1(&[1.0, 0.0, 0.0, 0.0, -1.0 / r3]));
        assert_eq!(at(1), arr1(&[-1.0, 0.0, 0.0, 0.0, -1.0 / r3]));
        assert_eq!(at(2), arr1(&[0.0, 0.0, 0.0, 0.0, 2.0 / r3]));
    }

    /// 映射关于特征向量的符号不变, 且单位向量映射后范数平方为 4/3.
    #[test]
    fn test_knutsson_sign_invariant() {
        let ev = Array4::from_shape_fn((4, 2, 2, 2), |(c, h, w, l)| {
            let v = [0.48f64, -0.6, 0.64, 9.0][c];
            if (h + w + l) % 2 == 0 {
                v
            } else {
                -v
            }
        });
        let k = knutsson_5d(ev.view());
        for ch in k.outer_iter() {
            let first = ch[(0, 0, 0)];
            assert!(ch.iter().all(|&v| (v - first).abs() < 1e-12));
        }
        let norm: f64 = k.slice(s![.., 0, 0, 0]).iter().map(|v| v * v).sum();
        assert_abs_diff_eq!(norm, 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_central_difference() {
        let k = Array4::from_shape_fn((1, 4, 1, 1), |(_, h, _, _)| (h * h) as f64);
        let j = jacobian(k.view());
        assert_eq!(j.dim(), (3, 4, 1, 1));
        // [0, 1, 4, 9], 界外为 0.
        let d: Vec<f64> = j.slice(s![0, .., 0, 0]).to_vec();
        assert_eq!(d, vec![0.5, 2.0, 4.0, -2.0]);
        // 单元素轴: (0 - 0) / 2.
        assert!(j.slice(s![1..3, .., .., ..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_edge_map() {
        let jac =
            Array4::from_shape_fn((2, 1, 1, 2), |(c, _, _, l)| [[3.0f32, 0.0], [4.0, 1.0]][c][l]);
        let e = edge_map(jac.view());
        assert_abs_diff_eq!(e[(0, 0, 0)], 5.0);
        assert_abs_diff_eq!(e[(0, 0, 1)], 1.0);
    }

    #[test]
    fn test_write_maps() {
        let dir = tempfile::tempdir().unwrap();
        let ev_path = dir.path().join("sub_DT_EV.nii");
        let ev = Array4::from_shape_fn((3, 3, 4, 5), |(c, h, w, l)| {
            ((c + 1) * (h + 2 * w + 3 * l + 1)) as f32 * 0.01
        });
        write_volume(&ev_path, &ev, None).unwrap();

        let maps = KnutssonMaps::from_eigenvector_file(&ev_path).unwrap();
        assert_eq!(maps.vectors().dim(), (5, 3, 4, 5));
        assert_eq!(maps.edge().dim(), (3, 4, 5));

        let (vp, ep) = maps.write(dir.path().join("out_DT")).unwrap();
        assert!(vp.ends_with("out_DT_knutsson_5D.nii"));
        assert!(ep.ends_with("out_DT_knutsson_edgemap.nii"));
        let back = DwiVolume::open(&vp).unwrap();
        assert_eq!(back.channels(), 5);
        assert_eq!(back.data(), maps.vectors().view());
    }

    #[test]
    fn test_too_few_channels() {
        let ev = DwiVolume::from_parts(NiftiHeader::default(), Array4::zeros((2, 2, 2, 2)));
        assert!(matches!(
            KnutssonMaps::compute(&ev),
            Err(LoadError::TooFewChannels {
                expected: 3,
                actual: 2
            })
        ));
    }
}
