use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, Array4, ArrayBase, ArrayD, ArrayView3, ArrayView4, Axis, Data, Ix3, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx3d, LoadError};

pub mod crop;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// nii 文件 header 的共用属性.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取空间形状 `(H, W, L)`, 即 nifti 的前三维.
    #[inline]
    fn shape(&self) -> Idx3d {
        let [_, h, w, l, ..] = self.header().dim;
        (h as usize, w as usize, l as usize)
    }
}

/// 读取 nii 文件, 返回 header 和 nifti 原始维度顺序的 `f32` 数据.
fn read_raw(path: &Path) -> Result<(BoxedHeader, ArrayD<f32>), LoadError> {
    let obj = ReaderOptions::new().read_file(path)?;
    let header = Box::new(obj.header().clone());
    let data = obj.into_volume().into_ndarray::<f32>()?;
    Ok((header, data))
}

/// nii 格式多通道 dMRI 体数据 (DTI 标量图, 特征向量, Knutsson 映射等合并后的结果).
///
/// 磁盘上按 nifti 惯例以 `[H, W, L, C]` 存储, 内存中统一为 `[C, H, W, L]`.
#[derive(Debug, Clone)]
pub struct DwiVolume {
    header: BoxedHeader,
    data: Array4<f32>,
}

impl NiftiHeaderAttr for DwiVolume {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl DwiVolume {
    /// 打开 nii 文件. 三维文件视为单通道.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let (header, data) = read_raw(path.as_ref())?;
        let data = match data.ndim() {
            3 => data.insert_axis(Axis(3)),
            4 => data,
            actual => return Err(LoadError::Rank { expected: 4, actual }),
        };

        // [H, W, L, C] -> [C, H, W, L].
        let data = data.into_dimensionality::<Ix4>()?.permuted_axes([3, 0, 1, 2]);
        let data = data.as_standard_layout().into_owned();
        Ok(Self { header, data })
    }

    /// 由 header 和 `[C, H, W, L]` 数据直接创建.
    #[inline]
    pub fn from_parts(header: NiftiHeader, data: Array4<f32>) -> Self {
        Self {
            header: Box::new(header),
            data,
        }
    }

    /// 通道数.
    #[inline]
    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 取出数据.
    #[inline]
    pub fn into_data(self) -> Array4<f32> {
        self.data
    }

    /// 以自身 header 为参照写出到 `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), LoadError> {
        write_volume(path, &self.data, Some(&self.header))
    }
}

/// nii 格式 3D 整数标签 (ROI 或核团). 标签值以 `i32` 保存.
#[derive(Debug, Clone)]
pub struct NucleiLabel {
    header: BoxedHeader,
    data: Array3<i32>,
}

impl NiftiHeaderAttr for NucleiLabel {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for NucleiLabel {
    type Output = i32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl NucleiLabel {
    /// 打开 nii 文件. 浮点存储的标签按四舍五入转为整数.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let (header, data) = read_raw(path.as_ref())?;
        let data = match data.ndim() {
            3 => data,
            4 if data.len_of(Axis(3)) == 1 => data.remove_axis(Axis(3)),
            actual => return Err(LoadError::Rank { expected: 3, actual }),
        };
        let data = data.into_dimensionality::<Ix3>()?;
        // 顺便转为标准布局.
        let data = Array3::from_shape_fn(data.dim(), |p| data[p].round() as i32);
        Ok(Self { header, data })
    }

    /// 由 header 和 `[H, W, L]` 数据直接创建.
    #[inline]
    pub fn from_parts(header: NiftiHeader, data: Array3<i32>) -> Self {
        Self {
            header: Box::new(header),
            data,
        }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, i32> {
        self.data.view()
    }

    /// 取出数据.
    #[inline]
    pub fn into_data(self) -> Array3<i32> {
        self.data
    }

    /// 标签中出现的所有取值, 升序.
    pub fn values(&self) -> Vec<i32> {
        let mut v: Vec<i32> = self.data.iter().copied().collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// 以自身 header 为参照写出到 `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), LoadError> {
        write_label(path, &self.data, Some(&self.header))
    }
}

/// 构造写出选项. 给出 `reference` 时沿用其仿射等空间信息.
fn writer<'h>(path: &Path, reference: Option<&'h NiftiHeader>) -> WriterOptions<'h> {
    let opt = WriterOptions::new(path);
    match reference {
        Some(h) => opt.reference_header(h),
        None => opt,
    }
}

/// 写出 `[C, H, W, L]` 体数据, 磁盘上为 `[H, W, L, C]`.
pub fn write_volume<P, S>(
    path: P,
    volume: &ArrayBase<S, Ix4>,
    reference: Option<&NiftiHeader>,
) -> Result<(), LoadError>
where
    P: AsRef<Path>,
    S: Data<Elem = f32>,
{
    let data = volume.view().permuted_axes([1, 2, 3, 0]);
    let data = data.as_standard_layout().into_owned();
    writer(path.as_ref(), reference).write_nifti(&data)?;
    Ok(())
}

/// 写出单通道 `f32` 标量图.
pub fn write_scalar<P, S>(
    path: P,
    map: &ArrayBase<S, Ix3>,
    reference: Option<&NiftiHeader>,
) -> Result<(), LoadError>
where
    P: AsRef<Path>,
    S: Data<Elem = f32>,
{
    writer(path.as_ref(), reference).write_nifti(map)?;
    Ok(())
}

/// 写出 `[H, W, L]` 整数标签.
pub fn write_label<P, S>(
    path: P,
    label: &ArrayBase<S, Ix3>,
    reference: Option<&NiftiHeader>,
) -> Result<(), LoadError>
where
    P: AsRef<Path>,
    S: Data<Elem = i32>,
{
    writer(path.as_ref(), reference).write_nifti(label)?;
    Ok(())
}
