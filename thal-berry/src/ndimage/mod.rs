//! 三维重采样内核.
//!
//! 体数据与标签采用不同的插值策略:
//!
//! | 数据 | 插值 | 边界 |
//! |------|------|------|
//! | 体数据 (`f32`) | 三次 B 样条 (order 3) | reflect, 即 `d c b a \| a b c d \| d c b a` |
//! | 标签 (`i32`) | 最近邻 (order 0) | nearest, 即 `a a a a \| a b c d \| d d d d` |
//!
//! 两种策略分别由 [`CubicReflect`] 和 [`NearestClamp`] 实现, 并固定在
//! [`resample_volume`] 与 [`resample_label`] 中. 标签永远不可能经过三次插值路径,
//! 因此不会出现类别 "渗色" 或分数类别.
//!
//! 坐标映射 ([`CoordinateMap`]) 将输出体素索引映射为输入的连续坐标:
//! 仿射映射 ([`Affine`]) 用于旋转 / 缩放 / 平移, 稠密位移场 ([`Displacement`])
//! 用于弹性形变.

use crate::Idx3d;
use ndarray::{Array3, Array4, ArrayBase, ArrayView3, ArrayView4, Axis, Data, Ix3, Ix4};

mod gaussian;
mod spline;
mod warp;

pub use gaussian::gaussian_filter;
pub use spline::{CubicReflect, NearestClamp};
pub use warp::{zoomed_shape, Affine, Displacement};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 边界延拓模式. 决定越界索引如何映射回 `[0, n)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Boundary {
    /// 半采样对称延拓, 周期为 `2n`.
    Reflect,

    /// 复制边缘值.
    Nearest,
}

impl Boundary {
    /// 将任意整数索引 `i` 映射到长度为 `n` 的轴上. `n` 必须非零.
    #[inline]
    pub fn index(self, i: isize, n: usize) -> usize {
        debug_assert_ne!(n, 0);
        let n = n as isize;
        match self {
            Boundary::Nearest => i.clamp(0, n - 1) as usize,
            Boundary::Reflect => {
                let period = 2 * n;
                let m = i.rem_euclid(period);
                (if m < n { m } else { period - 1 - m }) as usize
            }
        }
    }
}

/// 单通道插值器. 给定连续坐标, 求该处的取值.
pub trait Sampler {
    /// 元素类型.
    type Elem;

    /// 求连续坐标 `pos` 处的插值.
    fn sample(&self, pos: [f64; 3]) -> Self::Elem;
}

/// 输出体素索引到输入连续坐标的映射.
pub trait CoordinateMap: Sync {
    /// 输出索引 `out` 对应的输入坐标.
    fn map(&self, out: Idx3d) -> [f64; 3];
}

/// 按照 `map` 在 `shape` 形状的输出网格上逐点采样.
pub fn resample<S, M>(sampler: &S, shape: Idx3d, map: &M) -> Array3<S::Elem>
where
    S: Sampler,
    M: CoordinateMap + ?Sized,
{
    Array3::from_shape_fn(shape, |out| sampler.sample(map.map(out)))
}

/// 按体数据策略 (三次 B 样条 + reflect) 对每个通道独立重采样.
///
/// 通道之间互不影响. 开启 `rayon` 特性时各通道并行处理, 结果与串行一致.
pub fn resample_volume<M>(volume: ArrayView4<f32>, shape: Idx3d, map: &M) -> Array4<f32>
where
    M: CoordinateMap + ?Sized,
{
    let per_channel = |c: ArrayView3<f32>| resample(&CubicReflect::new(c), shape, map);

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            let channels: Vec<Array3<f32>> = volume
                .axis_iter(Axis(0))
                .into_par_iter()
                .map(per_channel)
                .collect();
        } else {
            let channels: Vec<Array3<f32>> = volume.axis_iter(Axis(0)).map(per_channel).collect();
        }
    }
    stack_channels(channels, shape)
}

/// 按标签策略 (最近邻 + nearest) 重采样.
#[inline]
pub fn resample_label<M>(label: ArrayView3<i32>, shape: Idx3d, map: &M) -> Array3<i32>
where
    M: CoordinateMap + ?Sized,
{
    resample(&NearestClamp::new(label), shape, map)
}

/// 可被重采样的数据. 插值策略由元素类型与维数唯一确定:
/// `f32` 四维体数据走三次 B 样条, `i32` 三维标签走最近邻.
pub trait Resample {
    /// 重采样结果.
    type Output;

    /// 空间形状 `(H, W, L)`.
    fn spatial_dim(&self) -> Idx3d;

    /// 在 `shape` 网格上按 `map` 重采样.
    fn resample_with<M>(&self, shape: Idx3d, map: &M) -> Self::Output
    where
        M: CoordinateMap + ?Sized;
}

impl<S: Data<Elem = f32>> Resample for ArrayBase<S, Ix4> {
    type Output = Array4<f32>;

    #[inline]
    fn spatial_dim(&self) -> Idx3d {
        let (_, h, w, l) = self.dim();
        (h, w, l)
    }

    #[inline]
    fn resample_with<M>(&self, shape: Idx3d, map: &M) -> Array4<f32>
    where
        M: CoordinateMap + ?Sized,
    {
        resample_volume(self.view(), shape, map)
    }
}

impl<S: Data<Elem = i32>> Resample for ArrayBase<S, Ix3> {
    type Output = Array3<i32>;

    #[inline]
    fn spatial_dim(&self) -> Idx3d {
        self.dim()
    }

    #[inline]
    fn resample_with<M>(&self, shape: Idx3d, map: &M) -> Array3<i32>
    where
        M: CoordinateMap + ?Sized,
    {
        resample_label(self.view(), shape, map)
    }
}

/// 在 `axes` 平面内绕中心旋转 `degrees` 度, 形状不变.
pub fn rotate<R: Resample>(data: &R, axes: (usize, usize), degrees: f64) -> R::Output {
    let shape = data.spatial_dim();
    data.resample_with(shape, &Affine::rotation(shape, axes, degrees))
}

/// 按 `factor` 缩放, 输出形状见 [`zoomed_shape`].
pub fn zoom<R: Resample>(data: &R, factor: f64) -> R::Output {
    let input = data.spatial_dim();
    let output = zoomed_shape(input, factor);
    data.resample_with(output, &Affine::zoom(input, output))
}

/// 平移 `offset` 个体素, 形状不变.
pub fn shift<R: Resample>(data: &R, offset: [f64; 3]) -> R::Output {
    data.resample_with(data.spatial_dim(), &Affine::shift(offset))
}

/// 在 `base + displacement` 处重采样.
///
/// # 注意
///
/// 位移场形状必须与数据空间形状一致, 否则 panic.
pub fn map_coordinates<R: Resample>(data: &R, displacement: &Displacement) -> R::Output {
    let shape = data.spatial_dim();
    assert_eq!(shape, displacement.dim(), "位移场与数据形状不一致");
    data.resample_with(shape, displacement)
}

/// 将若干形状为 `shape` 的单通道数据按序拼接为 `[C, H, W, L]`.
pub(crate) fn stack_channels<T>(channels: Vec<Array3<T>>, shape: Idx3d) -> Array4<T> {
    let (h, w, l) = shape;
    let c = channels.len();
    let mut raw = Vec::with_capacity(c * h * w * l);
    for ch in channels {
        debug_assert_eq!(ch.dim(), shape);
        debug_assert!(ch.is_standard_layout());
        raw.extend(ch.into_raw_vec());
    }
    // 长度由构造保证, 该操作不会生成 `Err`, 可直接 unwrap.
    Array4::from_shape_vec((c, h, w, l), raw).unwrap()
}
