//! 中心裁剪与补零.
//!
//! 训练与测试统一使用 [`CROP_SIZE`](crate::consts::CROP_SIZE) 大小的输入. 裁剪窗口起点为
//! `dim / 2 - size / 2`, 补零时前侧补 `total / 2`, 后侧补其余部分 (`total` 为两者之差).
//! 二者在一般情况下并不互逆, 例如长度 6 裁剪到 3 时起点为 2, 而 3 补零到 6 时前侧只补 1.

use crate::Idx3d;
use ndarray::{s, Array3, Array4, ArrayView3, ArrayView4, Axis};
use num::Zero;
use std::ops::Range;

#[inline]
fn to_arr(p: Idx3d) -> [usize; 3] {
    [p.0, p.1, p.2]
}

/// 单轴上从长度 `from` 变为 `to` 时, 源区间与目标区间.
#[inline]
fn fit_range(from: usize, to: usize) -> (Range<usize>, Range<usize>) {
    if from >= to {
        let start = from / 2 - to / 2;
        (start..start + to, 0..to)
    } else {
        let before = (to - from) / 2;
        (0..from, before..before + from)
    }
}

/// 三个轴上的源区间与目标区间.
fn fit_ranges(from: Idx3d, to: Idx3d) -> ([Range<usize>; 3], [Range<usize>; 3]) {
    let (from, to) = (to_arr(from), to_arr(to));
    let r = [0, 1, 2].map(|i| fit_range(from[i], to[i]));
    let [(s0, d0), (s1, d1), (s2, d2)] = r;
    ([s0, s1, s2], [d0, d1, d2])
}

/// 三维数据中心裁剪到 `size`.
///
/// # 注意
///
/// 任一轴小于 `size` 时 panic.
pub fn center_crop3<T: Clone>(data: ArrayView3<T>, size: Idx3d) -> Array3<T> {
    let dim = data.dim();
    assert!(
        dim.0 >= size.0 && dim.1 >= size.1 && dim.2 >= size.2,
        "无法将 {dim:?} 裁剪到 {size:?}"
    );
    let ([a, b, c], _) = fit_ranges(dim, size);
    data.slice(s![a, b, c]).to_owned()
}

/// 四维 `[C, H, W, L]` 数据在空间维度上中心裁剪到 `size`.
///
/// # 注意
///
/// 任一空间轴小于 `size` 时 panic.
pub fn center_crop4<T: Clone>(data: ArrayView4<T>, size: Idx3d) -> Array4<T> {
    let (_, h, w, l) = data.dim();
    assert!(
        h >= size.0 && w >= size.1 && l >= size.2,
        "无法将 {:?} 裁剪到 {size:?}",
        (h, w, l)
    );
    let ([a, b, c], _) = fit_ranges((h, w, l), size);
    data.slice(s![.., a, b, c]).to_owned()
}

/// 将三维数据对称补零到 `shape`.
///
/// # 注意
///
/// 任一轴大于 `shape` 时 panic.
pub fn pad_to_shape<T: Clone + Zero>(data: ArrayView3<T>, shape: Idx3d) -> Array3<T> {
    let dim = data.dim();
    assert!(
        dim.0 <= shape.0 && dim.1 <= shape.1 && dim.2 <= shape.2,
        "无法将 {dim:?} 补零到 {shape:?}"
    );
    fit_to_shape3(data, shape)
}

/// 逐轴裁剪或补零, 使三维数据形状变为 `shape`.
pub fn fit_to_shape3<T: Clone + Zero>(data: ArrayView3<T>, shape: Idx3d) -> Array3<T> {
    let ([sa, sb, sc], [da, db, dc]) = fit_ranges(data.dim(), shape);
    let mut out = Array3::zeros(shape);
    out.slice_mut(s![da, db, dc])
        .assign(&data.slice(s![sa, sb, sc]));
    out
}

/// 逐轴裁剪或补零, 使四维 `[C, H, W, L]` 数据空间形状变为 `shape`. 通道数不变.
pub fn fit_to_shape4<T: Clone + Zero>(data: ArrayView4<T>, shape: Idx3d) -> Array4<T> {
    let (c, h, w, l) = data.dim();
    let ([sa, sb, sc], [da, db, dc]) = fit_ranges((h, w, l), shape);
    let mut out = Array4::zeros((c, shape.0, shape.1, shape.2));
    out.slice_mut(s![.., da, db, dc])
        .assign(&data.slice(s![.., sa, sb, sc]));
    debug_assert_eq!(out.len_of(Axis(0)), c);
    out
}
