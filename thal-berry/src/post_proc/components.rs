//! 3D 连通域与小连通域剔除.

use crate::consts::label::{is_background, is_foreground, THALAMUS};
use crate::consts::MIN_COMPONENT_VOXELS;
use crate::Idx3d;
use ndarray::{s, Array3, ArrayView3, ArrayViewMut3, Zip};
use std::collections::VecDeque;
use std::ops::RangeInclusive;

/// 一个 6-连通域.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// 体素个数.
    pub voxels: usize,

    /// 外接长方体, 各轴闭区间.
    pub bbox: [RangeInclusive<usize>; 3],
}

impl Component {
    fn new(seed: Idx3d) -> Self {
        Self {
            voxels: 0,
            bbox: [seed.0..=seed.0, seed.1..=seed.1, seed.2..=seed.2],
        }
    }

    fn include(&mut self, p: Idx3d) {
        self.voxels += 1;
        for (r, v) in self.bbox.iter_mut().zip([p.0, p.1, p.2]) {
            *r = (*r.start()).min(v)..=(*r.end()).max(v);
        }
    }

    /// 外接长方体内的视图.
    pub fn view_in<'a, T>(&self, data: ArrayView3<'a, T>) -> ArrayView3<'a, T> {
        let [a, b, c] = self.bbox.clone();
        data.slice_move(s![a, b, c])
    }

    fn view_mut_in<'a, T>(&self, data: ArrayViewMut3<'a, T>) -> ArrayViewMut3<'a, T> {
        let [a, b, c] = self.bbox.clone();
        data.slice_move(s![a, b, c])
    }
}

/// 6-相邻的合法位置.
#[inline]
fn n6_positions(p: Idx3d, dim: Idx3d) -> impl Iterator<Item = Idx3d> {
    let (h, w, l) = dim;
    let (x, y, z) = p;
    [
        (x > 0).then(|| (x - 1, y, z)),
        (x + 1 < h).then(|| (x + 1, y, z)),
        (y > 0).then(|| (x, y - 1, z)),
        (y + 1 < w).then(|| (x, y + 1, z)),
        (z > 0).then(|| (x, y, z - 1)),
        (z + 1 < l).then(|| (x, y, z + 1)),
    ]
    .into_iter()
    .flatten()
}

/// 按 6-相邻规则标记所有非零体素的连通域.
///
/// 返回 (连通域编号图, 连通域列表). 编号图中背景为 0, 第 `i` 个连通域编号为 `i + 1`.
/// 连通域按其首个体素的行优先顺序排列.
pub fn connected_components(label: ArrayView3<i32>) -> (Array3<u32>, Vec<Component>) {
    let dim = label.dim();
    let mut ids = Array3::<u32>::zeros(dim);
    let mut comps = Vec::new();
    let mut q = VecDeque::new();

    for (seed, &v) in label.indexed_iter() {
        if is_background(v) || ids[seed] != 0 {
            continue;
        }
        let id = comps.len() as u32 + 1;
        let mut comp = Component::new(seed);
        ids[seed] = id;
        q.push_back(seed);
        while let Some(cur) = q.pop_front() {
            comp.include(cur);
            for p in n6_positions(cur, dim) {
                if ids[p] == 0 && is_foreground(label[p]) {
                    ids[p] = id;
                    q.push_back(p);
                }
            }
        }
        comps.push(comp);
    }
    (ids, comps)
}

/// 小连通域剔除掩膜.
///
/// 对每个 6-连通域, 统计其外接长方体内取值为 1 的体素个数.
/// 该数目小于 `threshold` 时, 整个外接长方体在掩膜中置为 `false`.
/// 其余非零体素为 `true`, 零体素为 `false`.
///
/// 由于清除的是外接长方体, 与小连通域外接长方体相交的大连通域体素也会被一并清除.
pub fn foreground_mask(label: ArrayView3<i32>, threshold: usize) -> Array3<bool> {
    let (_, comps) = connected_components(label.view());
    let mut mask = label.mapv(is_foreground);
    for c in comps.iter() {
        let area = c.view_in(label.view()).iter().filter(|&&v| v == THALAMUS).count();
        if area < threshold {
            c.view_mut_in(mask.view_mut()).fill(false);
        }
    }
    mask
}

/// 以默认阈值 ([`MIN_COMPONENT_VOXELS`]) 剔除小连通域, 返回新标签.
pub fn remove_small_components(label: ArrayView3<i32>) -> Array3<i32> {
    let mask = foreground_mask(label.view(), MIN_COMPONENT_VOXELS);
    apply_foreground_mask(label, mask.view())
}

/// `label * mask`.
pub fn apply_foreground_mask(label: ArrayView3<i32>, mask: ArrayView3<bool>) -> Array3<i32> {
    assert_eq!(label.dim(), mask.dim());
    let mut out = label.to_owned();
    Zip::from(&mut out).and(&mask).for_each(|v, &m| {
        if !m {
            *v = 0;
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        let mut label = Array3::<i32>::zeros((4, 4, 4));
        label[(0, 0, 0)] = 1;
        label[(0, 0, 1)] = 1;
        label[(3, 3, 3)] = 2;
        // 对角不连通.
        label[(1, 1, 1)] = 1;

        let (ids, comps) = connected_components(label.view());
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[0].voxels, 2);
        assert_eq!(comps[0].bbox, [0..=0, 0..=0, 0..=1]);
        assert_eq!(ids[(0, 0, 1)], 1);
        assert_eq!(ids[(1, 1, 1)], 2);
        assert_eq!(ids[(3, 3, 3)], 3);
        assert_eq!(ids.iter().filter(|&&v| v == 0).count(), 60);
    }

    #[test]
    fn test_foreground_mask_threshold() {
        let mut label = Array3::<i32>::zeros((10, 10, 10));
        // 大连通域: 4x4x4 = 64 个体素.
        label.slice_mut(s![0..4, 0..4, 0..4]).fill(1);
        // 小连通域: 3 个体素.
        label.slice_mut(s![8, 8, 7..10]).fill(1);

        let mask = foreground_mask(label.view(), 50);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 64);
        assert!(!mask[(8, 8, 8)]);

        let cleaned = remove_small_components(label.view());
        assert_eq!(cleaned.sum(), 64);

        // 阈值为 0 时保留全部非零体素.
        assert_eq!(foreground_mask(label.view(), 0).iter().filter(|&&m| m).count(), 67);
    }

    /// 只统计外接长方体内取值为 1 的体素.
    #[test]
    fn test_area_counts_ones_only() {
        let mut label = Array3::<i32>::zeros((4, 4, 4));
        label.slice_mut(s![0..2, 0..2, 0..2]).fill(2);
        label[(0, 0, 0)] = 1;
        let mask = foreground_mask(label.view(), 2);
        assert!(mask.iter().all(|&m| !m));
        let mask = foreground_mask(label.view(), 1);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 8);
    }

    /// 小连通域外接长方体覆盖的大连通域体素也会被清除.
    #[test]
    fn test_bbox_clears_overlap() {
        let mut label = Array3::<i32>::zeros((6, 6, 6));
        // 大连通域: z = 0 平面加一根立柱, 39 个体素.
        label.slice_mut(s![.., .., 0]).fill(1);
        label.slice_mut(s![1, 3, 1..4]).fill(1);
        // 小连通域: z = 3 平面上的 L 形, 外接长方体包含立柱顶端 (1, 3, 3).
        for p in [(1, 1, 3), (2, 1, 3), (3, 1, 3), (3, 2, 3), (3, 3, 3)] {
            label[p] = 1;
        }
        let (_, comps) = connected_components(label.view());
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].voxels, 39);
        assert_eq!(comps[1].voxels, 5);

        let mask = foreground_mask(label.view(), 30);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 38);
        assert!(!mask[(1, 3, 3)]);
        assert!(mask[(1, 3, 2)]);
    }
}
