//! 插值器实现.

use super::{Boundary, Sampler};
use ndarray::{Array1, Array3, ArrayView3, ArrayViewMut1, Axis};

/// 三次 B 样条插值器, reflect 边界.
///
/// 构造时沿三个轴依次做 B 样条预滤波 (求插值系数), 因此插值结果在整数网格点上
/// 精确复现原始数据. 预滤波与求值均在 `f64` 下进行.
#[derive(Debug, Clone)]
pub struct CubicReflect {
    coeffs: Array3<f64>,
}

impl CubicReflect {
    /// 由单通道数据构造插值器.
    pub fn new(data: ArrayView3<f32>) -> Self {
        let mut coeffs = data.mapv(f64::from);
        for axis in 0..3 {
            for lane in coeffs.lanes_mut(Axis(axis)) {
                prefilter_lane(lane);
            }
        }
        Self { coeffs }
    }
}

/// 求解 `(c[i-1] + 4c[i] + c[i+1]) / 6 = s[i]`, 边界处 `c[-1] = c[0]`, `c[n] = c[n-1]`.
///
/// 三对角系统, 使用 Thomas 算法原地求解.
fn prefilter_lane(mut lane: ArrayViewMut1<f64>) {
    let n = lane.len();
    if n <= 1 {
        return;
    }
    let diag = |i: usize| if i == 0 || i == n - 1 { 5.0 } else { 4.0 };

    // 前向消元, `upper[i]` 为归一化后的上对角元素.
    let mut upper = Array1::<f64>::zeros(n);
    let mut rhs = Array1::<f64>::zeros(n);
    let mut pivot = diag(0);
    upper[0] = 1.0 / pivot;
    rhs[0] = 6.0 * lane[0] / pivot;
    for i in 1..n {
        pivot = diag(i) - upper[i - 1];
        upper[i] = 1.0 / pivot;
        rhs[i] = (6.0 * lane[i] - rhs[i - 1]) / pivot;
    }

    // 回代.
    lane[n - 1] = rhs[n - 1];
    for i in (0..n - 1).rev() {
        lane[i] = rhs[i] - upper[i] * lane[i + 1];
    }
}

/// 三次 B 样条基函数在 `floor - 1 ..= floor + 2` 四个节点上的权重.
#[inline]
fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    let u = 1.0 - t;
    [
        u * u * u / 6.0,
        (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
        t3 / 6.0,
    ]
}

/// 单轴上的四个系数索引及其权重.
#[inline]
fn support(x: f64, n: usize) -> ([usize; 4], [f64; 4]) {
    let f = x.floor();
    let base = f as isize - 1;
    let idx = [0, 1, 2, 3].map(|k| Boundary::Reflect.index(base + k, n));
    (idx, cubic_weights(x - f))
}

impl Sampler for CubicReflect {
    type Elem = f32;

    fn sample(&self, pos: [f64; 3]) -> f32 {
        let (h, w, l) = self.coeffs.dim();
        let (ih, wh) = support(pos[0], h);
        let (iw, ww) = support(pos[1], w);
        let (il, wl) = support(pos[2], l);

        let mut acc = 0.0;
        for a in 0..4 {
            let mut acc_w = 0.0;
            for b in 0..4 {
                let mut acc_l = 0.0;
                for c in 0..4 {
                    acc_l += wl[c] * self.coeffs[(ih[a], iw[b], il[c])];
                }
                acc_w += ww[b] * acc_l;
            }
            acc += wh[a] * acc_w;
        }
        acc as f32
    }
}

/// 最近邻插值器, nearest 边界.
///
/// 只会返回输入中真实存在的值, 适用于离散标签.
#[derive(Debug, Clone, Copy)]
pub struct NearestClamp<'a, T> {
    data: ArrayView3<'a, T>,
}

impl<'a, T> NearestClamp<'a, T> {
    /// 包装单通道数据.
    #[inline]
    pub fn new(data: ArrayView3<'a, T>) -> Self {
        Self { data }
    }
}

impl<T: Copy> Sampler for NearestClamp<'_, T> {
    type Elem = T;

    #[inline]
    fn sample(&self, pos: [f64; 3]) -> T {
        let (h, w, l) = self.data.dim();
        let round = |x: f64, n: usize| Boundary::Nearest.index((x + 0.5).floor() as isize, n);
        self.data[(round(pos[0], h), round(pos[1], w), round(pos[2], l))]
    }
}
