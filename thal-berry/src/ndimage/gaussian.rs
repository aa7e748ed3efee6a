//! 可分离高斯滤波, reflect 边界.

use super::Boundary;
use ndarray::{Array1, Array2, Array3, ArrayView3, Axis, Zip};

/// 截断半径, 以标准差为单位.
const TRUNCATE: f64 = 4.0;

/// 对三维数据做各向同性高斯平滑.
///
/// 核半径为 `(4σ + 0.5)` 取整, 核权重归一化, 越界部分按 reflect 延拓.
/// `sigma == 0` 时返回原数据的拷贝. `sigma` 必须非负.
pub fn gaussian_filter(data: ArrayView3<f64>, sigma: f64) -> Array3<f64> {
    debug_assert!(sigma >= 0.0);
    let mut out = data.as_standard_layout().into_owned();
    if sigma == 0.0 {
        return out;
    }
    let kernel = kernel(sigma);
    for axis in 0..3 {
        let n = out.len_of(Axis(axis));
        if n == 0 {
            continue;
        }
        let w = folded_matrix(&kernel, n);
        let z = Zip::from(out.lanes_mut(Axis(axis)));
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                z.par_for_each(|mut lane| {
                    let v = w.dot(&lane);
                    lane.assign(&v);
                });
            } else {
                z.for_each(|mut lane| {
                    let v = w.dot(&lane);
                    lane.assign(&v);
                });
            }
        }
    }
    out
}

/// 归一化的一维高斯核, 长度为 `2r + 1`.
fn kernel(sigma: f64) -> Array1<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let two_var = 2.0 * sigma * sigma;
    let mut k = Array1::from_iter((-radius..=radius).map(|x| (-(x * x) as f64 / two_var).exp()));
    let s = k.sum();
    k /= s;
    k
}

/// 将 reflect 延拓折叠进权重矩阵: `out[i] = Σ_j w[i, j] * in[j]`.
fn folded_matrix(kernel: &Array1<f64>, n: usize) -> Array2<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut w = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for (t, &g) in kernel.iter().enumerate() {
            let j = Boundary::Reflect.index(i as isize + t as isize - radius, n);
            w[(i, j)] += g;
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_kernel_radius_and_sum() {
        let k = kernel(1.0);
        assert_eq!(k.len(), 9);
        assert_abs_diff_eq!(k.sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(k[0], k[8], epsilon = 1e-15);
        assert_eq!(kernel(50.0).len(), 401);
    }

    #[test]
    fn test_sigma_zero_copies() {
        let data = Array3::from_shape_fn((3, 4, 2), |(i, j, k)| (i * 8 + j * 2 + k) as f64);
        assert_eq!(gaussian_filter(data.view(), 0.0), data);
    }

    /// reflect 边界下滤波保持总和与常数.
    #[test]
    fn test_preserves_constant_and_mean() {
        let c = Array3::from_elem((4, 5, 6), 3.0);
        let out = gaussian_filter(c.view(), 2.0);
        for &v in out.iter() {
            assert_abs_diff_eq!(v, 3.0, epsilon = 1e-10);
        }

        let data = Array3::from_shape_fn((6, 5, 4), |(i, j, k)| ((i * 13 + j * 7 + k) % 5) as f64);
        let out = gaussian_filter(data.view(), 1.5);
        assert_abs_diff_eq!(out.sum(), data.sum(), epsilon = 1e-8);
    }

    /// 宽核在短轴上应多次折返, 结果仍收敛于均值附近.
    #[test]
    fn test_wide_kernel_short_axis() {
        let data = Array3::from_shape_fn((2, 1, 1), |(i, _, _)| i as f64);
        let out = gaussian_filter(data.view(), 50.0);
        assert_abs_diff_eq!(out[(0, 0, 0)], 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(out[(1, 0, 0)], 0.5, epsilon = 1e-2);
    }
}
