//! 坐标映射.

use super::CoordinateMap;
use crate::Idx3d;
use ndarray::Array3;

/// 仿射映射 `in = matrix · out + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    /// 线性部分.
    pub matrix: [[f64; 3]; 3],

    /// 平移部分.
    pub offset: [f64; 3],
}

const EYE: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

impl Affine {
    /// 恒等映射.
    #[inline]
    pub const fn identity() -> Self {
        Self {
            matrix: EYE,
            offset: [0.0; 3],
        }
    }

    /// 在 `axes` 张成的平面内绕数组中心旋转 `degrees` 度, 输出形状与输入一致.
    ///
    /// `axes` 先按升序排列为 `(a, b)`, 平面内旋转矩阵为 `[[cos, sin], [-sin, cos]]`,
    /// 中心为 `(shape - 1) / 2`. 第三个轴保持不变.
    ///
    /// # 注意
    ///
    /// `axes` 中的两个轴必须不同, 且都小于 3.
    pub fn rotation(shape: Idx3d, axes: (usize, usize), degrees: f64) -> Self {
        let (a, b) = if axes.0 < axes.1 {
            axes
        } else {
            (axes.1, axes.0)
        };
        assert!(a != b && b < 3, "非法旋转平面 {axes:?}");

        let (s, c) = degrees.to_radians().sin_cos();
        let mut matrix = EYE;
        matrix[a][a] = c;
        matrix[a][b] = s;
        matrix[b][a] = -s;
        matrix[b][b] = c;

        let center = [shape.0, shape.1, shape.2].map(|n| (n as f64 - 1.0) / 2.0);
        let mut offset = [0.0; 3];
        for (i, o) in offset.iter_mut().enumerate() {
            let rc: f64 = (0..3).map(|j| matrix[i][j] * center[j]).sum();
            *o = center[i] - rc;
        }
        Self { matrix, offset }
    }

    /// 将 `input` 形状的数据缩放到 `output` 形状, 两端角点对齐.
    ///
    /// 每个轴的比例为 `(in - 1) / (out - 1)`, 输出长度为 1 时比例取 1.
    pub fn zoom(input: Idx3d, output: Idx3d) -> Self {
        let input = [input.0, input.1, input.2];
        let output = [output.0, output.1, output.2];
        let mut matrix = [[0.0; 3]; 3];
        for i in 0..3 {
            matrix[i][i] = if output[i] > 1 {
                (input[i] as f64 - 1.0) / (output[i] as f64 - 1.0)
            } else {
                1.0
            };
        }
        Self {
            matrix,
            offset: [0.0; 3],
        }
    }

    /// 平移 `shift` 个体素, 即 `in = out - shift`.
    pub fn shift(shift: [f64; 3]) -> Self {
        Self {
            matrix: EYE,
            offset: shift.map(|s| -s),
        }
    }
}

impl CoordinateMap for Affine {
    #[inline]
    fn map(&self, out: Idx3d) -> [f64; 3] {
        let o = [out.0 as f64, out.1 as f64, out.2 as f64];
        let m = &self.matrix;
        [0, 1, 2].map(|i| m[i][0] * o[0] + m[i][1] * o[1] + m[i][2] * o[2] + self.offset[i])
    }
}

/// 稠密位移场 `in = out + d[out]`, 三个分量分别对应三个空间轴.
#[derive(Debug, Clone)]
pub struct Displacement {
    fields: [Array3<f64>; 3],
}

impl Displacement {
    /// 由三个同形状位移分量构造.
    ///
    /// # 注意
    ///
    /// 三个分量形状不一致时 panic.
    pub fn new(fields: [Array3<f64>; 3]) -> Self {
        let shape = fields[0].dim();
        assert!(
            fields.iter().all(|f| f.dim() == shape),
            "位移场分量形状不一致"
        );
        Self { fields }
    }

    /// 位移场的空间形状.
    #[inline]
    pub fn dim(&self) -> Idx3d {
        self.fields[0].dim()
    }
}

impl CoordinateMap for Displacement {
    #[inline]
    fn map(&self, out: Idx3d) -> [f64; 3] {
        [
            out.0 as f64 + self.fields[0][out],
            out.1 as f64 + self.fields[1][out],
            out.2 as f64 + self.fields[2][out],
        ]
    }
}

/// 按 `factor` 缩放后的形状. 每个轴取 `round(dim * factor)` (四舍六入五成双), 至少为 1.
pub fn zoomed_shape(shape: Idx3d, factor: f64) -> Idx3d {
    let f = |n: usize| ((n as f64 * factor).round_ties_even() as usize).max(1);
    (f(shape.0), f(shape.1), f(shape.2))
}
