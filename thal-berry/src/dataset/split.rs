//! 8-折交叉验证划分.
//!
//! 24 个会话按排序后的文件名编号. 第 `k` 折以连续的 3 个编号为测试集, 其后 2 个编号
//! (循环) 为验证集, 其余 19 个为训练集.

use crate::consts::{DATASET_LEN, FOLD_LEN};
use crate::LoadError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 数据集划分.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Division {
    /// 训练集.
    Train,

    /// 验证集.
    Val,

    /// 测试集.
    Test,
}

impl Division {
    /// 全部划分.
    pub const ALL: [Division; 3] = [Division::Train, Division::Val, Division::Test];

    /// 划分名.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Division::Train => "train",
            Division::Val => "val",
            Division::Test => "test",
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的划分名.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("未知划分 `{0}`, 应为 train, val 或 test")]
pub struct ParseDivisionError(String);

impl FromStr for Division {
    type Err = ParseDivisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Division::Train),
            "val" => Ok(Division::Val),
            "test" => Ok(Division::Test),
            _ => Err(ParseDivisionError(s.to_owned())),
        }
    }
}

/// 单折划分. 三个列表都按升序排列.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldSplit {
    /// 训练集编号.
    pub train: &'static [usize],

    /// 验证集编号.
    pub val: &'static [usize],

    /// 测试集编号.
    pub test: &'static [usize],
}

impl FoldSplit {
    /// 给定划分的编号.
    #[inline]
    pub fn indices(&self, division: Division) -> &'static [usize] {
        match division {
            Division::Train => self.train,
            Division::Val => self.val,
            Division::Test => self.test,
        }
    }
}

#[rustfmt::skip]
static FOLDS: [FoldSplit; FOLD_LEN] = [
    FoldSplit {
        train: &[5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23],
        val: &[3, 4],
        test: &[0, 1, 2],
    },
    FoldSplit {
        train: &[0, 1, 2, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23],
        val: &[6, 7],
        test: &[3, 4, 5],
    },
    FoldSplit {
        train: &[0, 1, 2, 3, 4, 5, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23],
        val: &[9, 10],
        test: &[6, 7, 8],
    },
    FoldSplit {
        train: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23],
        val: &[12, 13],
        test: &[9, 10, 11],
    },
    FoldSplit {
        train: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 17, 18, 19, 20, 21, 22, 23],
        val: &[15, 16],
        test: &[12, 13, 14],
    },
    FoldSplit {
        train: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 20, 21, 22, 23],
        val: &[18, 19],
        test: &[15, 16, 17],
    },
    FoldSplit {
        train: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 23],
        val: &[21, 22],
        test: &[18, 19, 20],
    },
    FoldSplit {
        train: &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
        val: &[0, 1],
        test: &[21, 22, 23],
    },
];

/// 获取第 `k` 折划分.
pub fn fold(k: usize) -> Result<&'static FoldSplit, LoadError> {
    FOLDS.get(k).ok_or(LoadError::UnknownFold(k))
}

/// 全部折.
#[inline]
pub fn folds() -> &'static [FoldSplit; FOLD_LEN] {
    &FOLDS
}

/// 数据集大小.
#[inline]
pub const fn dataset_len() -> usize {
    DATASET_LEN
}
