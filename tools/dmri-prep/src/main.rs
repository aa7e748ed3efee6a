//! dMRI 丘脑核团项目的命令行入口.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use thal_berry::dataset::Division;

mod result;
mod runner;

/// dMRI 预处理与数据检查工具.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 日志详细程度, 可重复 (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// 对每个会话运行 TORTOISE 预处理.
    Tortoise {
        /// 会话数据根目录, 默认 `$THAL_SRC_DIR` 或 `$HOME/dataset/sessions`.
        #[arg(short, long)]
        src: Option<PathBuf>,

        /// TORTOISE 安装目录, 默认 `$TORTOISE_HOME`.
        #[arg(short, long)]
        tortoise_home: Option<PathBuf>,

        /// 只打印命令.
        #[arg(long)]
        dry_run: bool,
    },

    /// 由 TORTOISE 输出的特征向量计算 Knutsson 映射与边缘图.
    Knutsson {
        /// 会话数据根目录, 默认 `$THAL_SRC_DIR` 或 `$HOME/dataset/sessions`.
        #[arg(short, long)]
        src: Option<PathBuf>,
    },

    /// 对一对体数据 / 标签做一次随机组合增强.
    Augment {
        /// 4D 体数据 nii 文件.
        #[arg(long)]
        volume: PathBuf,

        /// 3D 标签 nii 文件.
        #[arg(long)]
        label: PathBuf,

        /// 输出目录.
        #[arg(short, long, default_value = "./")]
        output: PathBuf,

        /// 随机种子.
        #[arg(long, default_value_t = 1234)]
        seed: u64,
    },

    /// 打印 8-折交叉验证划分.
    Folds,

    /// 检查某一折某一划分的数据能否正常加载.
    Dataset {
        /// 折编号.
        #[arg(short, long, default_value_t = 0)]
        fold: usize,

        /// 划分: train, val 或 test.
        #[arg(short, long, default_value = "test")]
        division: Division,

        /// 数据目录, 默认 `$THAL_DATA_DIR`.
        #[arg(long)]
        data: Option<PathBuf>,

        /// ROI 标签目录, 默认 `$THAL_LABEL_DIR`.
        #[arg(long)]
        label: Option<PathBuf>,

        /// 核团标签目录, 可选.
        #[arg(long)]
        nuclei: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    utils::init_logger(cli.verbose);
    log::debug!("可用核心数: {}", utils::cpus());

    let outcome = match cli.command {
        Cmd::Tortoise {
            src,
            tortoise_home,
            dry_run,
        } => runner::tortoise(src, tortoise_home, dry_run),
        Cmd::Knutsson { src } => runner::knutsson(src),
        Cmd::Augment {
            volume,
            label,
            output,
            seed,
        } => runner::augment(&volume, &label, &output, seed),
        Cmd::Folds => runner::folds(),
        Cmd::Dataset {
            fold,
            division,
            data,
            label,
            nuclei,
        } => runner::dataset(fold, division, data, label, nuclei),
    };

    match outcome {
        Ok(summary) => {
            summary.analyze();
            if summary.has_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
