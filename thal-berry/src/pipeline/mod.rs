//! dMRI 预处理流水线编排.
//!
//! 数据目录结构为 `{src}/{subject}/{session}`, 其中受试者目录以 `MTBI` 开头,
//! 会话目录为 `v1`, `v2` 或 `v3`. 实际计算由外部 TORTOISE / FSL 程序完成,
//! 这里只负责遍历会话, 拼接命令并按顺序执行.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{info, warn};
use thiserror::Error;

use crate::consts::{SESSION_NAMES, SUBJECT_PREFIX};
use crate::LoadError;

mod knutsson;
mod tortoise;

pub use knutsson::{find_eigenvector, run_knutsson, KNUTSSON_PREFIX, TENSOR_SUBDIR};
pub use tortoise::{tortoise_steps, TortoiseConfig};

/// 流水线错误.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 文件系统错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 无法启动 shell.
    #[error("无法执行 `{command}`: {source}")]
    Spawn {
        /// 命令.
        command: String,
        /// 底层错误.
        source: std::io::Error,
    },

    /// 命令以非零状态退出.
    #[error("`{command}` 执行失败, 退出码 {code:?}")]
    Failed {
        /// 命令.
        command: String,
        /// 退出码. 被信号终止时为 `None`.
        code: Option<i32>,
    },

    /// 找不到特征向量文件.
    #[error("{0} 下没有 *DT_EV.nii 文件")]
    NoEigenvector(PathBuf),

    /// 读写 nii 文件错误.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// 一个受试者的一次扫描会话.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    /// 受试者编号, 例如 `MTBI001`.
    pub subject: String,

    /// 会话名, 例如 `v1`.
    pub session: String,

    /// 会话目录.
    pub path: PathBuf,
}

impl SessionDir {
    /// `proc/diffusion` 输出目录.
    #[inline]
    pub fn diffusion_dir(&self) -> PathBuf {
        self.path.join("proc").join("diffusion")
    }

    /// 形如 `MTBI001_v1` 的会话前缀.
    #[inline]
    pub fn prefix(&self) -> String {
        format!("{}_{}", self.subject, self.session)
    }
}

/// 按文件名排序的目录条目.
fn sorted_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>, PipelineError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        out.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    out.sort();
    Ok(out)
}

/// 受试者目录名是否合法?
#[inline]
pub fn is_subject_name(name: &str) -> bool {
    name.starts_with(SUBJECT_PREFIX)
}

/// 会话目录名是否合法?
#[inline]
pub fn is_session_name(name: &str) -> bool {
    SESSION_NAMES.contains(&name)
}

/// 遍历 `src_dir` 下所有合法会话, 按 (受试者, 会话) 排序. 非目录或名称不合法的条目被跳过.
pub fn discover_sessions<P: AsRef<Path>>(src_dir: P) -> Result<Vec<SessionDir>, PipelineError> {
    let mut ans = Vec::new();
    for (subject, subj_path) in sorted_entries(src_dir.as_ref())? {
        if !subj_path.is_dir() {
            info!("跳过 {}: 不是目录", subj_path.display());
            continue;
        }
        if !is_subject_name(&subject) {
            info!("跳过 {subject}: 不以 `{SUBJECT_PREFIX}` 开头");
            continue;
        }
        for (session, sess_path) in sorted_entries(&subj_path)? {
            if !sess_path.is_dir() {
                info!("跳过 {}: 不是目录", sess_path.display());
                continue;
            }
            if !is_session_name(&session) {
                info!("跳过 {subject}/{session}: 会话名应为 v1, v2 或 v3");
                continue;
            }
            ans.push(SessionDir {
                subject: subject.clone(),
                session,
                path: sess_path,
            });
        }
    }
    Ok(ans)
}

/// 流水线中的一条外部命令.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 步骤说明.
    pub description: &'static str,

    /// 交给 shell 执行的命令行.
    pub command: String,

    /// 失败时是否中止会话.
    pub required: bool,
}

impl Step {
    #[inline]
    pub(crate) fn new(description: &'static str, command: String) -> Self {
        Self {
            description,
            command,
            required: true,
        }
    }

    /// 失败只记警告, 会话继续执行.
    #[inline]
    pub(crate) fn optional(description: &'static str, command: String) -> Self {
        Self {
            required: false,
            ..Self::new(description, command)
        }
    }
}

/// 外部命令执行器.
pub trait CommandRunner {
    /// 执行一条命令, 非零退出视为失败.
    fn run(&mut self, command: &str) -> Result<(), PipelineError>;
}

/// 通过 `sh -c` 执行命令. 可在 `PATH` 前追加若干目录.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    path_prefix: Vec<PathBuf>,
    dry_run: bool,
}

impl ShellRunner {
    /// 创建执行器.
    pub fn new() -> Self {
        Self::default()
    }

    /// 在 `PATH` 前追加目录. 先给出的目录优先级最高.
    pub fn with_path_prefix<I: IntoIterator<Item = PathBuf>>(mut self, dirs: I) -> Self {
        self.path_prefix.extend(dirs);
        self
    }

    /// 只打印命令, 不实际执行.
    #[inline]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 拼接后的 `PATH`.
    fn path_env(&self) -> Option<std::ffi::OsString> {
        if self.path_prefix.is_empty() {
            return None;
        }
        let old = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .path_prefix
            .iter()
            .cloned()
            .chain(std::env::split_paths(&old));
        std::env::join_paths(dirs).ok()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<(), PipelineError> {
        info!("运行: {command}");
        if self.dry_run {
            return Ok(());
        }
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).stdout(Stdio::null());
        if let Some(path) = self.path_env() {
            cmd.env("PATH", path);
        }
        let status = cmd.status().map_err(|source| PipelineError::Spawn {
            command: command.to_owned(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::Failed {
                command: command.to_owned(),
                code: status.code(),
            })
        }
    }
}

/// 单个会话的执行结果.
#[derive(Debug)]
pub struct SessionReport {
    /// 会话.
    pub session: SessionDir,

    /// 成功完成的步骤数.
    pub completed: usize,

    /// 总步骤数.
    pub total: usize,

    /// 使会话中止的错误.
    pub error: Option<PipelineError>,
}

impl SessionReport {
    /// 是否全部成功?
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// 对一个会话按顺序执行步骤, 遇到第一个必需步骤失败即停止.
///
/// 可选步骤失败时记警告并计为完成.
pub fn run_steps<R: CommandRunner + ?Sized>(
    session: &SessionDir,
    steps: &[Step],
    runner: &mut R,
) -> SessionReport {
    let total = steps.len();
    let mut completed = 0;
    let mut error = None;
    for step in steps.iter() {
        info!("[{}/{total}] {}", completed + 1, step.description);
        if let Err(e) = runner.run(&step.command) {
            if !step.required {
                warn!("{}/{} 忽略失败的可选步骤: {e}", session.subject, session.session);
                completed += 1;
                continue;
            }
            warn!("{}/{} 中止: {e}", session.subject, session.session);
            error = Some(e);
            break;
        }
        completed += 1;
    }
    SessionReport {
        session: session.clone(),
        completed,
        total,
        error,
    }
}

/// 对每个会话运行 TORTOISE 预处理. 单个会话失败不影响其余会话.
pub fn run_tortoise<R: CommandRunner + ?Sized>(
    sessions: &[SessionDir],
    runner: &mut R,
) -> Vec<SessionReport> {
    sessions
        .iter()
        .map(|s| {
            info!("处理 {}/{}", s.subject, s.session);
            let steps = tortoise_steps(s);
            match tortoise::prepare_dirs(s) {
                Ok(()) => run_steps(s, &steps, runner),
                Err(e) => {
                    warn!("{}/{} 无法创建输出目录: {e}", s.subject, s.session);
                    SessionReport {
                        session: s.clone(),
                        completed: 0,
                        total: steps.len(),
                        error: Some(e),
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 只记录命令的执行器. `fail_on` 中的子串出现时返回失败.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub commands: Vec<String>,
        pub fail_on: Option<&'static str>,
    }

    impl CommandRunner for Recorder {
        fn run(&mut self, command: &str) -> Result<(), PipelineError> {
            self.commands.push(command.to_owned());
            match self.fail_on {
                Some(s) if command.contains(s) => Err(PipelineError::Failed {
                    command: command.to_owned(),
                    code: Some(1),
                }),
                _ => Ok(()),
            }
        }
    }

    /// 构造 `{root}/{subject}/{session}` 目录树, 返回根目录.
    pub(crate) fn session_tree() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for d in ["MTBI002/v1", "MTBI001/v2", "MTBI001/v1", "MTBI001/v4", "CTRL01/v1"] {
            fs::create_dir_all(root.path().join(d)).unwrap();
        }
        fs::write(root.path().join("MTBI001/notes.txt"), "x").unwrap();
        fs::write(root.path().join("MTBI003"), "not a dir").unwrap();
        root
    }

    #[test]
    fn test_discover_sessions() {
        let root = session_tree();
        let s = discover_sessions(root.path()).unwrap();
        let names: Vec<String> = s.iter().map(SessionDir::prefix).collect();
        assert_eq!(names, vec!["MTBI001_v1", "MTBI001_v2", "MTBI002_v1"]);
        assert_eq!(s[0].path, root.path().join("MTBI001").join("v1"));
    }

    #[test]
    fn test_failure_stops_session_only() {
        let root = session_tree();
        let sessions = discover_sessions(root.path()).unwrap();
        let mut rec = Recorder {
            fail_on: Some("MTBI001/v2/proc/diffusion/AP/AP.list"),
            ..Default::default()
        };
        let reports = run_tortoise(&sessions, &mut rec);
        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_ok());
        assert_eq!(reports[0].completed, reports[0].total);
        // 第一条 DIFFPREP 是第 9 步.
        assert!(!reports[1].is_ok());
        assert_eq!(reports[1].completed, 8);
        assert!(reports[2].is_ok());
        assert_eq!(rec.commands.len(), 2 * reports[0].total + 9);
        assert!(root.path().join("MTBI002/v1/proc/diffusion/PA").is_dir());
    }

    #[test]
    fn test_run_steps() {
        let steps = vec![
            Step::new("a", "true".into()),
            Step::new("b", "false".into()),
            Step::new("c", "true".into()),
        ];
        let mut rec = Recorder {
            fail_on: Some("false"),
            ..Default::default()
        };
        let session = SessionDir {
            subject: "MTBI001".into(),
            session: "v1".into(),
            path: PathBuf::from("MTBI001/v1"),
        };
        let report = run_steps(&session, &steps, &mut rec);
        assert_eq!((report.completed, report.total), (1, 3));
        assert!(matches!(
            report.error,
            Some(PipelineError::Failed { code: Some(1), .. })
        ));
        assert_eq!(rec.commands, vec!["true", "false"]);
    }

    /// 可选步骤失败不影响后续步骤.
    #[test]
    fn test_optional_step_failure_continues() {
        let steps = vec![
            Step::optional("a", "false".into()),
            Step::new("b", "true".into()),
        ];
        let mut rec = Recorder {
            fail_on: Some("false"),
            ..Default::default()
        };
        let session = SessionDir {
            subject: "MTBI001".into(),
            session: "v1".into(),
            path: PathBuf::from("MTBI001/v1"),
        };
        let report = run_steps(&session, &steps, &mut rec);
        assert!(report.is_ok());
        assert_eq!((report.completed, report.total), (2, 2));
        assert_eq!(rec.commands, vec!["false", "true"]);
    }

    /// 符号链接失败时 (例如重复运行) 会话仍然完整执行.
    #[test]
    fn test_link_failure_is_not_fatal() {
        let root = session_tree();
        let sessions = discover_sessions(root.path()).unwrap();
        let mut rec = Recorder {
            fail_on: Some("ln -s"),
            ..Default::default()
        };
        let reports = run_tortoise(&sessions, &mut rec);
        assert!(reports.iter().all(SessionReport::is_ok));
        assert!(reports.iter().all(|r| r.completed == 15));
        assert_eq!(rec.commands.len(), 45);
    }

    /// 对同一会话重复执行链接步骤.
    #[cfg(unix)]
    #[test]
    fn test_rerun_links() {
        let root = tempfile::tempdir().unwrap();
        let nii = root.path().join("MTBI001/v1/nii");
        fs::create_dir_all(&nii).unwrap();
        for ext in ["nii.gz", "bval", "bvec"] {
            fs::write(nii.join(format!("x_BMAX2500_y.{ext}")), "x").unwrap();
            fs::write(nii.join(format!("x_B0_y.{ext}")), "x").unwrap();
        }
        let sessions = discover_sessions(root.path()).unwrap();
        let s = &sessions[0];
        tortoise::prepare_dirs(s).unwrap();
        let steps = tortoise_steps(s);

        let mut r = ShellRunner::new();
        for _ in 0..2 {
            let report = run_steps(s, &steps[..6], &mut r);
            assert!(report.is_ok());
            assert_eq!(report.completed, 6);
        }
        assert!(s.diffusion_dir().join("AP/x_BMAX2500_y.bval").exists());
        assert!(s.diffusion_dir().join("PA/x_B0_y.nii.gz").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_runner() {
        let mut r = ShellRunner::new();
        assert!(r.run("exit 0").is_ok());
        assert!(matches!(
            r.run("exit 3"),
            Err(PipelineError::Failed { code: Some(3), .. })
        ));
        let mut dry = ShellRunner::new().dry_run(true);
        assert!(dry.run("exit 3").is_ok());

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("thal-hello");
        fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        let mut r = ShellRunner::new().with_path_prefix([dir.path().to_owned()]);
        assert!(r.run("thal-hello").is_ok());
    }
}
