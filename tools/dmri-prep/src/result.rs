//! 运行结果.

use std::io::{self, Write};

/// 单个条目 (一个会话, 一个样本, 或一行信息).
pub struct Entry {
    name: String,
    ok: bool,
    lines: Vec<String>,
}

impl Entry {
    /// 成功条目.
    pub fn ok<S: Into<String>>(name: S, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            lines,
        }
    }

    /// 失败条目.
    pub fn failed<S: Into<String>>(name: S, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            lines,
        }
    }
}

/// 将条目写进 `w` 中.
fn describe_into<W: Write>(e: &Entry, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let mark = if e.ok { "ok" } else { "FAILED" };
    write!(w, "`{}`: {mark}", e.name)?;
    for line in e.lines.iter() {
        write!(w, "\n{S4}{line}")?;
    }
    Ok(())
}

/// 一个子命令的最终结果.
pub struct Summary {
    title: String,
    entries: Vec<Entry>,
}

impl Summary {
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    /// 追加条目.
    #[inline]
    pub fn push(&mut self, e: Entry) {
        self.entries.push(e);
    }

    /// 是否有失败条目?
    pub fn has_failure(&self) -> bool {
        self.entries.iter().any(|e| !e.ok)
    }

    /// 打印结果.
    pub fn analyze(&self) {
        utils::sep();
        let failed = self.entries.iter().filter(|e| !e.ok).count();
        println!(
            "{}: {} 项, {failed} 项失败",
            self.title,
            self.entries.len()
        );
        utils::sep();

        let mut buf = Vec::with_capacity(512);
        for e in self.entries.iter() {
            // 写入 `Vec<u8>` 不会生成 `Err`, 可直接 unwrap.
            describe_into(e, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();
        }
        if !self.entries.is_empty() {
            utils::sep();
        }
    }
}
