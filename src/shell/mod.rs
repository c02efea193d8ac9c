pub mod command;
pub mod parse;

use crate::shell::{command::execute_command, parse::parse_command};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use mini_yfs::{
    extent::ExtentServer,
    fs::{FileSystemError, FsOptions, Inum, Result},
    lock::{LockClient, LockServer},
    yfs::YfsClient,
};
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{
    io::{self, stdout},
    path::PathBuf,
    sync::Arc,
    thread,
    time::Duration,
};

/// 一次 shell 会话：挂载好的客户端和当前目录
pub struct Session {
    pub yfs: YfsClient,
    pub cwd: String,
}

impl Session {
    /// 格式化一块新的内存磁盘并挂载
    pub fn mount() -> Result<Self> {
        let extent = Arc::new(ExtentServer::new(FsOptions::default())?);
        let locks = LockClient::new(Arc::new(LockServer::leased()), 1);
        Ok(Self {
            yfs: YfsClient::new(extent, locks)?,
            cwd: String::from("/"),
        })
    }

    pub fn absolute(&self, path: &str) -> String {
        normalize(&self.cwd, path)
    }

    /// 拆出父目录 inum、最后一段名字和完整路径
    pub fn parent_of(&self, path: &str) -> Result<(Inum, String, String)> {
        let path = self.absolute(path);
        let idx = match path.rfind('/') {
            Some(idx) if path.len() > 1 => idx,
            _ => return Err(FileSystemError::InvalidPath(path)),
        };
        let parent = self.yfs.resolve(if idx == 0 { "/" } else { &path[..idx] })?;
        let name = path[idx + 1..].to_string();
        Ok((parent, name, path))
    }

    /// 解析一个普通文件
    pub fn file(&self, path: &str) -> Result<(String, Inum)> {
        let path = self.absolute(path);
        let inum = self.yfs.resolve(&path)?;
        if !self.yfs.is_file(inum) {
            return Err(FileSystemError::InvalidPath(format!(
                "{} is not a regular file",
                path
            )));
        }
        Ok((path, inum))
    }
}

/// 相对 `cwd` 展开路径，并按字面消去 `.` 与 `..`
pub fn normalize(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

pub(crate) fn progress_bar(len: u64, template: &str, chars: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(chars),
    );
    pb
}

pub fn start_shell() {
    let mut session = match boot() {
        Ok(session) => session,
        Err(e) => {
            println!("{} {}", "❌ Failed to mount:".red().bold(), e);
            return;
        }
    };

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mini_yfs_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => log::warn!("history disabled: {}", e),
    }

    // 命令补全
    let commands = [
        "help", "ls", "pwd", "mkdir", "rmdir", "create", "rm", "cd", "read", "write", "stat",
        "ln", "readlink", "df", "format", "exit",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}:{}",
                format!("{}@{}", username, hostname).green(),
                session.cwd.blue()
            )),
            DefaultPromptSegment::Basic("mini-yfs".bright_blue().bold().to_string()),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, command::Command::Exit) {
                            println!("{}", "👋 Bye!".bright_yellow());
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting mini-yfs...".yellow());
                break;
            }
            #[allow(unreachable_patterns)]
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
}

/// 启动：格式化磁盘、挂载根目录，配一段欢迎动画
fn boot() -> Result<Session> {
    if let Err(e) = clear_screen() {
        log::debug!("cannot clear terminal: {}", e);
    }
    println!("{}", "[mini-yfs Booting...]".bright_yellow().bold());

    let steps = [
        "🧠 Initializing virtual disk...",
        "⚙️  Mounting file system...",
        "📁 Loading shell...",
    ];
    let pb = progress_bar(
        steps.len() as u64,
        "[{bar:40.cyan/blue}] {pos}/{len} {msg}",
        "=> ",
    );

    pb.set_message(steps[0]);
    let session = Session::mount()?;
    pb.inc(1);
    pb.set_message(steps[1]);
    let free = session.yfs.free_blocks()?;
    pb.inc(1);
    pb.set_message(steps[2]);
    thread::sleep(Duration::from_millis(200));
    pb.inc(1);
    pb.finish_with_message("✅ Ready!");

    if let Err(e) = welcome(free) {
        log::debug!("cannot draw banner: {}", e);
    }
    Ok(session)
}

fn clear_screen() -> io::Result<()> {
    execute!(stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
}

fn welcome(free: u32) -> io::Result<()> {
    thread::sleep(Duration::from_millis(300));
    execute!(
        stdout(),
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!(
            "Welcome to mini-yfs v{} ({} free blocks)\n",
            env!("CARGO_PKG_VERSION"),
            free
        )),
        ResetColor
    )
}
