use colored::*;
use dialoguer::Confirm;
use mini_yfs::{
    disk::BLOCK_SIZE,
    fs::{FileSystemError, InodeType, Inum},
    utils::format_timestamp,
};
use std::error::Error;

use crate::shell::{progress_bar, Session};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Ls(Option<String>),
    Pwd,
    Mkdir(String),
    Rmdir(String),
    Create(String),
    Rm(String),
    Cd(String),
    Read(String),
    Write(String, String),
    Stat(String),
    Ln(String, String), // 目标路径，链接名
    Readlink(String),
    Df,
    Format,
    Exit,
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls(path) => {
            let dir = match path {
                Some(path) => session.yfs.resolve(&session.absolute(path))?,
                None => session.yfs.resolve(&session.cwd)?,
            };
            let entries = session.yfs.readdir(dir)?;
            if entries.is_empty() {
                println!("{}", "(empty)".bright_black());
            }
            for entry in entries {
                match entry.entry_type {
                    InodeType::Directory => println!("📁  {}", entry.name.blue().bold()),
                    InodeType::File => println!("📄  {}", entry.name),
                    InodeType::Symlink => {
                        let target = session.yfs.readlink(entry.inum)?;
                        println!("🔗  {} -> {}", entry.name.cyan(), target);
                    }
                }
            }
        }
        Command::Pwd => println!("📍 {}", session.cwd.cyan()),
        Command::Mkdir(name) => {
            let (parent, name, path) = session.parent_of(name)?;
            session.yfs.mkdir(parent, &name)?;
            println!("✅ Created directory: {}", path.green());
        }
        Command::Rmdir(name) => {
            let (parent, name, path) = session.parent_of(name)?;
            let inum = session.yfs.resolve(&path)?;
            if !session.yfs.is_dir(inum) {
                return Err(FileSystemError::NotADirectory(path).into());
            }
            if path == session.cwd || session.cwd.starts_with(&format!("{}/", path)) {
                return Err(FileSystemError::InvalidPath(format!("{} is in use", path)).into());
            }
            session.yfs.unlink(parent, &name)?;
            println!("🗑️ Removed directory: {}", path.red());
        }
        Command::Create(name) => {
            let (parent, name, path) = session.parent_of(name)?;
            session.yfs.create(parent, &name)?;
            println!("📝 Created file: {}", path.green());
        }
        Command::Rm(name) => {
            let (parent, name, path) = session.parent_of(name)?;
            let inum = session.yfs.resolve(&path)?;
            if session.yfs.is_dir(inum) {
                return Err(
                    FileSystemError::InvalidPath(format!("{} is a directory, use rmdir", path))
                        .into(),
                );
            }
            session.yfs.unlink(parent, &name)?;
            println!("❌ Deleted file: {}", path.red());
        }
        Command::Cd(path) => {
            let path = session.absolute(path);
            let inum = session.yfs.resolve(&path)?;
            if !session.yfs.is_dir(inum) {
                return Err(FileSystemError::NotADirectory(path).into());
            }
            session.cwd = path;
            println!("📂 Moved to {}", session.cwd.blue());
        }
        Command::Read(file) => {
            let (path, inum) = session.file(file)?;
            let size = session.yfs.getattr(inum)?.size as usize;
            let content = session.yfs.read(inum, size, 0)?;
            println!("📖 Reading file: {}", path.cyan());
            println!("{}", String::from_utf8_lossy(&content));
        }
        Command::Write(file, content) => {
            let (path, inum) = session.file(file)?;
            let written = session.yfs.write(inum, 0, content.as_bytes())?;
            session.yfs.setattr(inum, written)?;
            println!("✏️  Wrote {} bytes to {}", written, path.cyan());
        }
        Command::Stat(file) => {
            let path = session.absolute(file);
            let inum = session.yfs.resolve(&path)?;
            print_stat(&path, inum, session)?;
        }
        Command::Ln(target, name) => {
            let (parent, name, path) = session.parent_of(name)?;
            session.yfs.symlink(parent, &name, target)?;
            println!("🔗 {} -> {}", path.cyan(), target);
        }
        Command::Readlink(name) => {
            let inum = session.yfs.resolve(&session.absolute(name))?;
            println!("{}", session.yfs.readlink(inum)?);
        }
        Command::Df => {
            let total = session.yfs.extent().total_blocks();
            let free = session.yfs.free_blocks()?;
            let used = total - free;
            println!(
                "{}\n{}: {} ({} KiB)\n{}: {} ({} KiB)\n{}: {} ({} KiB)\n",
                "💾 Disk Usage".bright_yellow().bold(),
                "Total".blue(),
                total,
                total as usize * BLOCK_SIZE / 1024,
                "Used".blue(),
                used,
                used as usize * BLOCK_SIZE / 1024,
                "Free".blue(),
                free,
                free as usize * BLOCK_SIZE / 1024,
            );
        }
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt("This erases every file. Format the virtual disk?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled.".bright_black());
                return Ok(());
            }

            println!("💾 Formatting virtual disk...");
            let pb = progress_bar(2, "[{bar:40.green/black}] {pos}/{len} {msg}", "#>-");
            pb.set_message("writing bitmap");
            let fresh = Session::mount()?;
            pb.inc(1);
            pb.set_message("creating root directory");
            *session = fresh;
            pb.inc(1);
            pb.finish_with_message("✅ Disk formatted successfully!");
        }
        Command::Exit => println!("{}", "👋 Exiting mini-yfs shell...".yellow().bold()),
    }

    Ok(())
}

fn print_stat(path: &str, inum: Inum, session: &Session) -> Result<(), Box<dyn Error>> {
    let attr = session.yfs.getattr(inum)?;
    let kind = match attr.inode_type {
        InodeType::Directory => "Directory",
        InodeType::File => "File",
        InodeType::Symlink => "Symlink",
    };
    println!(
        "{}\n{}: {}\n{}: {:#x}\n{}: {} ({})\n{}: {} bytes\n{}: {}\n{}: {}\n{}: {}\n",
        "📊 File Info".bright_yellow().bold(),
        "Name".blue(),
        path,
        "Inum".blue(),
        inum,
        "Type".blue(),
        kind,
        attr.inode_type.id(),
        "Size".blue(),
        attr.size,
        "Accessed".blue(),
        format_timestamp(attr.atime),
        "Modified".blue(),
        format_timestamp(attr.mtime),
        "Created".blue(),
        format_timestamp(attr.ctime),
    );
    Ok(())
}

fn print_help() {
    println!("{}", "📘 mini-yfs Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls [dir]           List files in a directory
  pwd                Print current path
  mkdir <dir>        Create directory
  rmdir <dir>        Remove an empty directory
  create <file>      Create file
  rm <file>          Remove file or symlink
  cd <dir>           Change directory
  read <file>        Read file content
  write <file> <str> Replace file content with a string
  stat <path>        Show file info
  ln <target> <name> Create a symbolic link
  readlink <name>    Print a symbolic link's target
  df                 Show disk usage
  format             Format virtual disk
  help               Show this help message
  exit               Quit the shell
"
        .bright_black()
    );
}
