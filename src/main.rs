//! markup-sanitizer 命令行：从文件或标准输入读取标记，输出清洗结果

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use markup_sanitizer::{
    AllowlistConfig, AllowlistOverrides, Sanitizer, strip_all_tags, strip_tags_keep_breaks,
};

/// 清洗模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// 白名单清洗
    Sanitize,
    /// 剥离全部标签
    StripAll,
    /// 剥离标签，保留换行
    KeepBreaks,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// 清洗模式
    #[arg(long, value_enum, default_value_t = Mode::Sanitize)]
    mode: Mode,

    /// 白名单覆盖项（JSON：{"iframe": ["src", "width"]}），仅 sanitize 模式可用
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// 输入字符上限，仅 sanitize 模式可用
    #[arg(long)]
    max_chars: Option<usize>,

    /// 输入文件（默认读取标准输入）
    #[arg(long)]
    input: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// 剥离模式使用固定预设，不接受白名单相关参数
    fn check_mode_args(&self) -> Result<(), clap::Error> {
        if self.mode == Mode::Sanitize {
            return Ok(());
        }
        if self.overrides.is_some() || self.max_chars.is_some() {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--overrides / --max-chars 仅适用于 --mode sanitize",
            ));
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(err) = cli.check_mode_args() {
        err.exit();
    }

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let input = read_input(cli.input.as_ref())?;
    debug!("读取输入{}字节，模式{:?}", input.len(), cli.mode);

    let output = match cli.mode {
        Mode::Sanitize => build_sanitizer(&cli)?.sanitize(&input)?,
        Mode::StripAll => strip_all_tags(&input)?,
        Mode::KeepBreaks => strip_tags_keep_breaks(&input)?,
    };

    io::stdout()
        .write_all(output.as_bytes())
        .context("写入标准输出失败")?;
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("读取输入文件失败：{}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("读取标准输入失败")?;
            Ok(buf)
        }
    }
}

fn build_sanitizer(cli: &Cli) -> anyhow::Result<Sanitizer> {
    let mut builder = AllowlistConfig::builder();

    if let Some(path) = &cli.overrides {
        let json = fs::read_to_string(path)
            .with_context(|| format!("读取覆盖项文件失败：{}", path.display()))?;
        let overrides = AllowlistOverrides::from_json(&json)
            .with_context(|| format!("覆盖项格式错误：{}", path.display()))?;
        builder = builder.overrides(overrides);
    }
    if let Some(max_chars) = cli.max_chars {
        builder = builder.max_input_chars(max_chars);
    }

    Ok(Sanitizer::new(builder.build()?))
}
