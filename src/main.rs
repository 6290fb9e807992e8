//! ze - a terminal text editor
//! Main entry point

use std::path::PathBuf;
use std::process::ExitCode;

use ze::editor::Editor;
use ze::term::{Size, Terminal};

struct Args {
    readonly: bool,
    file: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut readonly = false;
    let mut file = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-R" => readonly = true,
            "-h" | "--help" => {
                return Err("usage: ze [-R] [file]".to_string());
            }
            _ if arg.starts_with('-') => {
                return Err(format!("unknown option: {}", arg));
            }
            _ => {
                if file.is_some() {
                    return Err("only one file may be given".to_string());
                }
                file = Some(PathBuf::from(arg));
            }
        }
    }
    Ok(Args { readonly, file })
}

/// Route tracing to `~/.ze/log`; stderr would corrupt the raw-mode screen
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let dir = ze::histfile::config_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, ze::constants::paths::LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ZE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging();

    let size = match Terminal::size() {
        Ok(size) => size,
        Err(_) => Size { rows: 24, cols: 80 },
    };

    let mut editor = match Editor::new(size, args.file.as_deref(), args.readonly) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("ze: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = editor.run() {
        eprintln!("ze: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
