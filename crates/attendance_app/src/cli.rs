use std::path::{Path, PathBuf};

use attendance_core::{Msg, Tab};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

pub fn build_cli() -> Command {
    Command::new("attendance")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Console client for the attendance analysis server")
        .arg(
            Arg::new("server")
                .long("server")
                .short('s')
                .help("Server base URL (overrides config, default: http://127.0.0.1:5000)")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("RON settings file (default: ./attendance.ron if present)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("Where diagnostic logs go")
                .value_parser(["terminal", "file", "both"])
                .default_value("file")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("Diagnostic log level: off, error, warn, info, debug or trace")
                .value_parser(level_parser)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging (ignored with --log-level)")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("analyze")
                .about("Run the full attendance analysis and stream its log")
                .arg(
                    Arg::new("export")
                        .long("export")
                        .help("Export the result to a Word file afterwards")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("project-name")
                        .long("project-name")
                        .help("Project name printed in the exported document")
                        .default_value(""),
                )
                .arg(
                    Arg::new("month")
                        .long("month")
                        .help("Month label printed in the exported document, e.g. 03/2024")
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("results")
                .about("List exported result files")
                .arg(
                    Arg::new("refresh")
                        .long("refresh")
                        .help("Reload the list once more and confirm when it arrives")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("download-result")
                .about("Download an exported result file")
                .arg(Arg::new("name").help("File name as listed").required(true).index(1))
                .arg(dest_arg()),
        )
        .subcommand(
            Command::new("pdf")
                .about("Split PDFs into Word documents")
                .subcommand_required(true)
                .subcommand(Command::new("check").about("Check whether the server can split PDFs"))
                .subcommand(Command::new("list").about("List uploaded PDFs and extracted documents"))
                .subcommand(
                    Command::new("upload")
                        .about("Upload a local PDF")
                        .arg(path_arg()),
                )
                .subcommand(
                    Command::new("extract")
                        .about("Extract an uploaded PDF and follow the job")
                        .arg(
                            Arg::new("filename")
                                .help("Stored name of the uploaded PDF")
                                .required(true)
                                .index(1),
                        ),
                )
                .subcommand(
                    Command::new("run")
                        .about("Upload a local PDF, then extract it")
                        .arg(path_arg()),
                )
                .subcommand(
                    Command::new("download")
                        .about("Download one extracted document")
                        .arg(Arg::new("folder").required(true).index(1))
                        .arg(Arg::new("name").required(true).index(2))
                        .arg(dest_arg()),
                ),
        )
}

fn level_parser(name: &str) -> Result<LevelFilter, String> {
    engine_logging::parse_level(name).ok_or_else(|| format!("unknown log level `{name}`"))
}

/// Level picked on the command line, if any.
pub fn log_level(matches: &ArgMatches) -> Option<LevelFilter> {
    matches.get_one::<LevelFilter>("log-level").copied().or_else(|| {
        matches
            .get_flag("verbose")
            .then_some(LevelFilter::Debug)
    })
}

fn path_arg() -> Arg {
    Arg::new("path")
        .help("Local PDF file")
        .required(true)
        .index(1)
        .value_parser(value_parser!(PathBuf))
}

fn dest_arg() -> Arg {
    Arg::new("dest")
        .long("dest")
        .short('d')
        .help("Directory to save into (overrides config, default: current directory)")
        .value_parser(value_parser!(PathBuf))
}

/// Turns the chosen subcommand into the user actions it stands for.
///
/// Each message is dispatched once the previous one has fully settled.
pub fn script(matches: &ArgMatches, download_dir: &Path) -> Vec<Msg> {
    let dest = |sub: &ArgMatches| {
        sub.get_one::<PathBuf>("dest")
            .cloned()
            .unwrap_or_else(|| download_dir.to_path_buf())
    };
    let text = |sub: &ArgMatches, id: &str| sub.get_one::<String>(id).cloned().unwrap_or_default();

    match matches.subcommand() {
        Some(("analyze", sub)) => {
            let mut script = vec![Msg::TabSelected(Tab::Analyze), Msg::AnalyzeClicked];
            if sub.get_flag("export") {
                script.push(Msg::ExportClicked {
                    project_name: text(sub, "project-name"),
                    month: text(sub, "month"),
                });
            }
            script
        }
        Some(("results", sub)) => {
            let mut script = vec![Msg::TabSelected(Tab::Results)];
            if sub.get_flag("refresh") {
                script.push(Msg::RefreshClicked);
            }
            script
        }
        Some(("download-result", sub)) => vec![Msg::DownloadResultClicked {
            name: text(sub, "name"),
            dest_dir: dest(sub),
        }],
        Some(("pdf", pdf)) => match pdf.subcommand() {
            Some(("check", _)) => vec![Msg::PdfCheckClicked],
            Some(("list", _)) => vec![Msg::TabSelected(Tab::Pdf)],
            Some(("upload", sub)) => vec![Msg::PdfFileChosen(pdf_path(sub))],
            Some(("extract", sub)) => vec![
                Msg::PdfSelected(text(sub, "filename")),
                Msg::ExtractClicked,
            ],
            Some(("run", sub)) => vec![Msg::PdfFileChosen(pdf_path(sub)), Msg::ExtractClicked],
            Some(("download", sub)) => vec![Msg::DownloadExtractedClicked {
                folder: text(sub, "folder"),
                name: text(sub, "name"),
                dest_dir: dest(sub),
            }],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn pdf_path(sub: &ArgMatches) -> PathBuf {
    sub.get_one::<PathBuf>("path").cloned().unwrap_or_default()
}
