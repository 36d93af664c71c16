use anyhow::Result;
use brename_core::{
    app_paths, apply_plan, available_placeholders, generate_plan, load_config, render_config,
    ApplyMode, ApplyResult, CharPredicate, IndexOptions, NamePart, NumberingOptions, PlanOptions,
    RenamePlan, RenameStatus, SelectionOptions, SwapSide, TextOptions, Token, Transform,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_RENAME_FAILED: u8 = 2;

/// Batch renaming of files.
///
/// SELECT-OPTIONS define which part of each name changes, COMMAND defines how.
/// Selection stages run in a fixed order: 1. basename/ext, 2. index, 3. text,
/// 4. char, 5. pattern.
///
/// Pattern placeholders have the form |NAME| or |NAME:ATTR...| with the
/// attributes `?` (lazy), `s` (select this part), `a` (letters), `n` (digits)
/// and a count such as `4`. For "20180122-description-long.jpg" the pattern
/// "|Y:4||M:2||D:2|-|A:s:?|-|B|" binds Y=2018, M=01, D=22, A=description
/// (selected) and B=long.jpg.
#[derive(Debug, Parser)]
#[command(name = "brename", version, verbatim_doc_comment)]
struct Cli {
    /// Activate debug logging and print full error chains
    #[arg(long)]
    debug: bool,
    /// Explain what is being done
    #[arg(short, long)]
    verbose: bool,
    /// Only simulate the renaming
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Process directories recursively
    #[arg(short, long)]
    recursive: bool,
    /// Rename directories only
    #[arg(long)]
    dir_only: bool,
    /// Keep paths matching this glob even if excluded
    #[arg(long)]
    include: Vec<String>,
    /// Skip paths matching this glob
    #[arg(long)]
    exclude: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Disable colored output
    #[arg(long)]
    no_color: bool,
    #[command(flatten)]
    name_part: NamePartArgs,
    #[command(flatten)]
    index: IndexArgs,
    #[command(flatten)]
    text: TextArgs,
    #[command(flatten)]
    chars: CharArgs,
    /// 5. Select text by pattern
    #[arg(long)]
    pattern: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// 1. Select the part of a file name (<basename>.<ext>)
#[derive(Debug, Args)]
#[group(multiple = false)]
struct NamePartArgs {
    /// Select the basename
    #[arg(short = 'b')]
    basename: bool,
    /// Select the extension without dot
    #[arg(short = 'e')]
    ext: bool,
    /// Select the extension with dot
    #[arg(short = 'E')]
    ext_with_dot: bool,
}

/// 2. Select text by single index (--index) or index range (--index*)
#[derive(Debug, Args)]
struct IndexArgs {
    /// Select a single character by position from the left
    #[arg(long = "index", value_parser = positive_int)]
    single: Option<usize>,
    /// Start position from the left (inclusive)
    #[arg(long, value_parser = positive_int)]
    index_from: Option<usize>,
    /// End position from the left (exclusive)
    #[arg(long, value_parser = positive_int)]
    index_to: Option<usize>,
    /// Start position from the right (inclusive)
    #[arg(long, value_parser = positive_int)]
    indexr_from: Option<usize>,
    /// End position from the right (exclusive)
    #[arg(long, value_parser = positive_int)]
    indexr_to: Option<usize>,
}

/// 3. Select text by literal (--text) or literal ranges (--text*)
#[derive(Debug, Args)]
struct TextArgs {
    /// Select every occurrence of TEXT
    #[arg(long = "text", value_parser = non_empty)]
    split: Option<String>,
    /// Select from TEXT onward
    #[arg(long, value_parser = non_empty)]
    text_from: Option<String>,
    /// Select up to and including TEXT
    #[arg(long, value_parser = non_empty)]
    text_to: Option<String>,
    /// Select after TEXT
    #[arg(long, value_parser = non_empty)]
    textx_from: Option<String>,
    /// Select up to TEXT
    #[arg(long, value_parser = non_empty)]
    textx_to: Option<String>,
}

/// 4. Select text by character type
#[derive(Debug, Args)]
#[group(multiple = false)]
struct CharArgs {
    #[arg(long)]
    char_num: bool,
    #[arg(long)]
    char_non_num: bool,
    #[arg(long)]
    char_alpha: bool,
    #[arg(long)]
    char_non_alpha: bool,
    #[arg(long)]
    char_alnum: bool,
    #[arg(long)]
    char_non_alnum: bool,
    #[arg(long)]
    char_upper: bool,
    #[arg(long)]
    char_lower: bool,
}

#[derive(Debug, Args)]
struct Files {
    /// Files or folders
    #[arg(default_value = ".")]
    files: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the selected text and exit
    Test {
        /// Show the available placeholders
        #[arg(short = 'p')]
        show_placeholders: bool,
        #[command(flatten)]
        files: Files,
    },
    /// Add text before/after the selection: cd -> ABcd
    Add {
        /// Add TEXT at the end
        #[arg(short = 'e')]
        end: bool,
        text: String,
        #[command(flatten)]
        files: Files,
    },
    /// Remove the selection: ABcd -> cd
    Remove {
        #[command(flatten)]
        files: Files,
    },
    /// Replace the selection: ABcd -> EFcd
    Replace {
        text: String,
        #[command(flatten)]
        files: Files,
    },
    /// Lower case: Ab -> ab
    Lowercase {
        #[command(flatten)]
        files: Files,
    },
    /// Upper case: ab -> AB
    Uppercase {
        #[command(flatten)]
        files: Files,
    },
    /// Capitalize every word: ab cd -> Ab Cd
    Camelcase {
        #[command(flatten)]
        files: Files,
    },
    /// Sentence case: ab cd -> Ab cd
    Sentencecase {
        #[command(flatten)]
        files: Files,
    },
    /// Pad the selection with CHAR to a common width: 1, 100 -> 001, 100
    Fill {
        /// Target width (default: longest selection)
        #[arg(short = 'w')]
        width: Option<usize>,
        /// Pad at the end
        #[arg(short = 'e')]
        end: bool,
        char: String,
        #[command(flatten)]
        files: Files,
    },
    /// Swap the selection around SEPARATOR: a_b -> b_a
    Swap {
        /// The separator belongs to the left part
        #[arg(short = 'l', conflicts_with = "right")]
        left: bool,
        /// The separator belongs to the right part
        #[arg(short = 'r')]
        right: bool,
        separator: String,
        #[command(flatten)]
        files: Files,
    },
    /// Number the selection: a, b -> 01-a, 02-b
    Number {
        /// Add the number at the end
        #[arg(short = 'e')]
        end: bool,
        /// Text before the number
        #[arg(short = 'b')]
        before: Option<String>,
        /// Text after the number
        #[arg(short = 'a')]
        after: Option<String>,
        /// Width of the number, e.g. 3: 001, 002
        #[arg(short = 'w')]
        width: Option<usize>,
        /// Start value
        #[arg(short = 's', default_value_t = 1, allow_negative_numbers = true)]
        start: i64,
        /// Step size
        #[arg(short = 'i', default_value_t = 1, allow_negative_numbers = true)]
        step: i64,
        /// Keep counting across folders
        #[arg(long)]
        no_reset: bool,
        /// Replace the selection with the number
        #[arg(long)]
        replace: bool,
        #[command(flatten)]
        files: Files,
    },
    /// Cut N characters at the beginning/end of the selection: ABcd -> cd
    Cut {
        /// Cut at the end
        #[arg(short = 'e')]
        end: bool,
        count: usize,
        #[command(flatten)]
        files: Files,
    },
    /// Keep N characters at the beginning/end of the selection: abC -> ab
    Keep {
        /// Keep the end
        #[arg(short = 'e')]
        end: bool,
        count: usize,
        #[command(flatten)]
        files: Files,
    },
    /// Move the selected files to DIR: abc -> dir/abc
    Dir {
        dir: String,
        #[command(flatten)]
        files: Files,
    },
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

fn positive_int(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("invalid positive int value: {value}")),
    }
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("invalid non-empty text".to_string())
    } else {
        Ok(value.to_string())
    }
}

impl Cli {
    fn selection(&self) -> SelectionOptions {
        let name_part = if self.name_part.basename {
            Some(NamePart::Stem)
        } else if self.name_part.ext {
            Some(NamePart::Extension)
        } else if self.name_part.ext_with_dot {
            Some(NamePart::ExtensionWithDot)
        } else {
            None
        };

        let c = &self.chars;
        let char_class = [
            (c.char_num, CharPredicate::Digit),
            (c.char_non_num, CharPredicate::NonDigit),
            (c.char_alpha, CharPredicate::Alpha),
            (c.char_non_alpha, CharPredicate::NonAlpha),
            (c.char_alnum, CharPredicate::Alnum),
            (c.char_non_alnum, CharPredicate::NonAlnum),
            (c.char_upper, CharPredicate::Upper),
            (c.char_lower, CharPredicate::Lower),
        ]
        .into_iter()
        .find_map(|(set, predicate)| set.then_some(predicate));

        SelectionOptions {
            name_part,
            index: IndexOptions {
                single: self.index.single,
                from: self.index.index_from,
                to: self.index.index_to,
                right_from: self.index.indexr_from,
                right_to: self.index.indexr_to,
            },
            text: TextOptions {
                split: self.text.split.clone(),
                from: self.text.text_from.clone(),
                from_exclusive: self.text.textx_from.clone(),
                to: self.text.text_to.clone(),
                to_exclusive: self.text.textx_to.clone(),
            },
            char_class,
            pattern: self.pattern.clone(),
        }
    }
}

impl Commands {
    /// `None` for commands that do not rename.
    fn transform(&self) -> Option<(Transform, &[PathBuf])> {
        let (transform, files) = match self {
            Commands::Test {
                show_placeholders,
                files,
            } => (
                Transform::Test {
                    show_placeholders: *show_placeholders,
                },
                files,
            ),
            Commands::Add { end, text, files } => (
                Transform::Add {
                    text: text.clone(),
                    at_end: *end,
                },
                files,
            ),
            Commands::Remove { files } => (Transform::Remove, files),
            Commands::Replace { text, files } => (Transform::Replace { text: text.clone() }, files),
            Commands::Lowercase { files } => (Transform::Lowercase, files),
            Commands::Uppercase { files } => (Transform::Uppercase, files),
            Commands::Camelcase { files } => (Transform::Camelcase, files),
            Commands::Sentencecase { files } => (Transform::Sentencecase, files),
            Commands::Fill {
                width,
                end,
                char,
                files,
            } => (
                Transform::Fill {
                    fill: char.clone(),
                    width: *width,
                    at_end: *end,
                },
                files,
            ),
            Commands::Swap {
                left,
                right,
                separator,
                files,
            } => {
                let side = match (left, right) {
                    (true, _) => Some(SwapSide::Left),
                    (_, true) => Some(SwapSide::Right),
                    _ => None,
                };
                (
                    Transform::Swap {
                        separator: separator.clone(),
                        side,
                    },
                    files,
                )
            }
            Commands::Number {
                end,
                before,
                after,
                width,
                start,
                step,
                no_reset,
                replace,
                files,
            } => (
                Transform::Number(NumberingOptions {
                    start: *start,
                    step: *step,
                    width: *width,
                    reset_per_directory: !no_reset,
                    at_end: *end,
                    replace: *replace,
                    before: before.clone().unwrap_or_default(),
                    after: after.clone().unwrap_or_default(),
                }),
                files,
            ),
            Commands::Cut { end, count, files } => (
                Transform::Cut {
                    count: *count,
                    at_end: *end,
                },
                files,
            ),
            Commands::Keep { end, count, files } => (
                Transform::Keep {
                    count: *count,
                    at_end: *end,
                },
                files,
            ),
            Commands::Dir { dir, files } => (
                Transform::Dir {
                    target: dir.clone(),
                },
                files,
            ),
            Commands::Config(_) => return None,
        };
        Some((transform, &files.files))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            if cli.debug {
                eprintln!("{} {err:?}", "error:".red());
            } else {
                eprintln!("{} {err}", "error:".red());
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.debug {
        "brename=debug,brename_core=debug"
    } else if cli.verbose {
        "brename_core=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one command and returns the process exit status.
fn run(cli: &Cli) -> Result<u8> {
    if let Commands::Config(config) = &cli.command {
        return match config.action {
            ConfigAction::Show => cmd_config_show(),
        };
    }

    let config = load_config()?;
    if cli.no_color || !config.color {
        colored::control::set_override(false);
    }

    let Some((transform, files)) = cli.command.transform() else {
        return Ok(EXIT_SUCCESS);
    };
    let options = PlanOptions {
        inputs: files.to_vec(),
        recursive: cli.recursive || config.recursive_default,
        dir_only: cli.dir_only,
        include: config.include.iter().chain(&cli.include).cloned().collect(),
        exclude: config.exclude.iter().chain(&cli.exclude).cloned().collect(),
        selection: cli.selection(),
        transform,
    };
    debug!(?options, "plan options");

    let mut plan = generate_plan(&options)?;
    let cwd = std::env::current_dir().unwrap_or_default();

    if let Transform::Test { show_placeholders } = plan.transform {
        match cli.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Table if show_placeholders => print_placeholders(&plan, &cwd),
            OutputFormat::Table => print_selection(&plan),
        }
        return Ok(EXIT_SUCCESS);
    }

    let mode = if cli.dry_run {
        ApplyMode::DryRun
    } else {
        ApplyMode::Execute
    };
    let result = apply_plan(&mut plan, mode)?;

    match cli.output {
        OutputFormat::Json => {
            let report = Report {
                mode,
                plan: &plan,
                result: &result,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_outcomes(&result, &cwd, cli.verbose || cli.dry_run),
    }

    eprintln!(
        "{}: renamed {}, unchanged {}, failed {} (scanned {}, excluded {}, selected {})",
        match mode {
            ApplyMode::DryRun => "dry-run",
            ApplyMode::Execute => "done",
        },
        result.applied,
        result.unchanged,
        result.failed,
        plan.stats.scanned,
        plan.stats.excluded,
        plan.stats.selected,
    );

    if mode == ApplyMode::Execute && !result.is_success() {
        return Ok(EXIT_RENAME_FAILED);
    }
    Ok(EXIT_SUCCESS)
}

#[derive(Serialize)]
struct Report<'a> {
    mode: ApplyMode,
    plan: &'a RenamePlan,
    result: &'a ApplyResult,
}

fn cmd_config_show() -> Result<u8> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", render_config(&config)?);
    Ok(EXIT_SUCCESS)
}

fn relative<'a>(path: &'a Path, cwd: &Path) -> &'a Path {
    path.strip_prefix(cwd).unwrap_or(path)
}

fn print_outcomes(result: &ApplyResult, cwd: &Path, show_renamed: bool) {
    for outcome in &result.outcomes {
        let source = relative(&outcome.source, cwd).display();
        let target = relative(&outcome.target, cwd).display();
        match &outcome.status {
            RenameStatus::Renamed if show_renamed => println!("{source} -> {target}"),
            RenameStatus::Renamed => {}
            RenameStatus::Unchanged => {
                println!("{}", format!("{source}: file name not changed").dimmed())
            }
            RenameStatus::Failed(reason) => println!(
                "{}",
                format!("{source}: renaming to {target} failed ({reason})").red()
            ),
        }
    }
}

fn render_tokens(tokens: &[Token]) -> String {
    let colorize = colored::control::SHOULD_COLORIZE.should_colorize();
    tokens
        .iter()
        .map(|t| match (t.selected, colorize) {
            (true, true) => t.text.cyan().to_string(),
            (true, false) => format!("[{}]", t.text),
            (false, _) => t.text.clone(),
        })
        .collect()
}

/// Selected spans per file under a column ruler.
fn print_selection(plan: &RenamePlan) {
    let columns = plan
        .renamers
        .iter()
        .map(|r| r.source_name().chars().count() / 10 + 1)
        .max()
        .unwrap_or(1);

    let tens: String = (1..=columns).map(|i| format!("{:>10}", i * 10)).collect();
    let ones = "123456789|".repeat(columns);
    println!("{}", format!("{tens}   {tens}").bold());
    println!("{}", format!("{ones}   {ones}").bold());

    for renamer in &plan.renamers {
        let name = format!("{:<width$}", renamer.source_name(), width = columns * 10);
        let line = format!("{name} : {}", render_tokens(renamer.tokens()));
        if renamer.has_selection() {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_placeholders(plan: &RenamePlan, cwd: &Path) {
    for renamer in &plan.renamers {
        println!("placeholders for: {}", relative(renamer.path(), cwd).display());
        let fallback = Token::unselected(renamer.source_name());
        let token = renamer.first_selected().unwrap_or(&fallback);
        for (name, value) in available_placeholders(renamer, token) {
            if value != name {
                println!("  {} {}", format!("{name:<10}").yellow(), value.cyan());
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("brename").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn selection_flags_map_to_stages() {
        let cli = parse(&[
            "-b",
            "--index-from",
            "4",
            "--textx-to",
            "#",
            "--char-upper",
            "--pattern",
            "|a:s|",
            "test",
        ]);
        let selection = cli.selection();
        assert_eq!(selection.name_part, Some(NamePart::Stem));
        assert_eq!(selection.index.from, Some(4));
        assert_eq!(selection.text.to_exclusive.as_deref(), Some("#"));
        assert_eq!(selection.char_class, Some(CharPredicate::Upper));
        assert_eq!(selection.pattern.as_deref(), Some("|a:s|"));
    }

    #[test]
    fn exclusive_groups_and_invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["brename", "-b", "-e", "test"]).is_err());
        assert!(Cli::try_parse_from(["brename", "--char-num", "--char-alpha", "test"]).is_err());
        assert!(Cli::try_parse_from(["brename", "--index", "0", "test"]).is_err());
        assert!(Cli::try_parse_from(["brename", "--text", "", "test"]).is_err());
        assert!(Cli::try_parse_from(["brename", "swap", "-l", "-r", "_"]).is_err());
    }

    #[test]
    fn number_command_builds_numbering_options() {
        let cli = parse(&[
            "number", "-s", "35", "-i", "33", "--no-reset", "-b", "n", "a.txt", "b.txt",
        ]);
        let (transform, files) = cli.command.transform().expect("renaming command");
        match transform {
            Transform::Number(options) => {
                assert_eq!(options.start, 35);
                assert_eq!(options.step, 33);
                assert!(!options.reset_per_directory);
                assert_eq!(options.before, "n");
                assert!(options.after.is_empty());
            }
            other => panic!("unexpected transform {other:?}"),
        }
        assert_eq!(files, &[PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn files_default_to_current_directory() {
        let cli = parse(&["add", "-e", "_x"]);
        let (transform, files) = cli.command.transform().expect("renaming command");
        assert_eq!(
            transform,
            Transform::Add {
                text: "_x".to_string(),
                at_end: true
            }
        );
        assert_eq!(files, &[PathBuf::from(".")]);
        assert!(parse(&["config", "show"]).command.transform().is_none());
    }

    #[test]
    fn partial_failure_exits_with_a_distinct_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let inputs: Vec<PathBuf> = ["a.txt", "b.txt", "c.txt"]
            .iter()
            .map(|name| root.join(name))
            .collect();
        for path in &inputs {
            std::fs::write(path, "x").expect("write file");
        }
        std::fs::write(root.join("X_b.txt"), "unrelated").expect("write file");

        let mut args = vec!["-b".to_string(), "add".to_string(), "X_".to_string()];
        args.extend(inputs.iter().map(|p| p.display().to_string()));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let mut dry_run_args = vec!["-n"];
        dry_run_args.extend(&args);
        let dry_run = parse(&dry_run_args);
        assert_eq!(run(&dry_run).expect("dry run"), EXIT_SUCCESS);

        let execute = parse(&args);
        assert_eq!(run(&execute).expect("execute"), EXIT_RENAME_FAILED);
        assert!(root.join("X_a.txt").exists());
        assert!(root.join("X_c.txt").exists());
        assert!(root.join("b.txt").exists());
        assert_eq!(
            std::fs::read_to_string(root.join("X_b.txt")).expect("read"),
            "unrelated"
        );
    }
}
