use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use photo_translator_rust::geometry::TextRegion;
use photo_translator_rust::tools::{
    EditPhotoArgs, OcrArgs, ToolResponse, Toolbox, TranslateArgs, TranslateImageArgs, tool_list,
};

#[derive(Parser, Debug)]
#[command(
    name = "photo-translator-rust",
    version,
    about = "Recognize, translate and redraw the text in photos"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognize text lines in an image
    Ocr {
        image: PathBuf,
    },
    /// Translate texts (arguments, or one per stdin line)
    Translate {
        /// Target language (default: en)
        #[arg(short = 'l', long = "lang", default_value = "en")]
        lang: String,

        /// Source language. Use "auto" to detect.
        #[arg(short = 'L', long = "source-lang", default_value = "auto")]
        source_lang: String,

        texts: Vec<String>,
    },
    /// Redraw text regions described by a JSON file
    Edit {
        image: PathBuf,

        /// JSON array of {"text", "boundingPolygon"} objects
        #[arg(long = "lines")]
        lines: PathBuf,

        /// Output path (default: <name>_output.<ext>)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Recognize, translate and redraw an image
    TranslateImage {
        image: PathBuf,

        /// Target language (default: en)
        #[arg(short = 'l', long = "lang", default_value = "en")]
        lang: String,

        /// Source language. Use "auto" to detect.
        #[arg(short = 'L', long = "source-lang", default_value = "auto")]
        source_lang: String,
    },
    /// Print the tool list with input schemas
    Tools,
    /// Call a tool by name with JSON arguments (argument or stdin)
    Call {
        name: String,
        arguments: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    photo_translator_rust::logging::init(cli.verbose)?;
    let settings = photo_translator_rust::load_settings(cli.read_settings.as_deref())?;
    let toolbox = Toolbox::from_settings(&settings);

    match cli.command {
        Command::Ocr { image } => emit(
            toolbox
                .ocr(OcrArgs {
                    image_path: path_arg(&image),
                })
                .await,
        ),
        Command::Translate {
            lang,
            source_lang,
            texts,
        } => {
            let texts = if texts.is_empty() {
                read_stdin_lines()?
            } else {
                texts
            };
            emit(
                toolbox
                    .translate(TranslateArgs {
                        texts,
                        to_language: lang,
                        from_language: source_language(&source_lang),
                    })
                    .await,
            )
        }
        Command::Edit {
            image,
            lines,
            output,
        } => {
            let content = fs::read_to_string(&lines)
                .with_context(|| format!("failed to read text lines: {}", lines.display()))?;
            let text_lines: Vec<TextRegion> = serde_json::from_str(&content)
                .with_context(|| format!("invalid text lines: {}", lines.display()))?;
            emit(toolbox.edit_photo(EditPhotoArgs {
                image_path: path_arg(&image),
                text_lines,
                output_path: output.as_deref().map(path_arg),
            }))
        }
        Command::TranslateImage {
            image,
            lang,
            source_lang,
        } => emit(
            toolbox
                .translate_image(TranslateImageArgs {
                    image_path: path_arg(&image),
                    to_language: lang,
                    from_language: source_language(&source_lang),
                })
                .await,
        ),
        Command::Tools => {
            print_json(&tool_list())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { name, arguments } => {
            let raw = match arguments {
                Some(raw) => raw,
                None => read_stdin()?,
            };
            let arguments: Value =
                serde_json::from_str(&raw).with_context(|| "tool arguments must be JSON")?;
            let result = toolbox.call(&name, arguments).await;
            print_json(&result)?;
            let failed = result.get("status").and_then(Value::as_str) == Some("error");
            Ok(exit_code(!failed))
        }
    }
}

fn emit<T: Serialize>(response: ToolResponse<T>) -> Result<ExitCode> {
    print_json(&response)?;
    Ok(exit_code(response.is_success()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn source_language(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("auto") {
        None
    } else {
        Some(value.to_string())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn read_stdin() -> Result<String> {
    if io::stdin().is_terminal() {
        return Err(anyhow!("stdin is empty"));
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn read_stdin_lines() -> Result<Vec<String>> {
    let lines = read_stdin()?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if lines.is_empty() {
        return Err(anyhow!("stdin is empty"));
    }
    Ok(lines)
}
