//! Generate a ready-to-use AI prompt from the terminal.
//!
//! Reads the API key from the `GEMINI_API_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Basic generation
//! promptsmith --topic "Launch copy for a cat cafe" --use-case Marketing
//!
//! # Pick a style and save the result as a PDF
//! promptsmith --topic "Explain ownership in Rust" --style Instructional \
//!   --use-case Education --pdf
//!
//! # Pipe the topic from stdin
//! cat brief.txt | promptsmith --stdin --style Analytical --use-case "Business Analysis"
//!
//! # Inspect the instruction without calling the API
//! promptsmith --topic "Dungeon intro" --use-case Gaming --print-instruction
//! ```

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use promptsmith::compose::{PromptStyle, UseCase, compose, is_blank};
use promptsmith::config::AppConfig;
use promptsmith::controller::{Action, Controller, FormState, Outcome};
use promptsmith::export::{export_filename, write_pdf};
use promptsmith::{GeminiClient, TextGenerator};
use thiserror::Error;
use tracing::info;

/// Generate a ready-to-use AI prompt with Gemini.
///
/// Reads the API key from the GEMINI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "promptsmith")]
struct Cli {
    // ── Form values ────────────────────────────────────────────
    /// Topic, goal, or context for the prompt
    #[arg(long)]
    topic: Option<String>,

    /// Read the topic from stdin
    #[arg(long)]
    stdin: bool,

    /// Prompt style
    #[arg(long, default_value = "Creative")]
    style: PromptStyle,

    /// Target use-case
    #[arg(long, default_value = "Image Generation")]
    use_case: UseCase,

    // ── Endpoint ───────────────────────────────────────────────
    /// Model to use (overrides GEMINI_MODEL)
    #[arg(long)]
    model: Option<String>,

    // ── Output ─────────────────────────────────────────────────
    /// Also save the result as a PDF; without a path the file is named
    /// generated_prompt_<timestamp>.pdf in the current directory
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pdf: Option<PathBuf>,

    /// Print the composed instruction and exit without calling the API
    #[arg(long)]
    print_instruction: bool,
}

/// What a run produced.
#[derive(Debug, PartialEq, Eq)]
enum Report {
    /// Blank topic: nothing was composed or sent.
    Skipped,
    /// `--print-instruction` output.
    Instruction(String),
    /// The generated prompt, possibly empty.
    Generated(String),
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Error: {0}")]
    Setup(String),
    /// Displayed as is; the message already reads "Error generating prompt: ...".
    #[error("{0}")]
    Generation(String),
}

fn read_topic(cli: &Cli) -> Result<String, CliError> {
    match (&cli.topic, cli.stdin) {
        (Some(_), true) => Err(CliError::Setup(
            "use either --topic or --stdin, not both".to_string(),
        )),
        (Some(topic), false) => Ok(topic.clone()),
        (None, true) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::Setup(format!("failed to read stdin: {e}")))?;
            Ok(buf)
        }
        (None, false) => Err(CliError::Setup(
            "--topic or --stdin is required".to_string(),
        )),
    }
}

async fn run(cli: &Cli) -> Result<Report, CliError> {
    let form = FormState {
        topic: read_topic(cli)?,
        style: cli.style.label().to_string(),
        use_case: cli.use_case.label().to_string(),
    };

    if cli.print_instruction {
        if is_blank(&form.topic) {
            return Ok(Report::Skipped);
        }
        return Ok(Report::Instruction(compose(
            &form.topic,
            &form.style,
            &form.use_case,
        )));
    }

    let config = AppConfig::from_env()
        .map_err(|e| CliError::Setup(e.to_string()))?
        .with_model(cli.model.clone());
    let client = GeminiClient::from_config(&config).map_err(|e| CliError::Setup(e.to_string()))?;

    generate_with(form, cli.pdf.as_deref(), &client).await
}

/// Run one Generate action and optionally save the result as a PDF. An
/// empty `pdf` path picks the default file name.
async fn generate_with(
    form: FormState,
    pdf: Option<&Path>,
    generator: &dyn TextGenerator,
) -> Result<Report, CliError> {
    let mut controller = Controller::with_form(form);
    let outcome = controller
        .trigger(Action::Generate, generator)
        .await
        .map_err(|e| CliError::Setup(e.to_string()))?;

    match outcome {
        Outcome::Ignored => Ok(Report::Skipped),
        Outcome::Failed { message } => Err(CliError::Generation(message)),
        Outcome::Displayed { .. } => {
            let result = controller.current().ok_or_else(|| {
                CliError::Setup("generation finished without a result".to_string())
            })?;

            if let Some(path) = pdf {
                let path = if path.as_os_str().is_empty() {
                    PathBuf::from(export_filename(result.generated_at))
                } else {
                    path.to_path_buf()
                };
                write_pdf(&path, &result.generated_text).map_err(|e| {
                    CliError::Setup(format!("failed to write {}: {e}", path.display()))
                })?;
                info!("Saved PDF to {}", path.display());
            }

            Ok(Report::Generated(result.generated_text.clone()))
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = promptsmith::logging::init_tracing();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(Report::Skipped) => {}
        Ok(Report::Instruction(text) | Report::Generated(text)) => println!("{text}"),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use promptsmith::GenerationError;

    struct Fixed(Result<String, GenerationError>);

    #[async_trait]
    impl TextGenerator for Fixed {
        async fn generate(&self, _instruction: &str) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    fn form(topic: &str) -> FormState {
        FormState {
            topic: topic.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn failure_is_reported_with_one_prefix() {
        let generator = Fixed(Err(GenerationError::transport("HTTP 503: overloaded")));
        let err = generate_with(form("tide pools"), None, &generator)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error generating prompt: transport error: HTTP 503: overloaded"
        );
    }

    #[test]
    fn setup_errors_are_prefixed() {
        let err = CliError::Setup("GEMINI_API_KEY is not set".into());
        assert_eq!(err.to_string(), "Error: GEMINI_API_KEY is not set");
    }

    #[tokio::test]
    async fn empty_text_is_still_a_result() {
        let report = generate_with(form("tide pools"), None, &Fixed(Ok(String::new())))
            .await
            .unwrap();
        assert_eq!(report, Report::Generated(String::new()));
    }

    #[tokio::test]
    async fn blank_topic_is_skipped() {
        let report = generate_with(form("  \t"), None, &Fixed(Ok("unused".into())))
            .await
            .unwrap();
        assert_eq!(report, Report::Skipped);
    }

    #[tokio::test]
    async fn pdf_is_written_next_to_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.pdf");
        let report = generate_with(
            form("lighthouses"),
            Some(&path),
            &Fixed(Ok("A lighthouse at dusk".into())),
        )
        .await
        .unwrap();
        assert_eq!(report, Report::Generated("A lighthouse at dusk".into()));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
