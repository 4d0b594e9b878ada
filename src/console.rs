//! Console front-end
//!
//! Selects one document from disk, analyzes it, then reads follow-up questions
//! from stdin until `quit` or end of input.

use crate::ai::{AnalysisClient, ClientConfig, FollowupClient};
use crate::error::SessionError;
use crate::session::{read_document_file, AnalysisResult, Completion, FollowupExchange, SessionMachine};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "medscan")]
#[command(about = "Analyze a prescription, medicine label or medical report and ask about it", long_about = None)]
#[command(version)]
pub struct Cli {
    /// PDF or image file to analyze
    pub file: PathBuf,

    /// Probe the follow-up provider before uploading
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Quit,
    Retry,
    State,
    Ask(String),
}

fn parse_line(line: &str) -> ConsoleCommand {
    match line.trim() {
        "quit" | "exit" => ConsoleCommand::Quit,
        "retry" => ConsoleCommand::Retry,
        "state" => ConsoleCommand::State,
        _ => ConsoleCommand::Ask(line.to_string()),
    }
}

pub(crate) async fn run_console(cli: Cli) -> Result<(), String> {
    let config = ClientConfig::from_env().map_err(|e| e.to_string())?;
    let followup = Arc::new(FollowupClient::new(config.followup));

    if cli.check {
        match followup.check_connection().await {
            Ok(true) => println!("Follow-up provider is reachable."),
            Ok(false) => println!("Follow-up provider answered unexpectedly."),
            Err(e) => println!("Follow-up provider check failed: {}", e.user_message()),
        }
    }

    let machine = SessionMachine::new(Arc::new(AnalysisClient::new(config.analysis)), followup);

    let file = read_document_file(&cli.file)
        .await
        .map_err(|e| format!("Failed to read {}: {}", cli.file.display(), e))?;
    machine
        .select_document(file.payload, &file.media_type, &file.name)
        .map_err(|e| e.user_message())?;

    println!("Analyzing {}...", file.name);
    match machine.request_analysis().await {
        Ok(analysis) => print_analysis(&analysis),
        Err(e) => print_error(&e),
    }

    println!("Ask a question, or type 'retry', 'state' or 'quit'.");
    command_loop(&machine, BufReader::new(tokio::io::stdin())).await
}

async fn command_loop<R>(machine: &SessionMachine, input: R) -> Result<(), String>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        match parse_line(&line) {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Retry => match machine.retry().await {
                Ok(Completion::Analysis(analysis)) => print_analysis(&analysis),
                Ok(Completion::Followup(exchange)) => print_exchange(&exchange),
                Err(e) => print_error(&e),
            },
            ConsoleCommand::State => match serde_json::to_string_pretty(&machine.state()) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("Failed to render session state: {}", e),
            },
            ConsoleCommand::Ask(question) => match machine.ask_followup(&question).await {
                Ok(exchange) => print_exchange(&exchange),
                Err(e) => print_error(&e),
            },
        }
    }

    Ok(())
}

fn print_analysis(analysis: &AnalysisResult) {
    println!("\n== Extracted text ==\n{}", analysis.extracted_text);
    println!("\n== Analysis ==\n{}\n", analysis.analysis_summary);
}

fn print_exchange(exchange: &FollowupExchange) {
    println!("\n{}\n", exchange.answer);
}

fn print_error(error: &SessionError) {
    if error.is_user_facing() {
        println!("{}", error.user_message());
        if !error.is_validation() {
            println!("Type 'retry' to try again.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AnalysisProvider, FollowupProvider};
    use crate::error::SessionResult;
    use crate::identity::Principal;
    use crate::session::Document;
    use async_trait::async_trait;

    struct EchoAnalysis;

    #[async_trait]
    impl AnalysisProvider for EchoAnalysis {
        async fn analyze(&self, document: &Document, _: Option<&Principal>) -> SessionResult<AnalysisResult> {
            Ok(AnalysisResult::new(document.name.clone(), "summary"))
        }
    }

    struct EchoFollowup;

    #[async_trait]
    impl FollowupProvider for EchoFollowup {
        async fn ask(&self, _: &AnalysisResult, question: &str, _: Option<&Principal>) -> SessionResult<String> {
            Ok(format!("echo: {}", question))
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("quit"), ConsoleCommand::Quit);
        assert_eq!(parse_line("  exit "), ConsoleCommand::Quit);
        assert_eq!(parse_line("retry"), ConsoleCommand::Retry);
        assert_eq!(parse_line("state"), ConsoleCommand::State);
        assert_eq!(
            parse_line(" What is the dose? "),
            ConsoleCommand::Ask(" What is the dose? ".into())
        );
    }

    #[test]
    fn test_cli_args() {
        let cli = Cli::try_parse_from(["medscan", "rx.pdf", "--check"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("rx.pdf"));
        assert!(cli.check);

        assert!(Cli::try_parse_from(["medscan"]).is_err());
    }

    #[tokio::test]
    async fn test_command_loop_asks_until_quit() {
        let machine = SessionMachine::new(Arc::new(EchoAnalysis), Arc::new(EchoFollowup));
        machine
            .select_document(b"%PDF".to_vec(), "application/pdf", "rx.pdf")
            .unwrap();
        machine.request_analysis().await.unwrap();

        let input: &[u8] = b"How often?\n\nstate\nquit\nNever asked\n";
        command_loop(&machine, input).await.unwrap();

        let state = machine.state();
        assert_eq!(state.status(), "analyzed");
        assert_eq!(state.exchanges().len(), 1);
        assert_eq!(state.exchanges()[0].answer, "echo: How often?");
    }
}
