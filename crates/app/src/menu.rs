use std::io::{self, BufRead, Write};
use std::path::Path;
use textbook_rag_core::{
    Answer, ChatModel, Embedder, IndexStore, RagError, RagSession, NO_INDEX_MESSAGE,
};
use tracing::error;

/// Interactive loop: 1 uploads a PDF, 2 asks a question, 3 exits. End of
/// input also exits. Pipeline failures are reported and the menu is shown
/// again.
pub fn run_menu<E, S, C, R, W>(
    session: &mut RagSession<E, S, C>,
    input: R,
    output: &mut W,
) -> io::Result<()>
where
    E: Embedder,
    S: IndexStore,
    C: ChatModel,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        writeln!(output, "\nTextbook RAG Chatbot")?;
        writeln!(output, "1. Upload PDF")?;
        writeln!(output, "2. Ask a Question")?;
        writeln!(output, "3. Exit")?;

        let Some(choice) = prompt(output, &mut lines, "Enter your choice: ")? else {
            break;
        };

        match choice.as_str() {
            "1" => {
                let Some(path) = prompt(output, &mut lines, "Enter PDF path: ")? else {
                    break;
                };
                writeln!(output, "Processing file: {path} ...")?;
                match session.ingest_pdf(Path::new(&path)) {
                    Ok(report) => writeln!(
                        output,
                        "PDF processed & stored with {} chunks!",
                        report.chunks
                    )?,
                    Err(RagError::DocumentNotFound(_)) => writeln!(output, "File not found!")?,
                    Err(failure) => {
                        error!(error = %failure, "ingestion failed");
                        writeln!(output, "Ingestion failed: {failure}")?;
                    }
                }
            }
            "2" => {
                let Some(question) = prompt(output, &mut lines, "Enter your question: ")? else {
                    break;
                };
                match session.ask(&question) {
                    Ok(Answer::NoIndex) => writeln!(output, "{NO_INDEX_MESSAGE}")?,
                    Ok(answer) => writeln!(output, "\nAI Response:\n{}", answer.text())?,
                    Err(failure) => {
                        error!(error = %failure, "question failed");
                        writeln!(output, "Query failed: {failure}")?;
                    }
                }
            }
            "3" => {
                writeln!(output, "Exiting...")?;
                break;
            }
            _ => writeln!(output, "Invalid choice! Please select again.")?,
        }
    }

    Ok(())
}

fn prompt<W, I>(output: &mut W, lines: &mut I, label: &str) -> io::Result<Option<String>>
where
    W: Write,
    I: Iterator<Item = io::Result<String>>,
{
    write!(output, "{label}")?;
    output.flush()?;

    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => {
            writeln!(output)?;
            Ok(None)
        }
    }
}
