//! Agent implementation - the interactive plan / confirm / execute / remember loop

use crate::history::History;
use crate::planner::Planner;
use recall_core::{Embedder, LlmProvider, Metadata, Result, VectorMemory};
use sha2::{Digest, Sha256};
use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Demo documents written by `seed`
pub const SEED_DOCUMENTS: [(&str, &str, &str); 2] = [
    ("doc1", "Project X summary: This project builds an agent to summarize docs.", "proj-x"),
    ("doc2", "Notes: Add tests and demo video. Remember to commit to GitHub.", "notes"),
];

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hits shown for a retrieval
    pub retrieve_top_k: usize,
    /// Characters of document text shown per hit
    pub preview_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            retrieve_top_k: 5,
            preview_chars: 300,
        }
    }
}

/// One line of user input, classified
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Exit,
    Retrieve(&'a str),
    Prompt(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        const RETRIEVE: &str = "retrieve:";

        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Command::Exit;
        }
        match line.get(..RETRIEVE.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(RETRIEVE) => {
                Command::Retrieve(line[RETRIEVE.len()..].trim())
            }
            _ => Command::Prompt(line),
        }
    }
}

/// Only answers starting with `y` (any case, surrounding space ignored) confirm
fn is_affirmative(answer: &str) -> bool {
    answer.trim().to_lowercase().starts_with('y')
}

/// First 12 hex digits of SHA-256 over `<secs>.<nanos>-<input>`
fn make_doc_id(input: &str, now: SystemTime) -> String {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let seed = format!(
        "{}.{:09}-{}",
        since_epoch.as_secs(),
        since_epoch.subsec_nanos(),
        input
    );
    let digest = Sha256::digest(seed.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(12);
    id
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// The agent orchestrator - planner, short-term history and long-term memory
pub struct Agent<P, E> {
    planner: Planner<P>,
    memory: VectorMemory<E>,
    history: History,
    config: AgentConfig,
}

impl<P: LlmProvider, E: Embedder> Agent<P, E> {
    pub fn new(planner: Planner<P>, memory: VectorMemory<E>) -> Self {
        Self::with_config(planner, memory, AgentConfig::default())
    }

    pub fn with_config(planner: Planner<P>, memory: VectorMemory<E>, config: AgentConfig) -> Self {
        Self {
            planner,
            memory,
            history: History::new(),
            config,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn memory(&self) -> &VectorMemory<E> {
        &self.memory
    }

    /// Run the interactive loop until `exit`/`quit` or end of input.
    ///
    /// Only failures to write to `output` are returned.
    pub async fn run<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        writeln!(
            output,
            "Agent ready. Type 'exit' or 'quit' to stop. Use 'retrieve: <text>' to search memory."
        )?;

        loop {
            write!(output, "\nUser> ")?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                debug!("input closed");
                break;
            };

            match Command::parse(&line) {
                Command::Empty => continue,
                Command::Exit => {
                    writeln!(output, "Goodbye.")?;
                    break;
                }
                Command::Retrieve(query) => self.retrieve(query, output).await?,
                Command::Prompt(text) => self.turn(text, input, output).await?,
            }
        }
        Ok(())
    }

    /// Plan, confirm, execute and remember one user prompt
    async fn turn<R: BufRead, W: Write>(&mut self, text: &str, input: &mut R, output: &mut W) -> Result<()> {
        self.history.push_user(text);
        let prompt = format!("Context:\n{}\n\nUser: {}", self.history.context(), text);

        let plan = self.planner.plan(&prompt).await;
        let plan_text = plan.to_string();

        writeln!(output, "\n=== AGENT PLAN ===\n")?;
        writeln!(output, "{}", plan_text)?;
        if let Some(result) = plan.exec_result() {
            writeln!(output, "Calculator result: {}", result)?;
        }

        write!(output, "\nExecute plan? (y/n) > ")?;
        output.flush()?;
        let answer = read_line(input)?.unwrap_or_default();
        if !is_affirmative(&answer) {
            writeln!(output, "Execution aborted by human.")?;
            self.history.push_assistant("(plan aborted)");
            return Ok(());
        }

        let result_text = match self.planner.execute(&plan_text).await {
            Ok(result) => {
                writeln!(output, "Result: {}", result)?;
                result
            }
            Err(e) => {
                let failure = format!("({} execution failed: {})", self.planner.provider_name(), e.message());
                writeln!(output, "{}", failure)?;
                failure
            }
        };

        let doc_id = make_doc_id(text, SystemTime::now());
        let doc_text = format!("User: {}\nAgent: {}", text, result_text);
        let metadata = Metadata::from([("source".to_string(), "agent_run".to_string())]);

        if self.memory.store_document(&doc_id, &doc_text, metadata).await {
            writeln!(output, "Saved to memory with id {}", doc_id)?;
        } else {
            writeln!(output, "Failed to save to memory.")?;
        }

        self.history.push_assistant(result_text);
        Ok(())
    }

    /// Print the memory hits for `query`
    pub async fn retrieve<W: Write>(&mut self, query: &str, output: &mut W) -> Result<()> {
        let hits = self.memory.search(query, self.config.retrieve_top_k).await;
        if hits.is_empty() {
            writeln!(output, "No documents found in long-term memory.")?;
            return Ok(());
        }

        writeln!(output, "\n--- Memory Results ---")?;
        for hit in &hits {
            writeln!(output, "- ID: {}  Score: {:.4}", hit.id, hit.score)?;
            writeln!(output, "  Text: {}", preview(&hit.text, self.config.preview_chars))?;
        }
        Ok(())
    }

    /// Store the demo documents
    pub async fn seed<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let mut stored = 0;
        for (id, text, title) in SEED_DOCUMENTS {
            let metadata = Metadata::from([("title".to_string(), title.to_string())]);
            if self.memory.store_document(id, text, metadata).await {
                stored += 1;
            } else {
                writeln!(output, "Failed to store {}.", id)?;
            }
        }
        info!(stored, "seeded memory");
        writeln!(output, "Seeded memory with {} documents.", stored)?;
        Ok(())
    }

    /// Print every stored record
    pub fn list<W: Write>(&self, output: &mut W) -> Result<()> {
        let records = self.memory.list_documents();
        if records.is_empty() {
            writeln!(output, "No documents found in long-term memory.")?;
            return Ok(());
        }

        writeln!(
            output,
            "{} documents ({} dimensions) in {}",
            records.len(),
            self.memory.dimensions(),
            self.memory.dir().display()
        )?;
        for record in records {
            let meta = record
                .meta
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(output, "- ID: {}  [{}]", record.id, meta)?;
            writeln!(output, "  Text: {}", preview(&record.text, self.config.preview_chars))?;
        }
        Ok(())
    }
}

/// Next line without its terminator, or `None` at end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}
