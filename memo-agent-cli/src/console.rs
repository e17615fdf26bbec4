//! Line-oriented chat loop.

use futures::FutureExt;
use futures::future::BoxFuture;
use memo_agent_core::{Agent, Conversation, ModelProvider};
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

const EXIT_TOKENS: [&str; 4] = ["quit", "exit", "q", "종료"];
const BACKEND_HINT: &str =
    "Make sure the memo backend is running (MEMO_API_URL, default http://localhost:8000).";

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves when the user asks to stop the current turn.
pub type Interrupt = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Case-insensitive match against the exit words.
pub fn is_exit_token(input: &str) -> bool {
    let input = input.trim();
    EXIT_TOKENS
        .iter()
        .any(|token| input.eq_ignore_ascii_case(token))
}

pub struct Console<R, W> {
    input: R,
    output: W,
    interrupt: Interrupt,
}

impl Console<BufReader<io::Stdin>, io::Stdout> {
    /// Console on the process stdin/stdout; Ctrl-C is the interrupt.
    pub fn stdio() -> Self {
        Self::new(
            BufReader::new(io::stdin()),
            io::stdout(),
            Box::new(|| {
                async {
                    let _ = tokio::signal::ctrl_c().await;
                }
                .boxed()
            }),
        )
    }
}

enum LoopControl {
    Continue,
    Exit,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W, interrupt: Interrupt) -> Self {
        Self {
            input,
            output,
            interrupt,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn run<P: ModelProvider>(&mut self, agent: &Agent<P>) -> Result<(), ConsoleError> {
        self.print_banner().await?;
        let mut conversation = Conversation::new();

        loop {
            self.write("You: ").await?;
            let line = tokio::select! {
                line = read_line(&mut self.input) => line?,
                _ = (self.interrupt)() => {
                    self.write_line("\n\nGoodbye!").await?;
                    break;
                }
            };
            let Some(line) = line else {
                self.write_line("\nInput closed. Goodbye!").await?;
                break;
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if is_exit_token(input) {
                self.write_line("\nGoodbye!").await?;
                break;
            }

            if let LoopControl::Exit = self.handle_prompt(agent, &mut conversation, input).await? {
                break;
            }
        }

        self.output.flush().await?;
        Ok(())
    }

    async fn handle_prompt<P: ModelProvider>(
        &mut self,
        agent: &Agent<P>,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<LoopControl, ConsoleError> {
        info!("Processing console request");
        self.write_line("\nWorking...").await?;
        match agent
            .run_until(conversation, input, (self.interrupt)())
            .await
        {
            Ok(outcome) => {
                self.write_line(&format!("\nBot: {}\n", outcome.answer.content))
                    .await?;
                *conversation = outcome.conversation;
            }
            Err(err) => {
                warn!(error = %err, "Turn failed");
                self.write_line(&format!("\nError: {}", err.user_message()))
                    .await?;
                self.write_line(&format!("{BACKEND_HINT}\n")).await?;
                *conversation = err.conversation;
            }
        }
        Ok(LoopControl::Continue)
    }

    async fn print_banner(&mut self) -> Result<(), ConsoleError> {
        let rule = "=".repeat(60);
        self.write_line(&rule).await?;
        self.write_line("Memo assistant").await?;
        self.write_line(&rule).await?;
        self.write_line("\nI can create, list, read, update and delete memos for you.")
            .await?;
        self.write_line("Try: 'create a memo titled groceries'").await?;
        self.write_line("     'show all memos'").await?;
        self.write_line("     'delete memo 1'").await?;
        self.write_line("\nType 'quit', 'exit', 'q' or '종료' to leave.\n")
            .await?;
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn write_line(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let read = input.read_line(&mut line).await?;
    Ok((read > 0).then_some(line))
}
