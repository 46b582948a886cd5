use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::telescope::Telescope;

const PROMPT: &[u8] = b"tcs> ";

/// Interactive command prompt on stdin/stdout. Returns on end of input.
pub async fn run(telescope: Arc<Mutex<Telescope>>) -> io::Result<()> {
    let stdin = BufReader::new(io::stdin());
    run_with(telescope, stdin, io::stdout()).await
}

pub async fn run_with<R, W>(
    telescope: Arc<Mutex<Telescope>>,
    reader: R,
    mut writer: W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    writer.write_all(PROMPT).await?;
    writer.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            let result = telescope.lock().await.dispatch(line).await;
            let text = match result {
                Ok(outcome) => outcome.to_string(),
                Err(e) => {
                    log::debug!("Command '{}' failed: {}", line, e);
                    format!("error: {}", e)
                }
            };
            writer.write_all(text.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.write_all(PROMPT).await?;
        writer.flush().await?;
    }
    Ok(())
}
