use serde_json::Value;
use std::io::{self, Read};

/// Piped JSON payload for the input-driven commands (`optimize`, `risk`,
/// `stress-test`, `simulate`, `simulate-paths`, `forecast`). `None` when
/// stdin is a terminal or the pipe is empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let payload = buffer.trim();
    if payload.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| format!("stdin is not a JSON payload: {}", e).into())
}
