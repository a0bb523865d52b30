pub mod config;
pub mod file;
pub mod prices;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Read a typed payload from `--input <file.json>`, falling back to piped
/// stdin. `what` names the command in the error when neither is present.
pub fn read_payload<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_json(path)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <file.json> or stdin required for {}", what).into())
    }
}
