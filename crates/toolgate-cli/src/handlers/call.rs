//! Call command handler.
//!
//! Opens a one-shot session, stores the credentials given on the command
//! line for the target tool, and routes the call through the gate.

use anyhow::{Context, Result};
use serde_json::Value;
use toolgate_core::{CredentialMap, ExecError};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Parse `id=value` pairs into a credential map.
pub fn parse_credentials(pairs: &[String]) -> Result<CredentialMap, CliError> {
    pairs
        .iter()
        .map(|pair| {
            let (id, value) = pair.split_once('=').ok_or_else(|| {
                CliError::Arguments(format!("Credential '{pair}' must look like id=value"))
            })?;
            let id = id.trim();
            if id.is_empty() {
                return Err(CliError::Arguments(format!(
                    "Credential '{pair}' has an empty id"
                )));
            }
            Ok((id.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse the `--args` JSON; absent means an empty object.
pub fn parse_arguments(args: Option<&str>) -> Result<Value, CliError> {
    match args {
        None => Ok(Value::Object(serde_json::Map::new())),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| CliError::Arguments(format!("--args is not valid JSON: {e}"))),
    }
}

/// Execute the call command.
pub async fn execute(
    ctx: &CliContext,
    tool: &str,
    args: Option<&str>,
    credentials: &[String],
) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let credentials = parse_credentials(credentials)?;

    let capability = ctx
        .orchestrator()
        .registry()
        .lookup(tool)
        .await
        .ok_or_else(|| CliError::from(ExecError::NotFound(tool.to_string())))?;

    let session = ctx.sessions().create().await;
    if !credentials.is_empty() {
        ctx.sessions()
            .set_credentials(&session, &capability.name, &capability.server_id, &credentials)
            .await
            .context("Failed to store credentials")?;
    }

    let result = ctx
        .orchestrator()
        .execute_gated(&session, tool, arguments)
        .await;
    ctx.sessions().remove(&session).await;

    let result = result.map_err(CliError::from)?;
    println!("{}", result.to_model_text());
    if result.is_error {
        return Err(CliError::Exec(format!("Tool '{tool}' reported an error")).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_credentials() {
        let map = parse_credentials(&["db_token=a=b".to_string(), " region =eu".to_string()])
            .unwrap();
        assert_eq!(map.get("db_token").map(String::as_str), Some("a=b"));
        assert_eq!(map.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn test_parse_credentials_rejects_bad_pairs() {
        assert!(matches!(
            parse_credentials(&["novalue".to_string()]),
            Err(CliError::Arguments(_))
        ));
        assert!(matches!(
            parse_credentials(&["=x".to_string()]),
            Err(CliError::Arguments(_))
        ));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(None).unwrap(), json!({}));
        assert_eq!(parse_arguments(Some(r#"{"q":1}"#)).unwrap(), json!({"q": 1}));
        assert!(parse_arguments(Some("{")).is_err());
    }
}
