use std::fs;
use std::path::Path;

use upkeep_core::config::{AppConfig, LoadOptions};
use upkeep_core::{ServiceAgreement, WizardState};

use crate::commands::CommandResult;

const DEFAULT_CURRENCY: &str = "AUD";

/// Prices a saved form state. With `agreement_path` the state is first bound
/// to that agreement, so its sites and prices replace whatever the state
/// file carries.
pub fn run(
    state_path: &Path,
    agreement_path: Option<&Path>,
    currency: Option<&str>,
) -> CommandResult {
    let mut state: WizardState = match read_json(state_path) {
        Ok(state) => state,
        Err(failure) => return failure,
    };

    if let Some(agreement_path) = agreement_path {
        let agreement: ServiceAgreement = match read_json(agreement_path) {
            Ok(agreement) => agreement,
            Err(failure) => return failure,
        };
        state.bind_to(&agreement);
    } else {
        state.restrict_selections_to_catalog();
        state.normalize();
    }

    let currency = currency.map(str::to_string).unwrap_or_else(configured_currency);
    let summary = state.summary(&currency);

    match serde_json::to_string_pretty(&summary) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("price", "serialization", error.to_string(), 4),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CommandResult> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            "price",
            "input_read",
            format!("failed to read `{}`: {error}", path.display()),
            2,
        )
    })?;

    serde_json::from_str(&raw).map_err(|error| {
        CommandResult::failure(
            "price",
            "input_parse",
            format!("`{}` is not valid JSON for this input: {error}", path.display()),
            3,
        )
    })
}

fn configured_currency() -> String {
    AppConfig::load(LoadOptions::default())
        .map(|config| config.agreement.currency)
        .unwrap_or_else(|_| DEFAULT_CURRENCY.to_string())
}
