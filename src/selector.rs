// Account selection: decides which saved endpoint an operation runs against.

use anyhow::{Context, Result};

use crate::console::Console;
use crate::store::{AccountRegistry, AccountStore, StoredAccount};

/// Resolve the endpoint for the current operation.
///
/// - no saved accounts: ask for one, save it and use it;
/// - one saved account: use it without asking;
/// - several: list them and ask until a valid number is entered.
///
/// Bad input is never an error here; it only re-prompts. Errors are limited
/// to a failed save and closed input.
pub fn resolve<C: Console + ?Sized>(
    console: &mut C,
    store: &AccountStore,
    registry: &mut AccountRegistry,
) -> Result<String> {
    if registry.is_empty() {
        console.say("No storage account saved yet. Please add one.");
        return add_account(console, store, registry).map(|account| account.endpoint);
    }

    if let (1, Some(only)) = (registry.len(), registry.get(1)) {
        console.say(&format!(
            "Using the only storage account available: {}",
            only.nickname
        ));
        return Ok(only.endpoint.clone());
    }

    console.say("Choose one of the available storage accounts:");
    for (i, account) in registry.iter().enumerate() {
        console.say(&format!("{} - {}", i + 1, account.nickname));
    }

    loop {
        let input = console.read_line("Choice")?;
        if let Some(account) = input.trim().parse::<usize>().ok().and_then(|n| registry.get(n)) {
            return Ok(account.endpoint.clone());
        }
    }
}

/// Ask for a new endpoint and nickname, then append them to the registry
/// and save the file. A blank endpoint is asked for again.
pub fn add_account<C: Console + ?Sized>(
    console: &mut C,
    store: &AccountStore,
    registry: &mut AccountRegistry,
) -> Result<StoredAccount> {
    let endpoint = loop {
        let line = console.read_line("Storage account connection string or URL")?;
        let line = line.trim();
        if !line.is_empty() {
            break line.to_string();
        }
    };
    let nickname = console.read_line("Nickname for this account")?.trim().to_string();

    let account = StoredAccount::new(endpoint, nickname);
    store
        .append(registry, account.clone())
        .context("could not save the new storage account")?;
    console.say(&format!("Saved storage account '{}'.", account.nickname));
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{InputClosed, ScriptedConsole};

    fn registry_of(n: usize) -> AccountRegistry {
        AccountRegistry::from(
            (1..=n)
                .map(|i| StoredAccount::new(format!("endpoint-{i}"), format!("account {i}")))
                .collect::<Vec<_>>(),
        )
    }

    fn scratch_store() -> (tempfile::TempDir, AccountStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::new(dir.path().join("accounts.dat"));
        (dir, store)
    }

    #[test]
    fn single_account_is_used_without_reading_input() {
        let (_dir, store) = scratch_store();
        let mut registry = registry_of(1);
        let mut console = ScriptedConsole::new(["should stay unread"]);

        let endpoint = resolve(&mut console, &store, &mut registry).unwrap();

        assert_eq!(endpoint, "endpoint-1");
        assert_eq!(console.remaining(), 1);
    }

    #[test]
    fn invalid_choices_are_rejected_until_in_range() {
        let (_dir, store) = scratch_store();
        let k = 3;
        let mut registry = registry_of(k);
        let too_big = (k + 1).to_string();
        let mut console = ScriptedConsole::new(["0", too_big.as_str(), "abc", "2"]);

        let endpoint = resolve(&mut console, &store, &mut registry).unwrap();

        assert_eq!(endpoint, "endpoint-2");
        assert_eq!(console.remaining(), 0);
        assert!(console.transcript().iter().any(|l| l == "3 - account 3"));
    }

    #[test]
    fn empty_registry_prompts_and_persists() {
        let (_dir, store) = scratch_store();
        let mut registry = AccountRegistry::new();
        let mut console = ScriptedConsole::new(["", "  UseDevelopmentStorage=true ", "local"]);

        let endpoint = resolve(&mut console, &store, &mut registry).unwrap();

        assert_eq!(endpoint, "UseDevelopmentStorage=true");
        assert_eq!(registry.len(), 1);
        assert_eq!(store.load().unwrap(), registry);
    }

    #[test]
    fn closed_input_while_choosing_is_reported() {
        let (_dir, store) = scratch_store();
        let mut registry = registry_of(2);
        let mut console = ScriptedConsole::new(["nope"]);

        let err = resolve(&mut console, &store, &mut registry).unwrap_err();
        assert!(err.is::<InputClosed>());
    }
}
