// Account store: the list of saved storage endpoints and their nicknames.
// The list lives in a flat text file, one `<endpoint>,<nickname>` record per
// line. Commas and backslashes inside a field are escaped with a backslash;
// records without either are written exactly as plain comma-joined lines.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Default file name, relative to the working directory.
pub const DEFAULT_ACCOUNTS_FILE: &str = "azure_storage_info.dat";

const LINE_ENDING: &str = if cfg!(windows) { "\r\n" } else { "\n" };

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read account file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("account file line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("failed to write account file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A saved storage endpoint with the label shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub endpoint: String,
    pub nickname: String,
}

impl StoredAccount {
    pub fn new(endpoint: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            nickname: nickname.into(),
        }
    }
}

/// Ordered list of saved accounts. Position + 1 is the number shown in menus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRegistry {
    accounts: Vec<StoredAccount>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Look up an account by its 1-based menu number.
    pub fn get(&self, number: usize) -> Option<&StoredAccount> {
        number.checked_sub(1).and_then(|i| self.accounts.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredAccount> {
        self.accounts.iter()
    }
}

impl From<Vec<StoredAccount>> for AccountRegistry {
    fn from(accounts: Vec<StoredAccount>) -> Self {
        Self { accounts }
    }
}

/// Reads and writes the registry file.
#[derive(Debug, Clone)]
pub struct AccountStore {
    file_path: PathBuf,
}

impl AccountStore {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Load the registry. A missing file is an empty registry.
    pub fn load(&self) -> Result<AccountRegistry, StoreError> {
        if !self.file_path.exists() {
            debug!(path = %self.file_path.display(), "no account file, starting empty");
            return Ok(AccountRegistry::new());
        }

        let data = fs::read_to_string(&self.file_path).map_err(|source| StoreError::Read {
            path: self.file_path.clone(),
            source,
        })?;
        let registry = deserialize(&data)?;
        debug!(
            path = %self.file_path.display(),
            accounts = registry.len(),
            "loaded account file"
        );
        Ok(registry)
    }

    /// Add `account` to the registry and rewrite the whole file.
    ///
    /// If the file cannot be written the account is taken back out of the
    /// registry, so the in-memory list always matches what is on disk.
    pub fn append(
        &self,
        registry: &mut AccountRegistry,
        account: StoredAccount,
    ) -> Result<(), StoreError> {
        registry.accounts.push(account);
        if let Err(e) = self.save(registry) {
            registry.accounts.pop();
            return Err(e);
        }
        Ok(())
    }

    fn save(&self, registry: &AccountRegistry) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.file_path.clone(),
            source,
        };

        // Write next to the target and rename over it, so a failure part way
        // through never leaves a truncated account file.
        let tmp_path = tmp_path_for(&self.file_path);
        let result = (|| {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(serialize(registry).as_bytes())?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.file_path)
        })();

        if let Err(source) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(source));
        }

        debug!(
            path = %self.file_path.display(),
            accounts = registry.len(),
            "saved account file"
        );
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Encode the registry as file contents.
pub fn serialize(registry: &AccountRegistry) -> String {
    let mut out = String::new();
    for account in registry.iter() {
        out.push_str(&escape_field(&account.endpoint));
        out.push(',');
        out.push_str(&escape_field(&account.nickname));
        out.push_str(LINE_ENDING);
    }
    out
}

/// Decode file contents. Blank lines are ignored.
pub fn deserialize(data: &str) -> Result<AccountRegistry, StoreError> {
    let mut accounts = Vec::new();
    for (idx, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        accounts.push(parse_line(line).ok_or_else(|| StoreError::Parse {
            line: idx + 1,
            reason: "expected `<endpoint>,<nickname>`".into(),
        })?);
    }
    Ok(AccountRegistry::from(accounts))
}

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == '\\' || c == ',' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split at the first unescaped comma. Everything after it is the nickname,
/// including any further unescaped commas. Only `\,` and `\\` are escapes;
/// any other backslash is kept as written, as in files saved without escaping.
fn parse_line(line: &str) -> Option<StoredAccount> {
    let mut endpoint = String::new();
    let mut nickname = String::new();
    let mut in_nickname = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        let current = if in_nickname { &mut nickname } else { &mut endpoint };
        match c {
            '\\' => match chars.next_if(|next| *next == ',' || *next == '\\') {
                Some(escaped) => current.push(escaped),
                None => current.push(c),
            },
            ',' if !in_nickname => in_nickname = true,
            _ => current.push(c),
        }
    }

    in_nickname.then(|| StoredAccount { endpoint, nickname })
}
