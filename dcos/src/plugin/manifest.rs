//! The `plugin.toml` manifest and the legacy `bin/dcos-*` convention.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Manifest file name inside a plugin's `env` directory.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Prefix of executables discovered without a manifest.
pub const COMMAND_PREFIX: &str = "dcos-";

/// An installed plugin package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub executables: Vec<Executable>,

    /// The plugin's `env` directory.
    #[serde(skip)]
    pub dir: PathBuf,
}

/// A binary shipped by a plugin, exposing one or more top-level commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    pub filename: PathBuf,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Flag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shorthand: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl Flag {
    /// Boolean flags take no value.
    pub fn is_switch(&self) -> bool {
        self.kind == "bool"
    }
}

impl Plugin {
    /// Read a manifest. A missing file yields an empty plugin.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no manifest at {}", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&content).map_err(|source| PluginError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the manifest through a temporary file in `tmp_dir`.
    pub fn save(&self, path: &Path, tmp_dir: &Path) -> Result<(), PluginError> {
        fs::create_dir_all(tmp_dir)?;
        let content = toml::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(tmp_dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Iterate over every top-level command with the executable providing it.
    pub fn commands(&self) -> impl Iterator<Item = (&Executable, &Command)> {
        self.executables
            .iter()
            .flat_map(|exe| exe.commands.iter().map(move |cmd| (exe, cmd)))
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.commands().map(|(_, cmd)| cmd.name.as_str()).collect()
    }
}

impl Executable {
    /// Absolute path to the binary, resolved against the plugin directory.
    pub fn path(&self, plugin_dir: &Path) -> PathBuf {
        if self.filename.is_absolute() {
            self.filename.clone()
        } else {
            plugin_dir.join(&self.filename)
        }
    }
}

/// Discover commands by convention: every `dcos-<command>` binary in `bin`
/// (or `Scripts` on Windows) is a command of its own.
pub fn find_commands(plugin_dir: &Path, windows: bool) -> Vec<Executable> {
    let mut bin_dir = plugin_dir.join("bin");
    if windows && !bin_dir.is_dir() {
        bin_dir = plugin_dir.join("Scripts");
    }

    tracing::debug!("discovering commands in '{}'", bin_dir.display());

    let entries = match fs::read_dir(&bin_dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!("{}: {err}", bin_dir.display());
            return Vec::new();
        }
    };

    let mut filenames: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(COMMAND_PREFIX))
        .collect();
    filenames.sort();

    filenames
        .into_iter()
        .map(|filename| {
            let mut name = &filename[COMMAND_PREFIX.len()..];
            if windows {
                name = name.strip_suffix(".exe").unwrap_or(name);
            }
            tracing::debug!("discovered '{name}' command");
            Executable {
                commands: vec![Command {
                    name: name.to_string(),
                    ..Default::default()
                }],
                filename: bin_dir.join(&filename),
            }
        })
        .collect()
}
