use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dcos_common::archive::{extract_zip, is_zip, set_mode};
use dcos_common::checksum::verify_sha256;
use reqwest::StatusCode;
use reqwest::header::CONTENT_DISPOSITION;

use super::manifest::{COMMAND_PREFIX, MANIFEST_FILE, Plugin, find_commands};
use crate::command_runner::{CommandRunner, exit_code};
use crate::error::{HttpError, PluginError};
use crate::httpclient::{HttpClient, HttpOptions, error_from_response};
use crate::output::Output;

/// Mode given to single-binary plugins.
const BINARY_MODE: u32 = 0o751;

/// Options for [`PluginManager::install`].
#[derive(Debug, Clone, Default)]
pub struct InstallOpts {
    /// Plugin name, used when the package carries no manifest name.
    pub name: Option<String>,
    /// Replace an existing installation of the same name.
    pub update: bool,
    /// Expected sha256 of a downloaded resource, hex encoded.
    pub checksum: Option<String>,
    /// Transport settings for http(s) resources. Defaults to system trust
    /// and no credentials.
    pub http: Option<HttpOptions>,
}

/// Discovers, installs and removes the plugins of one cluster.
///
/// Plugins live in `<cluster dir>/subcommands/<name>/env`. Nothing is
/// cached: every listing re-scans the disk.
#[derive(Clone)]
pub struct PluginManager {
    cluster_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("cluster_dir", &self.cluster_dir)
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    pub fn new(cluster_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cluster_dir: cluster_dir.into(),
            runner,
        }
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.cluster_dir.join("subcommands")
    }

    /// Scratch space on the same filesystem as the plugins directory, so
    /// staged installs can be renamed into place.
    fn tmp_dir(&self) -> PathBuf {
        self.cluster_dir.join("tmp")
    }

    /// Every loadable plugin, sorted by directory name.
    ///
    /// A malformed plugin is logged and skipped.
    pub fn plugins(&self) -> Vec<Plugin> {
        let entries = match fs::read_dir(self.plugins_dir()) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("couldn't open plugin dir: {err}");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| match self.load_plugin(&name) {
                Ok(plugin) => Some(plugin),
                Err(err) => {
                    tracing::debug!("couldn't load plugin '{name}': {err}");
                    None
                }
            })
            .collect()
    }

    /// Load a single plugin by name.
    pub fn plugin(&self, name: &str) -> Result<Plugin, PluginError> {
        if !is_plugin_name(name) || !self.plugins_dir().join(name).is_dir() {
            return Err(PluginError::Unknown(name.to_string()));
        }
        self.load_plugin(name)
    }

    fn load_plugin(&self, name: &str) -> Result<Plugin, PluginError> {
        tracing::info!("loading plugin '{name}'");

        let env_dir = self.plugins_dir().join(name).join("env");
        let manifest_path = env_dir.join(MANIFEST_FILE);

        let mut plugin = Plugin::load(&manifest_path)?;
        if plugin.name.is_empty() {
            plugin.name = name.to_string();
        }
        plugin.dir = env_dir.clone();
        let persisted = plugin.clone();

        if plugin.executables.is_empty() {
            plugin.executables = find_commands(&env_dir, cfg!(windows));
        }

        for exe in &mut plugin.executables {
            exe.filename = exe.path(&env_dir);
            for cmd in &mut exe.commands {
                if cmd.description.is_empty() {
                    cmd.description = self.command_description(&exe.filename, &cmd.name);
                }
            }
        }

        if plugin != persisted {
            if let Err(err) = plugin.save(&manifest_path, &self.tmp_dir()) {
                tracing::debug!("couldn't update {}: {err}", manifest_path.display());
            }
        }
        Ok(plugin)
    }

    /// Ask a command for its summary with `<exe> <command> --info`.
    fn command_description(&self, exe: &Path, command: &str) -> String {
        let program = exe.to_string_lossy();
        match self.runner.capture(&program, &[command, "--info"]) {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Ok(output) => {
                tracing::debug!(
                    "couldn't get info summary for the '{command}' command: {}",
                    output.status
                );
                String::new()
            }
            Err(err) => {
                tracing::debug!("couldn't get info summary for the '{command}' command: {err:#}");
                String::new()
            }
        }
    }

    /// Install a plugin from a local path or an http(s) URL.
    ///
    /// The package is staged under the cluster's `tmp` directory and renamed
    /// into place, so a concurrent install of the same plugin surfaces as
    /// [`PluginError::AlreadyInstalled`].
    pub fn install(&self, resource: &str, opts: &InstallOpts) -> Result<Plugin, PluginError> {
        tracing::info!("installing plugin from {resource}");
        if let Some(name) = opts.name.as_deref().filter(|n| !n.is_empty()) {
            if !is_plugin_name(name) {
                return Err(PluginError::InvalidName(name.to_string()));
            }
        }
        fs::create_dir_all(self.tmp_dir())?;

        let (data, basename) = if resource.starts_with("https://") || resource.starts_with("http://")
        {
            self.download(resource, opts)?
        } else {
            let path = Path::new(resource);
            let basename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (fs::read(path)?, basename)
        };

        let staging = tempfile::Builder::new()
            .prefix("dcos-cli")
            .tempdir_in(self.tmp_dir())?;
        let env_dir = staging.path().join("env");

        let mut name = opts.name.clone().filter(|n| !n.is_empty());
        if is_zip(&data) {
            extract_zip(&data, &env_dir)?;
            let manifest = Plugin::load(&env_dir.join(MANIFEST_FILE))?;
            if !manifest.name.is_empty() {
                name = Some(manifest.name);
            }
        } else {
            // Anything that isn't a zip archive is taken as a bare executable.
            let bin_dir = env_dir.join("bin");
            fs::create_dir_all(&bin_dir)?;
            let filename = match &name {
                Some(name) => format!("{COMMAND_PREFIX}{name}"),
                None => basename.clone(),
            };
            if filename.is_empty() {
                return Err(PluginError::InvalidResource(resource.to_string()));
            }
            let bin_path = bin_dir.join(filename);
            fs::write(&bin_path, &data)?;
            set_mode(&bin_path, BINARY_MODE)?;
        }

        let name = match name {
            Some(name) => name,
            None => Path::new(&basename)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| PluginError::InvalidResource(resource.to_string()))?,
        };
        if !is_plugin_name(&name) {
            return Err(PluginError::InvalidName(name));
        }

        if !env_dir.join(MANIFEST_FILE).exists() && find_commands(&env_dir, cfg!(windows)).is_empty()
        {
            return Err(PluginError::NoCommands(name));
        }

        let plugins_dir = self.plugins_dir();
        fs::create_dir_all(&plugins_dir)?;
        let dest = plugins_dir.join(&name);
        if opts.update {
            match fs::remove_dir_all(&dest) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            }
        } else if dest.exists() {
            return Err(PluginError::AlreadyInstalled(name));
        }

        if let Err(err) = fs::rename(staging.path(), &dest) {
            if dest.exists() {
                return Err(PluginError::AlreadyInstalled(name));
            }
            return Err(err.into());
        }

        self.load_plugin(&name)
    }

    /// Download a resource, returning its bytes and file name.
    fn download(&self, url: &str, opts: &InstallOpts) -> Result<(Vec<u8>, String), PluginError> {
        let options = opts.http.clone().unwrap_or_else(|| HttpOptions::new(url));
        let client = HttpClient::new(options)?;

        let progress = Output::download(url);
        let resp = match client.get(url) {
            Ok(resp) => resp,
            Err(err) => {
                progress.failed();
                return Err(err.into());
            }
        };
        if resp.status() != StatusCode::OK {
            progress.failed();
            return Err(error_from_response(resp).into());
        }

        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .or_else(|| {
                resp.url()
                    .path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .unwrap_or_default();

        let data = resp
            .bytes()
            .map_err(|source| {
                PluginError::Http(HttpError::Decode {
                    url: url.to_string(),
                    source,
                })
            })?
            .to_vec();
        progress.done();

        if let Some(expected) = &opts.checksum {
            tracing::debug!("verifying checksum for {url}");
            verify_sha256(&data, expected)?;
        }
        Ok((data, filename))
    }

    /// Delete an installed plugin.
    pub fn remove(&self, name: &str) -> Result<(), PluginError> {
        let dir = self.plugins_dir().join(name);
        if !is_plugin_name(name) || !dir.is_dir() {
            return Err(PluginError::NotAPluginDir(dir.display().to_string()));
        }
        fs::remove_dir_all(&dir)?;
        tracing::info!("removed {name} as a plugin from the CLI");
        Ok(())
    }

    /// Run a plugin executable with inherited stdio and return its exit code.
    pub fn invoke(
        &self,
        executable: &Path,
        args: &[String],
        env: Vec<(String, String)>,
    ) -> anyhow::Result<i32> {
        let program = executable.to_string_lossy();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let status = self.runner.exec(&program, &args, &env)?;
        tracing::debug!("{program} exited with {status}");
        Ok(exit_code(status))
    }
}

/// Plugin names become a single directory under `subcommands`.
fn is_plugin_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// The `filename` parameter of a `Content-Disposition` header.
fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        (key.trim().eq_ignore_ascii_case("filename"))
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::{Command, Executable};
    use crate::testing::MockCommandRunner;
    use std::io::Write;
    use zip::write::FileOptions;

    const CORE_MANIFEST: &str = r#"
name = "dcos-core-cli"
version = "1.0"

[[executables]]
filename = "bin/dcos"

[[executables.commands]]
name = "marathon"
description = "Deploy and manage applications"
"#;

    fn manager(dir: &Path, runner: MockCommandRunner) -> PluginManager {
        PluginManager::new(dir, Arc::new(runner))
    }

    fn write_plugin(root: &Path, name: &str, manifest: Option<&str>, bins: &[&str]) {
        let env = root.join("subcommands").join(name).join("env");
        fs::create_dir_all(env.join("bin")).unwrap();
        if let Some(manifest) = manifest {
            fs::write(env.join(MANIFEST_FILE), manifest).unwrap();
        }
        for bin in bins {
            fs::write(env.join("bin").join(bin), "#!/bin/sh\n").unwrap();
        }
    }

    fn zip_package(files: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            for (name, content) in files {
                zip.start_file(*name, FileOptions::default().unix_permissions(0o755))
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn no_plugins_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(manager(dir.path(), MockCommandRunner::default()).plugins().is_empty());
    }

    #[test]
    fn malformed_plugin_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "a-good", Some(CORE_MANIFEST), &[]);
        write_plugin(dir.path(), "b-broken", Some("executables = 12"), &[]);
        write_plugin(dir.path(), "c-legacy", None, &["dcos-kafka"]);

        let runner = MockCommandRunner::default().respond("dcos-kafka", "Manage Kafka\n");
        let plugins = manager(dir.path(), runner).plugins();
        let names: Vec<_> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["dcos-core-cli", "c-legacy"]);
    }

    #[test]
    fn legacy_plugin_is_described_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "kafka", None, &["dcos-kafka"]);

        let runner = Arc::new(MockCommandRunner::default().respond("dcos-kafka", "  Manage Kafka\n"));
        let manager = PluginManager::new(dir.path(), runner.clone());
        let plugin = manager.plugin("kafka").unwrap();

        let env = dir.path().join("subcommands/kafka/env");
        assert_eq!(plugin.dir, env);
        let (exe, cmd) = plugin.commands().next().unwrap();
        assert_eq!(exe.filename, env.join("bin/dcos-kafka"));
        assert_eq!(cmd.description, "Manage Kafka");

        let calls = runner.calls();
        assert_eq!(calls[0].1, ["kafka", "--info"]);

        // The normalized form was written back.
        let saved = Plugin::load(&env.join(MANIFEST_FILE)).unwrap();
        assert_eq!(saved.executables[0].commands[0].description, "Manage Kafka");
        assert!(saved.executables[0].filename.is_absolute());
    }

    #[test]
    fn failing_info_leaves_description_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "kafka", None, &["dcos-kafka"]);

        let plugin = manager(dir.path(), MockCommandRunner::default())
            .plugin("kafka")
            .unwrap();
        assert_eq!(plugin.executables[0].commands[0].description, "");
    }

    #[test]
    fn relative_paths_resolve_against_env_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "core", Some(CORE_MANIFEST), &[]);

        let plugin = manager(dir.path(), MockCommandRunner::default())
            .plugin("core")
            .unwrap();
        assert_eq!(
            plugin.executables[0].filename,
            dir.path().join("subcommands/core/env/bin/dcos")
        );
    }

    #[test]
    fn unknown_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager(dir.path(), MockCommandRunner::default())
            .plugin("nope")
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown plugin nope");
    }

    #[test]
    fn install_zip_uses_manifest_name() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("core.zip");
        fs::write(
            &package,
            zip_package(&[(MANIFEST_FILE, CORE_MANIFEST), ("bin/dcos", "#!/bin/sh\n")]),
        )
        .unwrap();

        let manager = manager(dir.path(), MockCommandRunner::default());
        let plugin = manager
            .install(package.to_str().unwrap(), &InstallOpts::default())
            .unwrap();
        assert_eq!(plugin.name, "dcos-core-cli");
        assert!(dir.path().join("subcommands/dcos-core-cli/env/bin/dcos").is_file());
        assert_eq!(
            fs::read_dir(dir.path().join("tmp")).unwrap().count(),
            0,
            "staging dir is cleaned up"
        );

        let err = manager
            .install(package.to_str().unwrap(), &InstallOpts::default())
            .unwrap_err();
        assert!(matches!(err, PluginError::AlreadyInstalled(name) if name == "dcos-core-cli"));

        let update = InstallOpts {
            update: true,
            ..Default::default()
        };
        manager.install(package.to_str().unwrap(), &update).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn install_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("hello");
        fs::write(&binary, "#!/bin/sh\necho hi\n").unwrap();

        let opts = InstallOpts {
            name: Some("hello".into()),
            ..Default::default()
        };
        let plugin = manager(dir.path(), MockCommandRunner::default())
            .install(binary.to_str().unwrap(), &opts)
            .unwrap();

        let installed = dir.path().join("subcommands/hello/env/bin/dcos-hello");
        assert_eq!(plugin.command_names(), ["hello"]);
        let mode = fs::metadata(&installed).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o751);
    }

    #[test]
    fn install_without_commands_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("empty.zip");
        fs::write(&package, zip_package(&[("README", "nothing here")])).unwrap();

        let err = manager(dir.path(), MockCommandRunner::default())
            .install(package.to_str().unwrap(), &InstallOpts::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "empty has no commands");
        assert!(!dir.path().join("subcommands/empty").exists());
    }

    #[test]
    fn install_downloads_and_checks_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let body = zip_package(&[("bin/dcos-hello", "#!/bin/sh\n")]);
        let digest = dcos_common::checksum::sha256_hex(&body);

        let mut server = mockito::Server::new();
        server
            .mock("GET", "/downloads/hello.zip")
            .with_body(body)
            .create();
        let url = format!("{}/downloads/hello.zip", server.url());

        let manager = manager(dir.path(), MockCommandRunner::default());
        let bad = InstallOpts {
            checksum: Some("00".repeat(32)),
            ..Default::default()
        };
        assert!(matches!(
            manager.install(&url, &bad),
            Err(PluginError::Common(_))
        ));

        let good = InstallOpts {
            checksum: Some(digest),
            ..Default::default()
        };
        let plugin = manager.install(&url, &good).unwrap();
        assert_eq!(plugin.name, "hello");
    }

    #[test]
    fn download_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new();
        server.mock("GET", "/missing.zip").with_status(404).create();

        let err = manager(dir.path(), MockCommandRunner::default())
            .install(&format!("{}/missing.zip", server.url()), &InstallOpts::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::Http(HttpError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn remove_plugin() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "kafka", None, &["dcos-kafka"]);
        let manager = manager(dir.path(), MockCommandRunner::default());

        manager.remove("kafka").unwrap();
        assert!(!dir.path().join("subcommands/kafka").exists());

        let err = manager.remove("kafka").unwrap_err();
        assert!(matches!(err, PluginError::NotAPluginDir(_)));
    }

    #[test]
    fn remove_rejects_names_outside_the_plugins_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "kafka", None, &["dcos-kafka"]);
        fs::write(dir.path().join("dcos.toml"), "[core]\n").unwrap();
        fs::create_dir_all(dir.path().join("subcommands/kafka/env/a")).unwrap();
        let outside = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), MockCommandRunner::default());

        let absolute = outside.path().to_string_lossy().into_owned();
        for name in ["..", "kafka/env", "kafka/../kafka", "", absolute.as_str()] {
            let err = manager.remove(name).unwrap_err();
            assert!(matches!(err, PluginError::NotAPluginDir(_)), "{name}: {err}");
        }
        assert!(dir.path().join("dcos.toml").is_file());
        assert!(dir.path().join("subcommands/kafka/env/a").is_dir());
        assert!(outside.path().is_dir());
    }

    #[test]
    fn install_rejects_names_outside_the_plugins_dir() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("hello");
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        let manager = manager(dir.path(), MockCommandRunner::default());

        for name in ["..", "a/b", "/tmp/evil"] {
            let opts = InstallOpts {
                name: Some(name.into()),
                ..Default::default()
            };
            let err = manager
                .install(binary.to_str().unwrap(), &opts)
                .unwrap_err();
            assert!(matches!(err, PluginError::InvalidName(_)), "{name}: {err}");
        }

        let package = dir.path().join("sneaky.zip");
        let manifest = "name = \"../../escaped\"\n\n[[executables]]\nfilename = \"bin/dcos-x\"\n\n[[executables.commands]]\nname = \"x\"\ndescription = \"x\"\n";
        fs::write(
            &package,
            zip_package(&[(MANIFEST_FILE, manifest), ("bin/dcos-x", "#!/bin/sh\n")]),
        )
        .unwrap();
        let err = manager
            .install(package.to_str().unwrap(), &InstallOpts::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid plugin name '../../escaped'");
        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().parent().unwrap().join("escaped").exists());
        assert!(!dir.path().join("subcommands").exists());
    }

    #[test]
    fn plugin_names_are_single_components() {
        assert!(is_plugin_name("kafka"));
        assert!(is_plugin_name("dcos-core-cli"));
        for name in ["", ".", "..", "a/b", "/abs", "./kafka"] {
            assert!(!is_plugin_name(name), "{name}");
        }
    }

    #[test]
    fn invoke_forwards_args_env_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockCommandRunner {
            exit_code: 3,
            ..Default::default()
        });
        let manager = PluginManager::new(dir.path(), runner.clone());

        let code = manager
            .invoke(
                Path::new("/plugins/bin/dcos-kafka"),
                &["kafka".into(), "topic".into(), "list".into()],
                vec![("DCOS_URL".into(), "https://cluster".into())],
            )
            .unwrap();
        assert_eq!(code, 3);

        let (program, args, env) = runner.calls().remove(0);
        assert_eq!(program, "/plugins/bin/dcos-kafka");
        assert_eq!(args, ["kafka", "topic", "list"]);
        assert_eq!(env, [("DCOS_URL".to_string(), "https://cluster".to_string())]);
    }

    #[test]
    fn content_disposition_filename() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="dcos-core-cli.zip""#).as_deref(),
            Some("dcos-core-cli.zip")
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn manifest_commands_accessor() {
        let plugin = Plugin {
            executables: vec![Executable {
                filename: "bin/dcos".into(),
                commands: vec![
                    Command {
                        name: "a".into(),
                        ..Default::default()
                    },
                    Command {
                        name: "b".into(),
                        ..Default::default()
                    },
                ],
            }],
            ..Default::default()
        };
        assert_eq!(plugin.command_names(), ["a", "b"]);
    }
}
