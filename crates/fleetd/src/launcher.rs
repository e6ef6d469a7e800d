//! Process launcher: runs each game server as a child process.
//!
//! Every server gets its own working directory under `work_dir`. On
//! reclaim the directory is moved to the backup location or deleted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use fleet_core::ServerKind;
use fleetgrid_scheduler::{LaunchSpec, Launcher, Reclaim};
use fleetgrid_state::InstanceId;

/// `[launcher]` section of `fleet.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Parent of every server's working directory.
    pub work_dir: PathBuf,
    /// Command per kind. Placeholders: `{id}`, `{kind}`, `{address}`,
    /// `{port}`, `{ram_mb}`, `{max_players}`.
    pub commands: HashMap<ServerKind, Vec<String>>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/var/lib/fleetgrid/servers"),
            commands: HashMap::new(),
        }
    }
}

impl LauncherConfig {
    fn command_for(&self, kind: ServerKind) -> Vec<String> {
        self.commands.get(&kind).cloned().unwrap_or_else(|| {
            [
                "java",
                "-Xmx{ram_mb}M",
                "-jar",
                "server.jar",
                "--port",
                "{port}",
                "--max-players",
                "{max_players}",
            ]
            .into_iter()
            .map(String::from)
            .collect()
        })
    }
}

/// Substitute launch parameters into a command template.
pub fn render_command(template: &[String], spec: &LaunchSpec) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{id}", &spec.id)
                .replace("{kind}", spec.kind.label())
                .replace("{address}", &spec.address)
                .replace("{port}", &spec.port.to_string())
                .replace("{ram_mb}", &spec.ram_mb.to_string())
                .replace("{max_players}", &spec.max_players.to_string())
        })
        .collect()
}

pub struct ProcessLauncher {
    config: LauncherConfig,
    children: DashMap<InstanceId, Child>,
}

impl ProcessLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            children: DashMap::new(),
        }
    }

    fn server_dir(&self, id: &str) -> PathBuf {
        self.config.work_dir.join(id)
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> anyhow::Result<()> {
        let dir = self.server_dir(&spec.id);
        tokio::fs::create_dir_all(&dir).await?;

        let argv = render_command(&self.config.command_for(spec.kind), spec);
        let Some((program, args)) = argv.split_first() else {
            anyhow::bail!("empty command for {}", spec.kind);
        };

        let child = Command::new(program)
            .args(args)
            .current_dir(&dir)
            .env("FLEET_INSTANCE", &spec.id)
            .env("FLEET_KIND", spec.kind.label())
            .env("FLEET_PORT", spec.port.to_string())
            .stdin(Stdio::null())
            .spawn()?;

        info!(instance = %spec.id, pid = child.id(), program = %program, "server process spawned");
        self.children.insert(spec.id.clone(), child);
        Ok(())
    }

    async fn is_alive(&self, id: &InstanceId) -> bool {
        match self.children.get_mut(id) {
            Some(mut child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    async fn terminate(&self, id: &InstanceId) -> anyhow::Result<()> {
        let Some((_, mut child)) = self.children.remove(id) else {
            debug!(instance = %id, "no process to terminate");
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.kill().await?;
        info!(instance = %id, "server process killed");
        Ok(())
    }

    async fn reclaim(&self, id: &InstanceId, disposition: &Reclaim) -> anyhow::Result<()> {
        // A process that exited on its own is still tracked.
        self.children.remove(id);

        let dir = self.server_dir(id);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(());
        }
        match disposition {
            Reclaim::Delete => {
                tokio::fs::remove_dir_all(&dir).await?;
                debug!(instance = %id, "working directory deleted");
            }
            Reclaim::Backup(backup_dir) => {
                let target = backup_target(backup_dir, id);
                tokio::fs::create_dir_all(backup_dir).await?;
                if let Err(e) = tokio::fs::rename(&dir, &target).await {
                    warn!(instance = %id, error = %e, "rename failed, leaving working directory");
                    return Err(e.into());
                }
                info!(instance = %id, target = %target.display(), "working directory backed up");
            }
        }
        Ok(())
    }
}

fn backup_target(backup_dir: &Path, id: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    backup_dir.join(format!("{id}-{stamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, kind: ServerKind) -> LaunchSpec {
        LaunchSpec {
            id: id.to_string(),
            kind,
            address: "127.0.0.1".to_string(),
            port: 30001,
            ram_mb: 768,
            max_players: 12,
            persistent: false,
        }
    }

    #[test]
    fn template_placeholders_are_filled() {
        let template: Vec<String> = ["run-{kind}", "--name={id}", "{address}:{port}", "-m{ram_mb}"]
            .into_iter()
            .map(String::from)
            .collect();
        let argv = render_command(&template, &spec("SW-01", ServerKind::SkyWars));
        assert_eq!(
            argv,
            vec!["run-skywars", "--name=SW-01", "127.0.0.1:30001", "-m768"]
        );
    }

    #[test]
    fn default_command_is_used_for_unconfigured_kind() {
        let config = LauncherConfig::default();
        let argv = render_command(&config.command_for(ServerKind::Lobby), &spec("Lobby-01", ServerKind::Lobby));
        assert_eq!(argv[0], "java");
        assert!(argv.contains(&"-Xmx768M".to_string()));
        assert!(argv.contains(&"12".to_string()));
    }

    #[tokio::test]
    async fn reclaim_deletes_or_backs_up() {
        let work = tempfile::tempdir().unwrap();
        let backups = tempfile::tempdir().unwrap();
        let launcher = ProcessLauncher::new(LauncherConfig {
            work_dir: work.path().to_path_buf(),
            commands: HashMap::new(),
        });

        std::fs::create_dir_all(work.path().join("Lobby-01")).unwrap();
        launcher
            .reclaim(&"Lobby-01".to_string(), &Reclaim::Delete)
            .await
            .unwrap();
        assert!(!work.path().join("Lobby-01").exists());

        std::fs::create_dir_all(work.path().join("Build-01")).unwrap();
        std::fs::write(work.path().join("Build-01/world.dat"), b"blocks").unwrap();
        launcher
            .reclaim(
                &"Build-01".to_string(),
                &Reclaim::Backup(backups.path().to_path_buf()),
            )
            .await
            .unwrap();
        assert!(!work.path().join("Build-01").exists());
        let saved: Vec<_> = std::fs::read_dir(backups.path()).unwrap().collect();
        assert_eq!(saved.len(), 1);

        // Nothing left to reclaim is not an error.
        launcher
            .reclaim(&"Lobby-02".to_string(), &Reclaim::Delete)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_process_is_not_alive() {
        let launcher = ProcessLauncher::new(LauncherConfig::default());
        assert!(!launcher.is_alive(&"Lobby-01".to_string()).await);
        launcher.terminate(&"Lobby-01".to_string()).await.unwrap();
    }
}
