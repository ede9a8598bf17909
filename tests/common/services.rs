//! Test services instance.
//!
//! Writes a config into a temporary directory and spawns the slservices
//! binary pointed at a fake hub.

use std::process::{Child, Command};
use tempfile::TempDir;

/// A running services process. Killed on drop.
pub struct TestServices {
    child: Child,
    _data_dir: TempDir,
}

impl TestServices {
    /// Spawn services linking to `hub_address`, with `extra` appended to the config.
    pub fn spawn(hub_address: &str, extra: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("services.toml");
        let config_content = format!(
            r#"
[server]
name = "services.test"
numeric = "AS"
description = "Test Services"
metrics_port = 0

[uplink]
address = "{}"
password = "linkpass"

[database]
path = "{}"

{}
"#,
            hub_address,
            data_dir.path().join("services.db").display(),
            extra
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_slservices"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        Ok(Self {
            child,
            _data_dir: data_dir,
        })
    }

    /// `Some(success)` once the process has exited.
    pub fn exited(&mut self) -> anyhow::Result<Option<bool>> {
        Ok(self.child.try_wait()?.map(|status| status.success()))
    }
}

impl Drop for TestServices {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
