//! `target` and `target-blob`.

use tracing::debug;

use crate::config::{BlobTarget, Config};
use crate::error::ExitStatus;
use crate::target_verifier::{TargetVerifier, Verification};
use crate::terminal::Ui;

/// Bucket used when the user accepts the default.
pub const DEFAULT_BUCKET_NAME: &str = "condenser-bucket";

/// Message for an unreachable receptor, followed by the cause.
pub const UNREACHABLE_TARGET: &str = "Error connecting to the receptor. Make sure your lattice target is set, and that lattice is up and running.";

/// Reads and changes the persisted targets.
pub struct ConfigCommand<'a, V> {
    config: &'a mut Config,
    verifier: V,
}

impl<V> std::fmt::Debug for ConfigCommand<'_, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigCommand")
            .field("target", &self.config.target())
            .finish_non_exhaustive()
    }
}

impl<'a, V: TargetVerifier> ConfigCommand<'a, V> {
    /// Creates the command over `config`.
    pub const fn new(config: &'a mut Config, verifier: V) -> Self {
        Self { config, verifier }
    }

    /// `target [TARGET]`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting an unreachable or
    /// unauthorized target, or a config that cannot be saved.
    pub async fn target(&mut self, ui: &mut dyn Ui, target: Option<&str>) -> Result<(), ExitStatus> {
        let Some(target) = target else {
            self.print_target(ui);
            return Ok(());
        };

        self.config.set_target(target);
        self.config.set_login("", "");

        let verification = self.verifier.verify_target(&self.config.receptor()).await;
        match verification {
            Verification {
                reachable: true,
                authorized: true,
                ..
            } => self.save(ui),
            Verification {
                reachable: true,
                authorized: false,
                error: None,
            } => self.login(ui).await,
            Verification { error, .. } => {
                let cause = error.map(|e| e.to_string()).unwrap_or_default();
                ui.say_line(&format!("{UNREACHABLE_TARGET}  Underlying error: {cause}"));
                Err(ExitStatus::BadTarget)
            }
        }
    }

    fn print_target(&self, ui: &mut dyn Ui) {
        if self.config.target().is_empty() {
            ui.say_line("Target not set.");
            return;
        }
        ui.say_line(&format!("Target:\t\t{}", self.config.target()));
        if !self.config.username().is_empty() {
            ui.say_line(&format!("Username:\t{}", self.config.username()));
        }
    }

    async fn login(&mut self, ui: &mut dyn Ui) -> Result<(), ExitStatus> {
        let username = ui.prompt("Username: ").map_err(|e| {
            debug!(error = %e, "failed to read username");
            ExitStatus::BadTarget
        })?;
        let password = ui.prompt_for_password("Password: ").map_err(|e| {
            debug!(error = %e, "failed to read password");
            ExitStatus::BadTarget
        })?;
        self.config.set_login(username, password);

        let verification = self.verifier.verify_target(&self.config.receptor()).await;
        if verification.authorized {
            self.save(ui)
        } else {
            ui.say_line("Could not authorize target.");
            Err(ExitStatus::BadTarget)
        }
    }

    fn save(&self, ui: &mut dyn Ui) -> Result<(), ExitStatus> {
        match self.config.save() {
            Ok(()) => {
                ui.say_line("Api Location Set");
                Ok(())
            }
            Err(e) => {
                ui.say_line(&format!("Error saving config: {e}"));
                Err(ExitStatus::FileSystemError)
            }
        }
    }

    /// `target-blob [HOST:PORT]`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting a malformed target or a
    /// config that cannot be saved.
    pub fn target_blob(&mut self, ui: &mut dyn Ui, target: Option<&str>) -> Result<(), ExitStatus> {
        let Some(target) = target else {
            match self.config.blob_target() {
                None => ui.say_line("Blob store not set"),
                Some(blob) => {
                    ui.say_line(&format!("Blob Target:\t{}:{}", blob.target_host, blob.target_port));
                    ui.say_line(&format!("Access Key:\t{}", blob.access_key));
                    ui.say_line(&format!("Bucket Name:\t{}", blob.bucket_name));
                }
            }
            return Ok(());
        };

        let Some((host, port)) = target.split_once(':').filter(|(h, p)| !h.is_empty() && !p.contains(':'))
        else {
            ui.say_line("Error setting blob target: malformed target");
            return Err(ExitStatus::InvalidSyntax);
        };
        let Ok(port) = port.parse::<u16>() else {
            ui.say_line("Error setting blob target: malformed port");
            return Err(ExitStatus::InvalidSyntax);
        };

        let access_key = prompt(ui, "Access Key: ")?;
        let secret_key = prompt(ui, "Secret Key: ")?;
        let mut bucket_name = prompt(ui, &format!("Bucket Name [{DEFAULT_BUCKET_NAME}]: "))?;
        if bucket_name.is_empty() {
            bucket_name = DEFAULT_BUCKET_NAME.to_string();
        }

        self.config.set_blob_target(BlobTarget {
            target_host: host.to_string(),
            target_port: port,
            access_key,
            secret_key,
            bucket_name,
        });
        if let Err(e) = self.config.save() {
            ui.say_line(&format!("Error setting blob target: {e}"));
            return Err(ExitStatus::FileSystemError);
        }
        ui.say_line("Blob Location Set");
        Ok(())
    }
}

fn prompt(ui: &mut dyn Ui, text: &str) -> Result<String, ExitStatus> {
    ui.prompt(text).map_err(|e| {
        debug!(error = %e, "failed to read blob credentials");
        ExitStatus::InvalidSyntax
    })
}
