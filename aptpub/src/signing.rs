//! Release descriptor signing.
//!
//! Signing is an external collaborator behind the [`Signer`] trait; the
//! production implementation drives the `gpg` binary against the archive's
//! secret keyring. The engine requests both an inline (cleartext) and a
//! detached signature for every release descriptor.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PublishError, PublishResult};

/// Requested signature layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Cleartext document with inline signature (InRelease).
    Inline,
    /// Armored detached signature alongside the plaintext (Release.gpg).
    Detached,
}

/// Produces signatures over release descriptors.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign `input` with the given authorized key fingerprints.
    ///
    /// Fails when no usable secret key matches an authorized fingerprint.
    async fn sign(&self, input: &[u8], key_ids: &[String], mode: SignMode)
        -> PublishResult<Vec<u8>>;
}

/// [`Signer`] backed by the `gpg` command-line tool.
pub struct GpgSigner {
    gpg_home: PathBuf,
}

impl GpgSigner {
    /// Create a signer using the given GnuPG home directory.
    pub fn new(gpg_home: PathBuf) -> Self {
        Self { gpg_home }
    }
}

#[async_trait]
impl Signer for GpgSigner {
    async fn sign(
        &self,
        input: &[u8],
        key_ids: &[String],
        mode: SignMode,
    ) -> PublishResult<Vec<u8>> {
        if key_ids.is_empty() {
            return Err(PublishError::Signing(
                "no authorized signing keys configured".to_string(),
            ));
        }
        if !self.gpg_home.is_dir() {
            return Err(PublishError::Configuration(format!(
                "signing keyring directory {} does not exist",
                self.gpg_home.display()
            )));
        }

        let mut cmd = Command::new("gpg");
        cmd.arg("--batch")
            .arg("--yes")
            .arg("--armor")
            .arg("--homedir")
            .arg(&self.gpg_home)
            .arg("--digest-algo")
            .arg("SHA256");
        for key_id in key_ids {
            cmd.arg("--local-user").arg(key_id);
        }
        match mode {
            SignMode::Inline => cmd.arg("--clearsign"),
            SignMode::Detached => cmd.arg("--detach-sign"),
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Running signer: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| PublishError::Signing(format!("cannot run gpg: {}", e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|e| PublishError::Signing(format!("cannot write to gpg: {}", e)))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PublishError::Signing(format!("gpg did not finish: {}", e)))?;

        if !output.status.success() {
            return Err(PublishError::Signing(format!(
                "gpg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}
