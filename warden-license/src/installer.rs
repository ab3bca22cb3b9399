//! Install, upgrade and uninstall.
//!
//! These are the points installer lifecycle hooks call into. Install and
//! upgrade verify the issued document with the issuer's key, then store a
//! copy re-signed with the local installation keypair.

use tracing::{info, warn};
use warden_crypto::SigningKey;
use warden_types::InstanceId;

use crate::container::{find_unlocked, ResourceContainer};
use crate::device::hardware_token;
use crate::document::LicenseDocument;
use crate::environment::LicenseEnvironment;
use crate::error::{LicenseError, LicenseResult};
use crate::identity::{ProductIdentity, UserIdentity};
use crate::manifest::DeploymentManifest;
use crate::resolver::LicenseResolver;
use crate::store::{delete_everywhere, replace_everywhere};
use crate::upgrade::LicenseUpgrader;

/// Where an issued license comes from.
pub enum InstallSource<'a> {
    /// A signed document.
    Document(&'a [u8]),
    /// A container unlocked with a code; `None` uses the default code.
    Container {
        container: &'a dyn ResourceContainer,
        unlock_code: Option<&'a str>,
    },
}

pub struct Installer<'a> {
    env: &'a LicenseEnvironment,
}

impl<'a> Installer<'a> {
    pub fn new(env: &'a LicenseEnvironment) -> Self {
        Self { env }
    }

    /// Writes the deployment manifest read by later installs.
    pub fn deploy_manifest(&self, manifest: &DeploymentManifest) -> LicenseResult<()> {
        self.env.manifest.write(manifest)
    }

    /// Installs an issued license for `user`.
    ///
    /// The issued document is verified and checked against this machine
    /// before anything is written. Then the installation keypair is created
    /// on first use and `manifest` is written. The document is bound to this
    /// machine, its first-use date is set and the product identity is
    /// completed from the manifest.
    pub fn install(
        &self,
        source: InstallSource<'_>,
        manifest: &DeploymentManifest,
        user: UserIdentity,
    ) -> LicenseResult<LicenseDocument> {
        let bytes = match source {
            InstallSource::Document(bytes) => bytes.to_vec(),
            InstallSource::Container {
                container,
                unlock_code,
            } => {
                find_unlocked(
                    container,
                    &manifest.name,
                    unlock_code,
                    &self.env.default_unlock_code,
                )?
                .1
            }
        };

        let mut document = LicenseDocument::open(&bytes, &self.env.issuer_key)?;
        let machine = self.bound_machine(&document)?;

        let key = self.env.key_store.load_or_create()?;
        self.deploy_manifest(manifest)?;

        let mut product = document.product.clone();
        product.merge_from(&manifest.to_product());
        let mut owner = user;
        owner.merge_from(&document.user);

        self.initialize(&mut document, product, owner, machine);
        let stores = self.persist(&document, &key)?;
        info!(
            uid = %document.uid,
            product = %document.product.short_name,
            stores,
            "license installed"
        );
        Ok(document)
    }

    /// Like [`Self::install`], but a failed first installation is rolled
    /// back. When a license was already installed the failure is returned
    /// and the existing installation is left alone. The install error is
    /// returned in both cases.
    pub fn install_or_rollback(
        &self,
        source: InstallSource<'_>,
        manifest: &DeploymentManifest,
        user: UserIdentity,
    ) -> LicenseResult<LicenseDocument> {
        let fresh = !self.is_installed()?;
        match self.install(source, manifest, user) {
            Ok(document) => Ok(document),
            Err(e) if fresh => {
                warn!(error = %e, "installation failed");
                if let Err(rollback) = self.rollback() {
                    warn!(error = %rollback, "rollback after failed installation failed");
                }
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "installation failed, keeping the installed license");
                Err(e)
            }
        }
    }

    /// Whether an installation keypair exists on this machine.
    pub fn is_installed(&self) -> LicenseResult<bool> {
        Ok(self.env.key_store.load()?.is_some())
    }

    /// Installs a new issued license in place of the current one, keeping
    /// the installed product and user identity.
    pub fn install_replacement(&self, bytes: &[u8]) -> LicenseResult<LicenseDocument> {
        let key = self.installed_key()?;
        let installed = self.installed(&key)?;

        let mut document = LicenseDocument::open(bytes, &self.env.issuer_key)?;
        let machine = self.bound_machine(&document)?;
        self.initialize(&mut document, installed.product, installed.user, machine);

        let stores = self.persist(&document, &key)?;
        info!(
            uid = %document.uid,
            replaced = %installed.uid,
            stores,
            "license replaced"
        );
        Ok(document)
    }

    /// Applies an issued upgrade onto the installed license.
    pub fn upgrade(&self, bytes: &[u8]) -> LicenseResult<LicenseDocument> {
        let key = self.installed_key()?;
        let current = self.installed(&key)?;
        let incoming = LicenseDocument::open(bytes, &self.env.issuer_key)?;

        LicenseUpgrader::new(self.env.hardware.as_ref(), self.env.clock.as_ref()).upgrade(
            &current,
            &incoming,
            &self.env.stores,
            &key,
        )
    }

    /// Removes every stored copy, the installation keypair and the manifest.
    /// Safe to call when nothing is installed.
    ///
    /// Every removal is attempted; the first failure is returned afterwards.
    pub fn uninstall(&self) -> LicenseResult<()> {
        let results = [
            delete_everywhere(&self.env.stores),
            self.env.key_store.delete(),
            self.env.manifest.delete(),
        ];
        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            warn!(error = %e, "license only partly uninstalled");
            return Err(e);
        }
        info!("license uninstalled");
        Ok(())
    }

    /// Undoes a failed installation.
    pub fn rollback(&self) -> LicenseResult<()> {
        warn!("rolling back license installation");
        self.uninstall()
    }

    fn installed_key(&self) -> LicenseResult<SigningKey> {
        self.env.key_store.load()?.ok_or(LicenseError::NotInstalled)
    }

    fn installed(&self, key: &SigningKey) -> LicenseResult<LicenseDocument> {
        let verifying = key.verifying_key();
        Ok(LicenseResolver::new(&verifying)
            .resolve(None, &self.env.stores)?
            .document)
    }

    /// The machine identity, checked against the document's hardware key.
    fn bound_machine(&self, document: &LicenseDocument) -> LicenseResult<String> {
        let machine = self.env.hardware.machine_identity();
        if !document.hardware_key.is_empty() && document.hardware_key != hardware_token(&machine) {
            warn!(uid = %document.uid, "license is bound to another machine");
            return Err(LicenseError::HardwareMismatch);
        }
        Ok(machine)
    }

    fn initialize(
        &self,
        document: &mut LicenseDocument,
        product: ProductIdentity,
        user: UserIdentity,
        machine: String,
    ) {
        let now = self.env.clock.now();
        let instance = InstanceId::new();
        document.instance_id = Some(instance);
        document.license_key = LicenseDocument::derive_license_key(&instance);
        document.hardware_key = hardware_token(&machine);
        document.machine_identity = machine;
        document.first_use_at = Some(now);
        document.modified_at = now;
        document.product = product;
        document.user = user;
        document.statistics.reset();
    }

    fn persist(&self, document: &LicenseDocument, key: &SigningKey) -> LicenseResult<usize> {
        let bytes = document.seal(key)?;
        replace_everywhere(&self.env.stores, &bytes)
    }
}
