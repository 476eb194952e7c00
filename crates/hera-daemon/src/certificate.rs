//! Origin certificate lookup.
//!
//! Certificates are plain files in one directory, named after the registrable
//! domain they cover (`example.co.uk.pem` serves `www.example.co.uk`). The
//! directory is rescanned on every lookup so certificates dropped in while the
//! daemon runs are picked up without a restart.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use hera_core::config::CertificateConfig;
use hera_core::domain::root_domain;

/// Errors raised while resolving a certificate.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("No certificate found for {hostname} (looked for {expected} in {})", dir.display())]
    NotFound {
        hostname: String,
        expected: String,
        dir: PathBuf,
    },

    #[error("Cannot derive a root domain from {0}")]
    InvalidHostname(String),

    #[error("No certificates found in {}", dir.display())]
    NoCertificates { dir: PathBuf },

    #[error("Unable to scan {} for certificates: {source}", dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A credential file in the certificate directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    name: String,
    path: PathBuf,
}

impl Certificate {
    pub fn new(name: impl Into<String>, dir: &Path) -> Self {
        let name = name.into();
        let path = dir.join(&name);
        Self { name, path }
    }

    /// File name, e.g. `site.tld.pem`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checked on every call; existence is never cached.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Scans the certificate directory and matches certificates to hostnames.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    config: CertificateConfig,
}

impl CertificateStore {
    pub const fn new(config: CertificateConfig) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// File name a certificate for `domain` must have.
    pub fn file_name_for(&self, domain: &str) -> String {
        format!("{domain}.{}", self.config.extension)
    }

    /// All certificate files in the directory (non-recursive).
    pub fn scan_all(&self) -> Result<Vec<Certificate>, CertificateError> {
        let dir = &self.config.dir;
        let scan_err = |source| CertificateError::Scan {
            dir: dir.clone(),
            source,
        };
        let suffix = format!(".{}", self.config.extension);

        let mut certs = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(scan_err)? {
            let entry = entry.map_err(scan_err)?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(&suffix) || !entry.path().is_file() {
                continue;
            }
            certs.push(Certificate::new(name, dir));
        }
        certs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(certs)
    }

    /// Check that at least one certificate is available, logging each one.
    pub fn verify(&self) -> Result<Vec<Certificate>, CertificateError> {
        let certs = self.scan_all()?;
        if certs.is_empty() {
            return Err(CertificateError::NoCertificates {
                dir: self.config.dir.clone(),
            });
        }
        for cert in &certs {
            info!(certificate = %cert.name, "Found certificate");
        }
        Ok(certs)
    }

    /// Resolve the certificate serving `hostname`.
    ///
    /// An `explicit` file name (from the certificate label) is tried verbatim
    /// first. Otherwise the file named after the hostname's root domain wins,
    /// then the configured fallback, if any.
    pub fn find_for_hostname(
        &self,
        hostname: &str,
        explicit: Option<&str>,
    ) -> Result<Certificate, CertificateError> {
        if let Some(name) = explicit {
            let cert = Certificate::new(name, &self.config.dir);
            if cert.exists() {
                return Ok(cert);
            }
            info!(
                hostname,
                certificate = %cert.path.display(),
                "Labelled certificate not found, falling back to root domain matching"
            );
        }

        let root = root_domain(hostname)
            .map_err(|_| CertificateError::InvalidHostname(hostname.to_string()))?;
        let expected = self.file_name_for(&root);

        if let Some(cert) = self
            .scan_all()?
            .into_iter()
            .find(|cert| cert.name == expected)
        {
            return Ok(cert);
        }

        if let Some(ref fallback) = self.config.fallback {
            let cert = Certificate::new(fallback.as_str(), &self.config.dir);
            if cert.exists() {
                info!(
                    hostname,
                    certificate = %cert.path.display(),
                    "Unable to find {expected}, using fallback certificate"
                );
                return Ok(cert);
            }
            warn!(
                certificate = %cert.path.display(),
                "Configured fallback certificate does not exist"
            );
        }

        Err(CertificateError::NotFound {
            hostname: hostname.to_string(),
            expected,
            dir: self.config.dir.clone(),
        })
    }
}

/// Operator guidance logged when the certificate directory is empty.
pub fn missing_certificate_help(dir: &Path) -> String {
    format!(
        "Hera cannot create tunnels without an origin certificate. To fix this:\n \
         1. Mount a volume with your certificates at `{}`\n \
         2. Name each certificate after its root domain (e.g. `mysite.com.pem`)",
        dir.display()
    )
}
