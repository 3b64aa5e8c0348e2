//! Self-signed TLS material, generated once and persisted.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType, KeyPair, SanType};

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";
const VALIDITY_DAYS: i64 = 3650;

/// Resolve the certificate and key to serve with.
///
/// Configured paths win when both files exist; otherwise a generated pair
/// under `dir` is reused or created.
pub fn ensure_tls_material(
    dir: &Path,
    cert: Option<&Path>,
    key: Option<&Path>,
) -> Result<(PathBuf, PathBuf)> {
    if let (Some(cert), Some(key)) = (cert, key) {
        if cert.exists() && key.exists() {
            return Ok((cert.to_path_buf(), key.to_path_buf()));
        }
    }

    let cert_path = dir.join(CERT_FILE);
    let key_path = dir.join(KEY_FILE);
    if cert_path.exists() && key_path.exists() {
        return Ok((cert_path, key_path));
    }

    generate_self_signed(&cert_path, &key_path)?;
    Ok((cert_path, key_path))
}

/// Generate an ECDSA P-256 certificate for localhost and write both PEMs.
fn generate_self_signed(cert_path: &Path, key_path: &Path) -> Result<()> {
    info!("generating self-signed certificate at {}", cert_path.display());

    let mut params = CertificateParams::default();

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, "hostlink");
    params.distinguished_name = distinguished_name;

    params.not_before = time::OffsetDateTime::now_utc();
    params.not_after = time::OffsetDateTime::now_utc() + time::Duration::days(VALIDITY_DAYS);

    params.subject_alt_names = vec![
        SanType::DnsName("localhost".to_string()),
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
    ];

    let key_pair =
        KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).context("generating key pair")?;
    params.key_pair = Some(key_pair);

    let cert = Certificate::from_params(params).context("generating certificate")?;
    let cert_pem = cert.serialize_pem().context("serializing certificate")?;
    let key_pem = cert.serialize_private_key_pem();

    if let Some(parent) = cert_path.parent() {
        std::fs::create_dir_all(parent).context("creating certificate directory")?;
    }
    std::fs::write(cert_path, cert_pem.as_bytes()).context("writing certificate")?;
    std::fs::write(key_path, key_pem.as_bytes()).context("writing private key")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(key_path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(key_path, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generates_and_reuses_material() {
        let dir = TempDir::new().unwrap();

        let (cert, key) = ensure_tls_material(dir.path(), None, None).unwrap();
        assert!(cert.exists());
        assert!(key.exists());

        let cert_pem = std::fs::read_to_string(&cert).unwrap();
        assert!(cert_pem.contains("BEGIN CERTIFICATE"));
        let key_pem = std::fs::read_to_string(&key).unwrap();
        assert!(key_pem.contains("PRIVATE KEY"));

        // Second call must reuse, not regenerate.
        let before = std::fs::read(&cert).unwrap();
        let (cert2, _) = ensure_tls_material(dir.path(), None, None).unwrap();
        assert_eq!(cert, cert2);
        assert_eq!(before, std::fs::read(&cert2).unwrap());
    }

    #[test]
    fn configured_paths_win_when_present() {
        let dir = TempDir::new().unwrap();
        let (generated_cert, generated_key) = ensure_tls_material(dir.path(), None, None).unwrap();

        let other = TempDir::new().unwrap();
        let (cert, key) = ensure_tls_material(
            other.path(),
            Some(generated_cert.as_path()),
            Some(generated_key.as_path()),
        )
        .unwrap();
        assert_eq!(cert, generated_cert);
        assert_eq!(key, generated_key);
        assert!(!other.path().join(CERT_FILE).exists());
    }
}
