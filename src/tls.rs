//! TLS material loading (C13): turns a PEM file into a `rustls::ServerConfig`.

#![cfg(feature = "tls")]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::{Certificate, PrivateKey, ServerConfig};

use crate::error::Error;
use crate::variant::HttpVariant;

/// A loaded private key and certificate chain, ready to be turned into a
/// `rustls::ServerConfig`.
pub struct TlsMaterial {
    key: PrivateKey,
    chain: Vec<Certificate>,
}

impl TlsMaterial {
    /// Read `path` as a single PEM file containing both a private key
    /// (`PKCS8`, `RSA`, or `SEC1`, tried in that order) and one or more
    /// certificates, in file order.
    pub fn from_pem_file(path: impl AsRef<Path>) -> crate::Result<TlsMaterial> {
        let file = File::open(path.as_ref()).map_err(Error::new_tls)?;
        let mut reader = BufReader::new(file);

        let chain: Vec<Certificate> = rustls_pemfile::certs(&mut reader)
            .map_err(Error::new_tls)?
            .into_iter()
            .map(Certificate)
            .collect();
        if chain.is_empty() {
            return Err(Error::new_tls(NoCertificates));
        }

        // rustls_pemfile::certs consumes the reader; reopen to scan for a key.
        let file = File::open(path.as_ref()).map_err(Error::new_tls)?;
        let mut reader = BufReader::new(file);
        let key = read_private_key(&mut reader)?;

        Ok(TlsMaterial { key, chain })
    }

    /// Build a `rustls::ServerConfig` for `variant`, with ALPN protocols set
    /// per §3.2: `{h2, http/1.1}` for `V2`, `{http/1.1}` for `V1_1` over TLS.
    pub fn into_server_config(self, variant: &HttpVariant) -> crate::Result<ServerConfig> {
        let mut config = ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(self.chain, self.key)
            .map_err(Error::new_tls)?;

        config.alpn_protocols = match variant {
            HttpVariant::V2 => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
            HttpVariant::V1_1 { tls: true } => vec![b"http/1.1".to_vec()],
            HttpVariant::V1_1 { tls: false } => Vec::new(),
        };

        Ok(config)
    }

    /// Convenience: load and build the config in one step.
    pub fn server_config_for(
        path: impl AsRef<Path>,
        variant: &HttpVariant,
    ) -> crate::Result<Arc<ServerConfig>> {
        let material = TlsMaterial::from_pem_file(path)?;
        Ok(Arc::new(material.into_server_config(variant)?))
    }
}

fn read_private_key(reader: &mut BufReader<File>) -> crate::Result<PrivateKey> {
    use rustls_pemfile::Item;

    loop {
        match rustls_pemfile::read_one(reader).map_err(Error::new_tls)? {
            Some(Item::PKCS8Key(key)) | Some(Item::RSAKey(key)) | Some(Item::ECKey(key)) => {
                return Ok(PrivateKey(key));
            }
            Some(_) => continue,
            None => return Err(Error::new_tls(MissingPrivateKey)),
        }
    }
}

#[derive(Debug)]
struct NoCertificates;

impl std::fmt::Display for NoCertificates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PEM file contained no certificates")
    }
}

impl std::error::Error for NoCertificates {}

#[derive(Debug)]
struct MissingPrivateKey;

impl std::fmt::Display for MissingPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PEM file contained no recognized private key")
    }
}

impl std::error::Error for MissingPrivateKey {}
