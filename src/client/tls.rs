// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! rustls client configuration for `tls=1` connections.

use std::{fs::File, io, io::BufReader, sync::Arc};

use once_cell::sync::Lazy;
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    },
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
};
use tokio_rustls::TlsConnector;

static VERIFY_SCHEMES: Lazy<Vec<SignatureScheme>> = Lazy::new(|| {
    rustls::crypto::aws_lc_rs::default_provider()
        .signature_verification_algorithms
        .supported_schemes()
});

use crate::{cfg::config::TlsOptions, client::error::BoltError};

/// Builds a connector from the configured trust anchors and client identity.
pub fn connector(opts: &TlsOptions) -> Result<TlsConnector, BoltError> {
    let mut roots = RootCertStore::empty();
    match &opts.ca_cert_file {
        Some(path) => {
            for cert in load_certs(path)? {
                roots
                    .add(cert)
                    .map_err(|e| BoltError::Tls(format!("bad CA certificate: {e}")))?;
            }
        },
        None => {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        },
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);

    let mut config = match (&opts.cert_file, &opts.key_file) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_certs(cert_path)?;
            let key = load_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| BoltError::Tls(format!("bad client cert/key: {e}")))?
        },
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(BoltError::Configuration(
                "tls cert_file and key_file must be provided together".to_string(),
            ));
        },
    };

    if opts.no_verify {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoVerification));
    }

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Resolves the SNI name for a host, falling back through IP parsing.
pub fn server_name(host: &str) -> Result<ServerName<'static>, BoltError> {
    ServerName::try_from(host.to_string())
        .map_err(|e| BoltError::Tls(format!("invalid server name {host:?}: {e}")))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, BoltError> {
    let file = File::open(path)
        .map_err(|e| BoltError::Tls(format!("cannot open {path:?}: {e}")))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| BoltError::Tls(format!("cannot parse certificates {path:?}: {e}")))
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, BoltError> {
    let file = File::open(path)
        .map_err(|e| BoltError::Tls(format!("cannot open {path:?}: {e}")))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| BoltError::Tls(format!("cannot parse key {path:?}: {e}")))?
        .ok_or_else(|| BoltError::Tls(format!("no private key found in {path:?}")))
}

/// Accepts any server chain; installed only for `tls_no_verify=1`.
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        VERIFY_SCHEMES.clone()
    }
}
