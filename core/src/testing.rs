//! Fixtures shared by the unit tests.

use crate::manifest::{ContentHash, Manifest, SkillEntry, TrustedKey, TrustedKeys};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};

pub struct TestSigner {
    key_id: String,
    pair: Ed25519KeyPair,
}

impl TestSigner {
    pub fn new(key_id: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        Self {
            key_id: key_id.to_string(),
            pair,
        }
    }

    pub fn trusted_key(&self) -> TrustedKey {
        TrustedKey::new(self.key_id.clone(), self.pair.public_key().as_ref().to_vec())
    }

    pub fn trusted_keys(&self) -> TrustedKeys {
        TrustedKeys::new(vec![self.trusted_key()])
    }

    pub fn sign(&self, manifest: Manifest) -> Manifest {
        let message = manifest.canonical_bytes().unwrap();
        let signature = self.pair.sign(&message);
        manifest.with_signature(signature.as_ref().to_vec())
    }
}

pub fn entry(slug: &str, url: &str, payload: &[u8]) -> SkillEntry {
    SkillEntry {
        slug: slug.to_string(),
        download_url: url.to_string(),
        content_hash: ContentHash::of(payload).to_string(),
        size_bytes: payload.len() as u64,
    }
}

/// gzip tarball with the given `(path, contents)` files.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// gzip tarball whose single entry carries `raw_path` verbatim, bypassing the
/// builder's own path checks.
pub fn raw_path_tarball(raw_path: &str, contents: &[u8]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_old();
    let name = raw_path.as_bytes();
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, contents).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// gzip tarball holding a single symlink `path -> target`.
pub fn symlink_tarball(path: &str, target: &str) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    header.set_link_name(target).unwrap();
    builder
        .append_data(&mut header, path, std::io::empty())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn config(base: &str) -> crate::config::Config {
    let overrides = crate::config::ConfigOverrides {
        api_base_url: Some(base.to_string()),
        ..Default::default()
    };
    crate::config::ConfigResolver::new("/home/tester")
        .with_config_file(None)
        .resolve(&overrides)
        .unwrap()
}
