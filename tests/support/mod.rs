//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read};

use harvester_core::ResourceDescriptor;
use harvester_core::archive::{ArchiveManifest, MANIFEST_NAME};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipArchive;

/// A tiny payload standing in for image bytes.
pub fn image_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// 200 response with an image content type.
pub fn image_response(bytes: Vec<u8>, content_type: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(bytes, content_type)
}

/// 200 response with an HTML content type.
pub fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

/// Mounts a PNG at `route`.
pub async fn mount_png(server: &MockServer, route: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(image_response(bytes, "image/png"))
        .mount(server)
        .await;
}

/// Mounts an HTML page at `route`.
pub async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_response(body))
        .mount(server)
        .await;
}

/// Descriptor for `route` on `server`, discovered on the server root.
pub fn descriptor(server: &MockServer, route: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(
        &format!("{}{route}", server.uri()),
        &format!("{}/", server.uri()),
        Some(format!("image at {route}")),
    )
    .expect("test descriptor is valid")
}

/// Entry names of a zip archive, in archive order.
pub fn archive_names(archive: &[u8]) -> Vec<String> {
    let mut zip = ZipArchive::new(Cursor::new(archive.to_vec())).expect("archive is a valid zip");
    (0..zip.len())
        .map(|i| zip.by_index(i).expect("entry exists").name().to_string())
        .collect()
}

/// Reads one entry of a zip archive.
pub fn archive_entry(archive: &[u8], name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(Cursor::new(archive.to_vec())).expect("archive is a valid zip");
    let mut entry = zip.by_name(name).expect("entry exists");
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).expect("entry is readable");
    bytes
}

/// Parses the embedded manifest.
pub fn archive_manifest(archive: &[u8]) -> ArchiveManifest {
    serde_json::from_slice(&archive_entry(archive, MANIFEST_NAME)).expect("manifest is valid JSON")
}
