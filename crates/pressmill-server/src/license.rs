//! License validation and download-URL signing.
//!
//! The license key a client presents is the HTTP Basic credential for
//! `secret_id:secret_string`. A valid license turns the metadata's
//! `download_url` into a signed link: a `uid` argument carrying the
//! digest of the download parameters, verified again when the download
//! request arrives.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Static shared-secret license.
#[derive(Debug, Clone)]
pub struct License {
    expected: String,
}

impl License {
    /// Build the license from the configured shared secret.
    pub fn new(secret_id: &str, secret_string: &str) -> Self {
        Self {
            expected: BASE64.encode(format!("{secret_id}:{secret_string}")),
        }
    }

    /// Whether a presented key matches the configured secret.
    pub fn is_valid(&self, presented: Option<&str>) -> bool {
        presented == Some(self.expected.as_str())
    }

    /// Signed `uid` argument for a download link, URL-encoded for
    /// embedding.
    pub fn download_uid(slug: &str, wp_version: &str, site_url: &str) -> String {
        let digest = signature_digest("download", slug, wp_version, site_url);
        urlencoding::encode(&BASE64.encode(digest)).into_owned()
    }

    /// Verify a presented `uid` against the request parameters. The
    /// value arrives URL-decoded.
    pub fn is_uid_valid(
        action: &str,
        slug: &str,
        wp_version: &str,
        site_url: &str,
        uid: &str,
    ) -> bool {
        let Ok(sent) = BASE64.decode(uid) else {
            return false;
        };
        sent == signature_digest(action, slug, wp_version, site_url).into_bytes()
    }
}

fn signature_digest(action: &str, slug: &str, wp_version: &str, site_url: &str) -> String {
    let payload = format!("{action};{slug};{wp_version};{site_url}");
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Append a query argument to a URL that may or may not already carry a
/// query string. The value must already be URL-encoded.
pub fn add_query_arg(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{key}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_secret_validates() {
        let license = License::new("998", "123openup");
        let key = BASE64.encode("998:123openup");
        assert!(license.is_valid(Some(&key)));
        assert!(!license.is_valid(Some("OTk4Ondyb25n")));
        assert!(!license.is_valid(None));
    }

    #[test]
    fn uid_round_trips() {
        let uid = License::download_uid("plugin-x", "6.4", "https://example.com");
        let decoded = urlencoding::decode(&uid).expect("decode").into_owned();
        assert!(License::is_uid_valid(
            "download",
            "plugin-x",
            "6.4",
            "https://example.com",
            &decoded
        ));
    }

    #[test]
    fn uid_is_bound_to_every_parameter() {
        let uid = License::download_uid("plugin-x", "6.4", "https://example.com");
        let decoded = urlencoding::decode(&uid).expect("decode").into_owned();
        assert!(!License::is_uid_valid(
            "download",
            "plugin-y",
            "6.4",
            "https://example.com",
            &decoded
        ));
        assert!(!License::is_uid_valid(
            "download",
            "plugin-x",
            "6.5",
            "https://example.com",
            &decoded
        ));
        assert!(!License::is_uid_valid(
            "download",
            "plugin-x",
            "6.4",
            "https://other.example",
            &decoded
        ));
    }

    #[test]
    fn garbage_uid_is_rejected() {
        assert!(!License::is_uid_valid("download", "plugin-x", "", "", ""));
        assert!(!License::is_uid_valid(
            "download",
            "plugin-x",
            "",
            "",
            "not base64!!"
        ));
    }

    #[test]
    fn add_query_arg_handles_both_shapes() {
        assert_eq!(
            add_query_arg("http://h/updates", "uid", "abc"),
            "http://h/updates?uid=abc"
        );
        assert_eq!(
            add_query_arg("http://h/updates?action=download", "uid", "abc"),
            "http://h/updates?action=download&uid=abc"
        );
    }
}
