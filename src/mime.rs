//! MIME type catalog and file-extension inference.

use std::fmt;

/// A closed catalog of the MIME types this crate knows how to name, plus a
/// `Raw` escape hatch for anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mime {
    /// application/octet-stream
    ApplicationOctetStream,
    /// application/json
    ApplicationJson,
    /// application/javascript
    ApplicationJavascript,
    /// application/xml
    ApplicationXml,
    /// application/pdf
    ApplicationPdf,
    /// application/zip
    ApplicationZip,
    /// application/wasm
    ApplicationWasm,
    /// font/woff
    FontWoff,
    /// font/woff2
    FontWoff2,
    /// font/ttf
    FontTtf,
    /// image/png
    ImagePng,
    /// image/jpeg
    ImageJpeg,
    /// image/gif
    ImageGif,
    /// image/svg+xml
    ImageSvg,
    /// image/webp
    ImageWebp,
    /// image/x-icon
    ImageIcon,
    /// text/plain; charset=UTF-8
    TextPlain,
    /// text/html; charset=UTF-8
    TextHtml,
    /// text/css; charset=UTF-8
    TextCss,
    /// text/csv; charset=UTF-8
    TextCsv,
    /// Any MIME type not covered above, supplied verbatim.
    Raw(String),
}

impl Mime {
    /// An escape hatch for a MIME essence string not in the catalog.
    pub fn raw(essence: impl Into<String>) -> Mime {
        Mime::Raw(essence.into())
    }

    /// The wire form of this MIME type, e.g. `"text/html; charset=UTF-8"`.
    pub fn as_str(&self) -> &str {
        match self {
            Mime::ApplicationOctetStream => "application/octet-stream",
            Mime::ApplicationJson => "application/json",
            Mime::ApplicationJavascript => "application/javascript",
            Mime::ApplicationXml => "application/xml",
            Mime::ApplicationPdf => "application/pdf",
            Mime::ApplicationZip => "application/zip",
            Mime::ApplicationWasm => "application/wasm",
            Mime::FontWoff => "font/woff",
            Mime::FontWoff2 => "font/woff2",
            Mime::FontTtf => "font/ttf",
            Mime::ImagePng => "image/png",
            Mime::ImageJpeg => "image/jpeg",
            Mime::ImageGif => "image/gif",
            Mime::ImageSvg => "image/svg+xml",
            Mime::ImageWebp => "image/webp",
            Mime::ImageIcon => "image/x-icon",
            Mime::TextPlain => "text/plain; charset=UTF-8",
            Mime::TextHtml => "text/html; charset=UTF-8",
            Mime::TextCss => "text/css; charset=UTF-8",
            Mime::TextCsv => "text/csv; charset=UTF-8",
            Mime::Raw(s) => s.as_str(),
        }
    }

    /// Infer a MIME type from a file extension (without the leading `.`),
    /// case-insensitively. Covers the common web file-extension set.
    /// Returns `None` for unrecognized extensions — callers typically fall
    /// back to `Mime::ApplicationOctetStream`.
    pub fn from_extension(ext: &str) -> Option<Mime> {
        let lower = ext.to_ascii_lowercase();
        Some(match lower.as_str() {
            "json" => Mime::ApplicationJson,
            "js" | "mjs" => Mime::ApplicationJavascript,
            "xml" => Mime::ApplicationXml,
            "pdf" => Mime::ApplicationPdf,
            "zip" => Mime::ApplicationZip,
            "wasm" => Mime::ApplicationWasm,
            "woff" => Mime::FontWoff,
            "woff2" => Mime::FontWoff2,
            "ttf" => Mime::FontTtf,
            "png" => Mime::ImagePng,
            "jpg" | "jpeg" => Mime::ImageJpeg,
            "gif" => Mime::ImageGif,
            "svg" => Mime::ImageSvg,
            "webp" => Mime::ImageWebp,
            "ico" => Mime::ImageIcon,
            "txt" => Mime::TextPlain,
            "html" | "htm" => Mime::TextHtml,
            "css" => Mime::TextCss,
            "csv" => Mime::TextCsv,
            _ => return None,
        })
    }
}

impl fmt::Display for Mime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Mime;

    #[test]
    fn known_extension() {
        assert_eq!(Mime::from_extension("HTML"), Some(Mime::TextHtml));
        assert_eq!(Mime::from_extension("png"), Some(Mime::ImagePng));
    }

    #[test]
    fn unknown_extension() {
        assert_eq!(Mime::from_extension("qqq"), None);
    }

    #[test]
    fn raw_escape() {
        let m = Mime::raw("application/vnd.custom+json");
        assert_eq!(m.as_str(), "application/vnd.custom+json");
    }

    #[test]
    fn text_types_default_utf8() {
        assert!(Mime::TextHtml.as_str().contains("charset=UTF-8"));
        assert!(!Mime::ApplicationJson.as_str().contains("charset"));
    }
}
