//! File downloads (`getFile.aspx`).

use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::transport::RawPage;

/// A downloaded document. Bytes are skipped when serializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub file_id: u64,
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl DownloadedFile {
    pub fn from_page(file_id: u64, page: RawPage) -> Self {
        let file_name = page
            .header("content-disposition")
            .and_then(filename_from_disposition)
            .map(|name| sanitize(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("file-{file_id}"));

        let content_type = page
            .header("content-type")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        tracing::info!(file_id, file_name = %file_name, bytes = page.body.len(), "downloaded file");

        Self {
            file_id,
            file_name,
            content_type,
            bytes: page.body,
        }
    }
}

/// Recover the filename from a `Content-Disposition` value whose characters
/// are the raw header bytes.
///
/// `filename*=charset''pct-encoded` wins over `filename=`. A plain filename
/// that is not valid UTF-8 is re-decoded through the portal's charset.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let params: Vec<(String, String)> = split_params(value)
        .into_iter()
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect();

    let extended = params
        .iter()
        .find(|(k, _)| k == "filename*")
        .and_then(|(_, v)| decode_extended(v));
    if extended.is_some() {
        return extended;
    }

    let plain = params.iter().find(|(k, _)| k == "filename")?.1.as_str();
    let unquoted = plain
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(plain)
        .replace("\\\"", "\"");

    let raw_bytes: Option<Vec<u8>> = unquoted
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect();
    match raw_bytes.map(String::from_utf8) {
        Some(Ok(utf8)) => Some(utf8),
        _ => Some(encoding::repair_mis_decoded(&unquoted)),
    }
}

/// Split header parameters on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// RFC 5987 `charset'lang'pct-encoded`.
fn decode_extended(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?.to_ascii_lowercase();
    let _lang = parts.next()?;
    let encoded = parts.next()?;

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    match charset.as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes.into_owned()).ok(),
        _ => Some(encoding::decode(&bytes)),
    }
}

fn sanitize(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(disposition: Option<&str>) -> RawPage {
        let mut headers = vec![("content-type".to_string(), "application/pdf".to_string())];
        if let Some(d) = disposition {
            headers.push(("content-disposition".to_string(), d.to_string()));
        }
        RawPage {
            url: "https://portal/lib-student/getFile.aspx?id=5".into(),
            status: 200,
            headers,
            body: b"%PDF".to_vec(),
        }
    }

    #[test]
    fn test_extended_filename_preferred() {
        let value = "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''Predavanje%20%C4%8Detvrto.pdf";
        assert_eq!(
            filename_from_disposition(value).as_deref(),
            Some("Predavanje četvrto.pdf")
        );
    }

    #[test]
    fn test_garbled_plain_filename_is_redecoded() {
        // "Šifra.pdf" sent as windows-1250 bytes: Š = 0x8A
        let raw = encoding::raw_chars(b"attachment; filename=\"\x8Aifra.pdf\"");
        assert_eq!(filename_from_disposition(&raw).as_deref(), Some("Šifra.pdf"));
    }

    #[test]
    fn test_semicolon_inside_quoted_filename() {
        let value = r#"attachment; filename="Vježbe; grupa A.pdf"; size=1024"#;
        assert_eq!(
            filename_from_disposition(&encoding::raw_chars(value.as_bytes())).as_deref(),
            Some("Vježbe; grupa A.pdf")
        );
        assert_eq!(
            split_params(r#"inline; filename="a\";b.pdf""#),
            vec!["inline", r#" filename="a\";b.pdf""#]
        );
    }

    #[test]
    fn test_utf8_plain_filename() {
        let raw = encoding::raw_chars("attachment; filename=\"Žuta.pdf\"".as_bytes());
        assert_eq!(filename_from_disposition(&raw).as_deref(), Some("Žuta.pdf"));
    }

    #[test]
    fn test_unquoted_and_windows_1250_extended() {
        assert_eq!(
            filename_from_disposition("inline; filename=plan.xlsx").as_deref(),
            Some("plan.xlsx")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=windows-1250''%E8a%9A.txt").as_deref(),
            Some("čaš.txt")
        );
    }

    #[test]
    fn test_download_falls_back_to_id() {
        let file = DownloadedFile::from_page(5, page(None));
        assert_eq!(file.file_name, "file-5");
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(file.bytes, b"%PDF");
    }

    #[test]
    fn test_path_components_are_stripped() {
        let file = DownloadedFile::from_page(5, page(Some("attachment; filename=\"..\\..\\x.pdf\"")));
        assert_eq!(file.file_name, "x.pdf");
    }
}
