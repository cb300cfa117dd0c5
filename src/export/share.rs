pub const SHARE_BASE: &str = "https://wa.me/?text=";

/// Message announcing the inventory, followed by a reference to the file.
pub fn share_text(file_url: &str) -> String {
    format!("Eu quero compartilhar o inventário com você. \n\nArquivo Excel : {file_url}")
}

/// Percent-encode everything except RFC 3986 unreserved characters.
pub(crate) fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 3);
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Messaging link that shares the exported workbook at `file_url`.
pub fn share_link(file_url: &str) -> String {
    format!("{SHARE_BASE}{}", percent_encode(&share_text(file_url)))
}
