//! HTML cleaning and ticket-description formatting
//!
//! GLPI ticket descriptions arrive as HTML, sometimes produced by a form
//! plugin with a fixed field layout (LOCALIZAÇÃO / RAMAL / DESCRIÇÃO DO
//! PEDIDO / ARQUIVO). These helpers normalise both shapes into plain text.

use std::sync::LazyLock;

use regex::Regex;

/// Unstructured descriptions are capped at this many characters.
const DESCRIPTION_CAP: usize = 500;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)RAMAL\s*:?\s*:?\s*(\d+)").unwrap());
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"LOCALIZAÇÃO\s*:?\s*(.+?)(?:RAMAL|DESCRIÇÃO DO PEDIDO|ARQUIVO|$)").unwrap()
});
static REQUEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DESCRIÇÃO DO PEDIDO\s*:?\s*(.+?)(?:ARQUIVO|$)").unwrap());
static FILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ARQUIVO\s*:?\s*(.+)$").unwrap());

/// Markers that identify a form-structured description.
const STRUCTURED_MARKERS: [&str; 3] = ["Dados do formulário", "LOCALIZAÇÃO", "RAMAL"];

/// Strip HTML tags and entities, collapse whitespace.
pub fn clean_html(raw: &str) -> String {
    let without_tags = TAG_RE.replace_all(raw, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Extract the phone extension following a `RAMAL` label, or empty string.
pub fn extract_phone(raw: &str) -> String {
    let cleaned = clean_html(raw);
    PHONE_RE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Normalise a ticket description for display.
///
/// Form-structured content is reduced to its labelled fields, one per line;
/// free-form content is cleaned and capped. Idempotent: formatting an
/// already-formatted description returns it unchanged.
pub fn format_description(raw: &str) -> String {
    let cleaned = clean_html(raw);

    if STRUCTURED_MARKERS.iter().any(|m| cleaned.contains(m)) {
        let mut lines = Vec::new();

        if let Some(loc) = capture(&LOCATION_RE, &cleaned) {
            lines.push(format!("LOCALIZAÇÃO: {}", loc));
        }
        let phone = PHONE_RE
            .captures(&cleaned)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        if let Some(phone) = phone {
            lines.push(format!("RAMAL: {}", phone));
        }
        if let Some(req) = capture(&REQUEST_RE, &cleaned) {
            lines.push(format!("DESCRIÇÃO DO PEDIDO: {}", req));
        }
        if let Some(file) = capture(&FILE_RE, &cleaned) {
            lines.push(format!("ARQUIVO: {}", file));
        }

        if !lines.is_empty() {
            return lines.join("\n");
        }
    }

    truncate(&cleaned)
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn truncate(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_CAP {
        let capped: String = text.chars().take(DESCRIPTION_CAP).collect();
        format!("{}...", capped)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_tags_and_entities() {
        let raw = "<p>Impressora&nbsp;<b>parada</b> &amp; sem papel</p>";
        assert_eq!(clean_html(raw), "Impressora parada & sem papel");
    }

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean_html("a\n\n  b\t c"), "a b c");
    }

    #[test]
    fn phone_extracted_with_colon_variants() {
        assert_eq!(extract_phone("RAMAL: 1234"), "1234");
        assert_eq!(extract_phone("ramal :: 567"), "567");
        assert_eq!(extract_phone("RAMAL 89"), "89");
        assert_eq!(extract_phone("<b>RAMAL:</b> 4321"), "4321");
    }

    #[test]
    fn phone_empty_when_absent() {
        assert_eq!(extract_phone("sem telefone aqui"), "");
    }

    #[test]
    fn phone_takes_only_consecutive_digits() {
        assert_eq!(extract_phone("RAMAL: 123 ou 456"), "123");
    }

    #[test]
    fn structured_description_extracts_fields_in_order() {
        let raw = "<div>Dados do formulário</div> LOCALIZAÇÃO: Bloco C sala 2 \
                   RAMAL: 4411 DESCRIÇÃO DO PEDIDO: Monitor piscando ARQUIVO: foto.png";
        let formatted = format_description(raw);
        assert_eq!(
            formatted,
            "LOCALIZAÇÃO: Bloco C sala 2\nRAMAL: 4411\nDESCRIÇÃO DO PEDIDO: Monitor piscando\nARQUIVO: foto.png"
        );
    }

    #[test]
    fn structured_description_skips_missing_fields() {
        let raw = "LOCALIZAÇÃO: Térreo RAMAL: 100";
        assert_eq!(format_description(raw), "LOCALIZAÇÃO: Térreo\nRAMAL: 100");
    }

    #[test]
    fn unstructured_description_is_capped() {
        let raw = "x".repeat(600);
        let formatted = format_description(&raw);
        assert_eq!(formatted.chars().count(), DESCRIPTION_CAP + 3);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn short_unstructured_description_passes_through() {
        assert_eq!(format_description("<p>tudo ok</p>"), "tudo ok");
    }

    #[test]
    fn format_is_idempotent_for_structured_input() {
        let raw = "Dados do formulário LOCALIZAÇÃO: Anexo RAMAL: 42 \
                   DESCRIÇÃO DO PEDIDO: Teclado com defeito ARQUIVO: nota.pdf";
        let once = format_description(raw);
        assert_eq!(format_description(&once), once);
    }

    #[test]
    fn format_is_idempotent_for_unstructured_input() {
        let raw = "y".repeat(800);
        let once = format_description(&raw);
        assert_eq!(format_description(&once), once);
    }
}
