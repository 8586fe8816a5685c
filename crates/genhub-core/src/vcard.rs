//! vCard 3.0 export for public profiles, plus a reader for the same subset.

use crate::model::Profile;

const END_MARKER: &str = "END:VCARD";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VCard {
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub note: Option<String>,
}

impl VCard {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Contact card for a public profile. `public_url` is the profile page.
    pub fn from_profile(profile: &Profile, public_url: Option<&str>) -> Self {
        let note = Some(profile.bio.trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        Self {
            display_name: profile.display_name.clone(),
            phone: profile.phone.clone(),
            email: profile.email.clone(),
            organization: profile.company.clone(),
            title: profile.job_title.clone(),
            url: public_url.map(str::to_string),
            note,
        }
    }

    /// Serialized card with CRLF line endings.
    pub fn to_vcf(&self) -> String {
        let mut lines = vec![
            "BEGIN:VCARD".to_string(),
            "VERSION:3.0".to_string(),
            format!("FN:{}", escape(&self.display_name)),
            format!("N:;{};;;", escape(&self.display_name)),
        ];
        let optional = [
            ("TEL;TYPE=CELL", &self.phone),
            ("EMAIL", &self.email),
            ("ORG", &self.organization),
            ("TITLE", &self.title),
            ("URL", &self.url),
            ("NOTE", &self.note),
        ];
        for (name, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                lines.push(format!("{}:{}", name, escape(v)));
            }
        }
        lines.push(END_MARKER.to_string());
        let mut out = lines.join("\r\n");
        out.push_str("\r\n");
        out
    }

    /// Reads the fields `to_vcf` writes. Unknown properties are ignored.
    pub fn parse(text: &str) -> Result<Self, VCardError> {
        let lines = unfold(text);
        let mut iter = lines.iter().map(|l| l.trim_end()).filter(|l| !l.is_empty());
        match iter.next() {
            Some(first) if first.eq_ignore_ascii_case("BEGIN:VCARD") => {}
            _ => return Err(VCardError::MissingBegin),
        }

        let mut card = VCard::default();
        let mut name_from_n = None;
        let mut ended = false;
        for line in iter {
            if line.eq_ignore_ascii_case(END_MARKER) {
                ended = true;
                break;
            }
            let Some((head, value)) = line.split_once(':') else {
                return Err(VCardError::Malformed(line.to_string()));
            };
            let name = head.split(';').next().unwrap_or(head).to_ascii_uppercase();
            let value = unescape(value);
            match name.as_str() {
                "FN" => card.display_name = value,
                "N" => name_from_n = Some(value.replace(';', " ").trim().to_string()),
                "TEL" => card.phone = Some(value),
                "EMAIL" => card.email = Some(value),
                "ORG" => card.organization = Some(value),
                "TITLE" => card.title = Some(value),
                "URL" => card.url = Some(value),
                "NOTE" => card.note = Some(value),
                _ => {}
            }
        }
        if !ended {
            return Err(VCardError::MissingEnd);
        }
        if card.display_name.is_empty() {
            card.display_name = name_from_n.unwrap_or_default();
        }
        Ok(card)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VCardError {
    #[error("vCard does not start with BEGIN:VCARD")]
    MissingBegin,
    #[error("vCard is not terminated by END:VCARD")]
    MissingEnd,
    #[error("malformed vCard line: {0}")]
    Malformed(String),
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Joins folded lines (continuations start with a space or tab).
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}
