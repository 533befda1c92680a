// [apps/agent/src/portscan/version_dsl.rs]
/*!
 * APARATO: VERSION-INFO DSL
 * RESPONSABILIDAD: PARSEO DE LOS CAMPOS p/v/i/h/o/d/cpe: DE UNA LÍNEA DE MATCH
 *
 * El delimitador de cada campo es el carácter que sigue inmediatamente
 * a la letra del campo; un campo sin cierre detiene el parseo sin error,
 * dejando los campos ya leídos intactos.
 */

use regex::Regex;

/// Plantilla de versión sin resolver: puede contener referencias `$1`..`$9`
/// a grupos de captura del regex de match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfoTemplate {
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub cpe: Option<String>,
}

/// Plantilla ya resuelta contra las capturas de un match concreto.
#[derive(Debug, Clone, Default)]
pub struct ResolvedVersionInfo {
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub cpe: Option<String>,
}

/// Parsea la porción de version-info de una línea de match. No falla: un
/// campo sin delimitador de cierre simplemente detiene el parseo ahí.
pub fn parse(input: &str) -> VersionInfoTemplate {
    let mut template = VersionInfoTemplate::default();
    let mut rest = input.trim_start();

    loop {
        let (field_key, after_key) = match next_field_key(rest) {
            Some(parsed) => parsed,
            None => break,
        };

        let Some(delimiter) = after_key.chars().next() else { break };
        let body_start = &after_key[delimiter.len_utf8()..];
        let Some(end) = find_unescaped(body_start, delimiter) else {
            break;
        };

        let value = body_start[..end].to_string();
        match field_key {
            "p" => template.product = Some(value),
            "v" => template.version = Some(value),
            "i" => template.info = Some(value),
            "h" => template.hostname = Some(value),
            "o" => template.os = Some(value),
            "d" => template.device_type = Some(value),
            "cpe:" => template.cpe = Some(value),
            _ => break,
        }

        rest = body_start[end + delimiter.len_utf8()..].trim_start();
    }

    template
}

fn next_field_key(s: &str) -> Option<(&'static str, &str)> {
    if let Some(after) = s.strip_prefix("cpe:") {
        return Some(("cpe:", after));
    }
    let mut chars = s.chars();
    let first = chars.next()?;
    let key: &'static str = match first {
        'p' => "p",
        'v' => "v",
        'i' => "i",
        'h' => "h",
        'o' => "o",
        'd' => "d",
        _ => return None,
    };
    Some((key, chars.as_str()))
}

fn find_unescaped(s: &str, delimiter: char) -> Option<usize> {
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if c == delimiter {
            return Some(i);
        }
    }
    None
}

/// Sustituye `$1..$9` en la plantilla por las capturas de `regex` contra `response`.
pub fn resolve(template: &VersionInfoTemplate, regex: &Regex, response: &[u8]) -> ResolvedVersionInfo {
    let text = String::from_utf8_lossy(response);
    let captures = regex.captures(&text);

    let substitute = |raw: &Option<String>| -> Option<String> {
        let raw = raw.as_ref()?;
        Some(match &captures {
            Some(caps) => substitute_captures(raw, caps),
            None => raw.clone(),
        })
    };

    ResolvedVersionInfo {
        product: substitute(&template.product),
        version: substitute(&template.version),
        info: substitute(&template.info),
        hostname: substitute(&template.hostname),
        os: substitute(&template.os),
        device_type: substitute(&template.device_type),
        cpe: substitute(&template.cpe),
    }
}

fn substitute_captures(template: &str, captures: &regex::Captures) -> String {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(&digit) = chars.peek() {
                if digit.is_ascii_digit() {
                    chars.next();
                    let index: usize = digit.to_digit(10).unwrap() as usize;
                    if let Some(group) = captures.get(index) {
                        output.push_str(group.as_str());
                    }
                    continue;
                }
            }
        }
        output.push(c);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_field_kinds() {
        let template = parse("p/OpenSSH/ v/$1/ i/protocol 2.0/ o/Linux/ cpe:/a:openbsd:openssh:$1/");
        assert_eq!(template.product.as_deref(), Some("OpenSSH"));
        assert_eq!(template.version.as_deref(), Some("$1"));
        assert_eq!(template.info.as_deref(), Some("protocol 2.0"));
        assert_eq!(template.os.as_deref(), Some("Linux"));
        assert_eq!(template.cpe.as_deref(), Some("a:openbsd:openssh:$1"));
    }

    #[test]
    fn unterminated_field_stops_without_error() {
        let template = parse("p/OpenSSH/ v/unterminated");
        assert_eq!(template.product.as_deref(), Some("OpenSSH"));
        assert_eq!(template.version, None);
    }

    #[test]
    fn delimiter_can_be_any_character() {
        let template = parse("p|OpenSSH| v,1.2,");
        assert_eq!(template.product.as_deref(), Some("OpenSSH"));
        assert_eq!(template.version.as_deref(), Some("1.2"));
    }

    #[test]
    fn resolves_capture_group_references() {
        let regex = Regex::new(r"^SSH-2\.0-OpenSSH_(\S+)").unwrap();
        let template = parse("p/OpenSSH/ v/$1/");
        let resolved = resolve(&template, &regex, b"SSH-2.0-OpenSSH_8.9p1 Ubuntu");
        assert_eq!(resolved.product.as_deref(), Some("OpenSSH"));
        assert_eq!(resolved.version.as_deref(), Some("8.9p1"));
    }
}
