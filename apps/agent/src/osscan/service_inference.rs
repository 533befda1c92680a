// [apps/agent/src/osscan/service_inference.rs]
/*!
 * APARATO: SERVICE INFERENCE ENGINE
 * RESPONSABILIDAD: ADIVINAR EL SO A PARTIR DE BANNERS YA CAPTURADOS
 *
 * Sólo corre cuando el Port/Service Scanner ya dejó un banner en
 * caché para el target; no abre conexiones propias.
 */

use neoscan_domain::{OsInfo, OsInfoSource};

const KEYWORD_TABLE: &[(&str, &str, &str)] = &[
    ("ubuntu", "Linux", "Linux"),
    ("debian", "Linux", "Linux"),
    ("centos", "Linux", "Linux"),
    ("red hat", "Linux", "Linux"),
    ("fedora", "Linux", "Linux"),
    ("win32", "Windows", "Windows"),
    ("windows", "Windows", "Windows"),
    ("freebsd", "FreeBSD", "BSD"),
    ("darwin", "macOS", "Darwin"),
];

/// Infiere a partir de los banners ya observados para el host (cualquier puerto).
pub fn infer(banners: &[String]) -> Option<OsInfo> {
    let haystack = banners.join(" ").to_lowercase();

    KEYWORD_TABLE.iter().find_map(|(keyword, name, family)| {
        haystack.contains(keyword).then(|| OsInfo {
            name: name.to_string(),
            family: family.to_string(),
            version: None,
            accuracy: 60,
            fingerprint: None,
            source: OsInfoSource::ServiceInference,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_linux_from_ssh_banner_distro_tag() {
        let banners = vec!["SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.6".to_string()];
        let info = infer(&banners).unwrap();
        assert_eq!(info.family, "Linux");
    }

    #[test]
    fn infers_windows_from_http_server_header() {
        let banners = vec!["Server: Microsoft-IIS/10.0 Windows".to_string()];
        let info = infer(&banners).unwrap();
        assert_eq!(info.family, "Windows");
    }

    #[test]
    fn no_keyword_match_returns_none() {
        let banners = vec!["220 generic ftp ready".to_string()];
        assert!(infer(&banners).is_none());
    }
}
