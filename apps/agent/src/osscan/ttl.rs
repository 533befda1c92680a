// [apps/agent/src/osscan/ttl.rs]
/*!
 * APARATO: TTL ENGINE
 * RESPONSABILIDAD: CLASIFICACIÓN GRUESA DE SO A PARTIR DEL TTL DE UN ECHO
 *
 * Un ICMP Echo crudo exige CAP_NET_RAW igual que el motor de pila; en vez
 * de duplicar ese requisito para una sola sonda, este motor invoca el
 * `ping` del sistema (siempre disponible, siempre sin privilegios) y
 * extrae el TTL de su salida. Corre en todos los modos, incluido `fast`.
 */

use neoscan_domain::{OsInfo, OsInfoSource};
use tokio::process::Command;
use tokio::time::Duration;

pub async fn probe(host: &str, timeout: Duration) -> Option<OsInfo> {
    let wait_secs = timeout.as_secs().max(1).to_string();
    let output = Command::new("ping")
        .args(["-c", "1", "-W", &wait_secs, host])
        .output()
        .await
        .ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let ttl = extract_ttl(&stdout)?;
    Some(classify(ttl))
}

fn extract_ttl(output: &str) -> Option<u8> {
    output.split_whitespace().find_map(|token| {
        let token = token.trim_end_matches(',');
        token.strip_prefix("ttl=").or_else(|| token.strip_prefix("TTL=")).and_then(|v| v.parse().ok())
    })
}

fn classify(ttl: u8) -> OsInfo {
    let (name, family, accuracy) = match ttl {
        0..=32 => ("Unknown/Embedded", "Embedded", 50),
        33..=64 => ("Linux/Unix", "Linux", 80),
        65..=128 => ("Windows", "Windows", 80),
        129..=255 => ("Solaris/Network device", "Solaris", 80),
    };

    OsInfo {
        name: name.to_string(),
        family: family.to_string(),
        version: None,
        accuracy,
        fingerprint: None,
        source: OsInfoSource::Ttl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ttl_from_standard_ping_output() {
        let output = "64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=10.2 ms";
        assert_eq!(extract_ttl(output), Some(57));
    }

    #[test]
    fn classifies_each_ttl_band() {
        assert_eq!(classify(20).family, "Embedded");
        assert_eq!(classify(50).family, "Linux");
        assert_eq!(classify(100).family, "Windows");
        assert_eq!(classify(200).family, "Solaris");
    }

    #[test]
    fn missing_ttl_token_returns_none() {
        assert_eq!(extract_ttl("Request timeout for icmp_seq 0"), None);
    }
}
