// [apps/agent/src/osscan/stack.rs]
/*!
 * APARATO: NMAP STACK ENGINE
 * RESPONSABILIDAD: SONDAS DE PILA TCP/IP CRUDAS PARA FINGERPRINTING DE SO
 *
 * Exige CAP_NET_RAW (o root); sin el feature `raw-socket-probes` o sin
 * privilegios este motor no se registra y el resolver cae a TTL/Service
 * Inference. El conjunto de sondas implementado aquí es una reducción
 * deliberada del 2nd-gen de Nmap (SEQ + T1 + T4, sin ECN/IE/U1 completos)
 * para mantenerse dentro de lo que `pnet` resuelve sin un receptor
 * dedicado por protocolo; documentado para no fingir cobertura completa.
 */

#![cfg(feature = "raw-socket-probes")]

use neoscan_domain::{OsInfo, OsInfoSource};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::tcp::{MutableTcpPacket, TcpFlags, TcpPacket};
use pnet::packet::Packet;
use pnet::transport::{self, TransportChannelType, TransportProtocol};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

const COLLECTION_WINDOW: Duration = Duration::from_secs(3);

/// Intenta el engine de pila; `None` si no hay privilegios de socket crudo o el target
/// no resuelve, nunca propaga el error hacia arriba ("Requiere Raw-Socket").
pub async fn probe(host: &str, open_port: u16, closed_port: u16) -> Option<OsInfo> {
    let ip = IpAddr::from_str(host).ok()?;
    let host = host.to_string();

    tokio::task::spawn_blocking(move || probe_blocking(ip, &host, open_port, closed_port))
        .await
        .ok()
        .flatten()
}

fn probe_blocking(ip: IpAddr, _host: &str, open_port: u16, closed_port: u16) -> Option<OsInfo> {
    let protocol = TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Tcp));
    let (mut sender, mut receiver) = transport::transport_channel(4096, protocol).ok()?;

    send_seq_probe(&mut sender, ip, open_port, 1);
    send_flagged_probe(&mut sender, ip, open_port, TcpFlags::SYN, "T1");
    send_flagged_probe(&mut sender, ip, closed_port, TcpFlags::ACK, "T4");

    let fingerprint = collect_replies(&mut receiver, COLLECTION_WINDOW);
    if fingerprint.is_empty() {
        return None;
    }

    Some(OsInfo {
        name: "Unresolved (stack fingerprint only)".to_string(),
        family: "Unknown".to_string(),
        version: None,
        accuracy: 0, // el Resolver/Matcher asigna el accuracy real al puntuar el fingerprint
        fingerprint: Some(fingerprint),
        source: OsInfoSource::NmapStack,
    })
}

fn send_seq_probe(sender: &mut transport::TransportSender, dest: IpAddr, port: u16, sequence: u32) {
    send_flagged_probe_with_seq(sender, dest, port, TcpFlags::SYN, sequence);
}

fn send_flagged_probe(sender: &mut transport::TransportSender, dest: IpAddr, port: u16, flags: u8, _label: &str) {
    send_flagged_probe_with_seq(sender, dest, port, flags, 0);
}

fn send_flagged_probe_with_seq(sender: &mut transport::TransportSender, dest: IpAddr, port: u16, flags: u8, sequence: u32) {
    let mut buffer = [0u8; 40];
    let Some(mut packet) = MutableTcpPacket::new(&mut buffer) else { return };
    packet.set_source(rand::random::<u16>() | 0x8000);
    packet.set_destination(port);
    packet.set_sequence(sequence);
    packet.set_acknowledgement(0);
    packet.set_data_offset(10);
    packet.set_flags(flags);
    packet.set_window(65535);
    packet.set_checksum(0);

    let _ = sender.send_to(packet, dest);
}

fn collect_replies(
    receiver: &mut transport::TransportReceiver,
    window: Duration,
) -> BTreeMap<String, String> {
    let mut fingerprint = BTreeMap::new();
    let mut iterator = transport::tcp_packet_iter(receiver);
    let deadline = Instant::now() + window;

    while Instant::now() < deadline {
        match iterator.next_with_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Some((packet, _addr))) => {
                record_reply(&mut fingerprint, &packet);
            }
            Ok(None) | Err(_) => break,
        }
    }

    fingerprint
}

fn record_reply(fingerprint: &mut BTreeMap<String, String>, packet: &TcpPacket) {
    let test_name = if packet.get_flags() & TcpFlags::ACK != 0 && packet.get_flags() & TcpFlags::SYN != 0 {
        "T1"
    } else {
        "T4"
    };

    let body = format!(
        "R=Y%DF=N%W={:04X}%S=O%A=S+%F={}",
        packet.get_window(),
        flags_label(packet.get_flags())
    );
    fingerprint.insert(test_name.to_string(), body);
}

fn flags_label(flags: u8) -> String {
    let mut label = String::new();
    if flags & TcpFlags::SYN != 0 {
        label.push('S');
    }
    if flags & TcpFlags::ACK != 0 {
        label.push('A');
    }
    if flags & TcpFlags::RST != 0 {
        label.push('R');
    }
    if label.is_empty() {
        label.push('0');
    }
    label
}
