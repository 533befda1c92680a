// [apps/agent/src/crackers/snmp.rs]
//! SNMPv2c over UDP: un `GetRequest` sobre `sysDescr.0` con la comunidad
//! como credencial. Codificación BER manual y mínima (los campos de este
//! PDU son fijos, no hace falta una librería ASN.1 completa).

use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;
use tokio::net::UdpSocket;

pub struct SnmpCracker;

const SYS_DESCR_OID: &[u8] = &[0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00];

fn ber_tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag, value.len() as u8];
    out.extend_from_slice(value);
    out
}

fn get_request(community: &str) -> Vec<u8> {
    let oid = ber_tlv(0x06, SYS_DESCR_OID);
    let null_value = ber_tlv(0x05, &[]);
    let varbind = ber_tlv(0x30, &[oid, null_value].concat());
    let varbind_list = ber_tlv(0x30, &varbind);

    let request_id = ber_tlv(0x02, &[0x01]);
    let error_status = ber_tlv(0x02, &[0x00]);
    let error_index = ber_tlv(0x02, &[0x00]);
    let pdu_body = [request_id, error_status, error_index, varbind_list].concat();
    let pdu = ber_tlv(0xa0, &pdu_body); // GetRequest-PDU

    let version = ber_tlv(0x02, &[0x01]); // SNMPv2c
    let community_field = ber_tlv(0x04, community.as_bytes());
    let message_body = [version, community_field, pdu].concat();
    ber_tlv(0x30, &message_body)
}

#[async_trait]
impl Cracker for SnmpCracker {
    fn name(&self) -> &'static str {
        "snmp"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::OnlyPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return CheckOutcome::ConnectionFailed;
        }

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(_) => return CheckOutcome::ConnectionFailed,
        };
        if socket.connect((host, port)).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let request = get_request(&auth.password);
        if socket.send(&request).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let mut buf = [0u8; 512];
        let received = tokio::time::timeout(remaining, socket.recv(&mut buf)).await;

        match received {
            Ok(Ok(n)) if n > 0 => {
                // GetResponse-PDU tag 0xa2 somewhere in the reply implies the agent
                // accepted the community and answered — silence/ICMP-unreachable
                // is the far more common rejection path for SNMP and surfaces as a timeout.
                if buf[..n].contains(&0xa2) {
                    CheckOutcome::Success
                } else {
                    CheckOutcome::ProtocolError
                }
            }
            Ok(Ok(_)) | Ok(Err(_)) => CheckOutcome::ConnectionFailed,
            Err(_) => CheckOutcome::AuthFailed,
        }
    }
}
