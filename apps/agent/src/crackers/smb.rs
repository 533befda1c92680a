// [apps/agent/src/crackers/smb.rs]
//! SMB: negocia SMB1 (`0xff 'SMB'`) vía `Negotiate Protocol` y, cuando el
//! servidor responde con `Security Mode` en texto plano (bit
//! `NEGOTIATE_USER_SECURITY` sin `NEGOTIATE_ENCRYPT_PASSWORDS`), completa
//! un `Session Setup AndX` con usuario/contraseña sin hash — el único
//! camino de credencial sin criptografía que SMB legacy ofrece. Los
//! dialectos modernos (SMB2/3) exigen NTLMv2/Kerberos y se reportan como
//! `ProtocolError`.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct SmbCracker;

const NEGOTIATE_USER_SECURITY: u8 = 0x01;
const NEGOTIATE_ENCRYPT_PASSWORDS: u8 = 0x02;

fn smb_header(command: u8, pid: u16, mid: u16) -> Vec<u8> {
    let mut header = vec![0xffu8, b'S', b'M', b'B', command];
    header.extend_from_slice(&[0u8; 4]); // NT_STATUS
    header.push(0x08); // flags
    header.extend_from_slice(&[0x01, 0x00]); // flags2: long names
    header.extend_from_slice(&[0u8; 12]); // PID high / signature / reserved
    header.extend_from_slice(&[0u8, 0u8]); // TID
    header.extend_from_slice(&pid.to_le_bytes());
    header.extend_from_slice(&[0u8, 0u8]); // UID
    header.extend_from_slice(&mid.to_le_bytes());
    header
}

fn negotiate_protocol_request() -> Vec<u8> {
    let mut body = vec![0u8]; // word count
    let dialect = b"\x02NT LM 0.12\x00";
    body.extend_from_slice(&(dialect.len() as u16).to_le_bytes());
    body.extend_from_slice(dialect);

    let mut message = smb_header(0x72, 0, 0);
    message.extend_from_slice(&body);
    frame(message)
}

fn session_setup_request(username: &str, password: &str) -> Vec<u8> {
    let mut params = vec![13u8]; // word count
    params.extend_from_slice(&[0xffu8, 0x00]); // AndXCommand: none
    params.extend_from_slice(&[0u8, 0u8]); // AndXOffset
    params.extend_from_slice(&4096u16.to_le_bytes()); // max buffer
    params.extend_from_slice(&2u16.to_le_bytes()); // max mpx count
    params.extend_from_slice(&0u16.to_le_bytes()); // VC number
    params.extend_from_slice(&0u32.to_le_bytes()); // session key
    params.extend_from_slice(&((password.len() + 1) as u16).to_le_bytes()); // ANSI password length
    params.extend_from_slice(&0u16.to_le_bytes()); // Unicode password length
    params.extend_from_slice(&[0u8; 4]); // reserved
    params.extend_from_slice(&0u32.to_le_bytes()); // capabilities

    let mut data = Vec::new();
    data.extend_from_slice(password.as_bytes());
    data.push(0);
    data.extend_from_slice(username.as_bytes());
    data.push(0);
    data.extend_from_slice(b"neoscan\x00"); // primary domain
    data.extend_from_slice(b"neoscan-agent\x00"); // native OS

    let mut body = params;
    body.extend_from_slice(&(data.len() as u16).to_le_bytes());
    body.extend_from_slice(&data);

    let mut message = smb_header(0x73, 1, 1);
    message.extend_from_slice(&body);
    frame(message)
}

fn frame(message: Vec<u8>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(message.len() + 4);
    packet.push(0x00); // session message
    packet.extend_from_slice(&((message.len() as u32) & 0x00ff_ffff).to_be_bytes()[1..]);
    packet.extend_from_slice(&message);
    packet
}

#[async_trait]
impl Cracker for SmbCracker {
    fn name(&self) -> &'static str {
        "smb"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        if write_all(&mut stream, &negotiate_protocol_request(), deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }
        let negotiate_reply = match read_some(&mut stream, 512, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if negotiate_reply.len() < 40 || negotiate_reply[4] != 0xff || &negotiate_reply[5..8] != b"SMB" {
            return CheckOutcome::ProtocolError;
        }

        let security_mode = negotiate_reply[39];
        let plaintext_allowed = security_mode & NEGOTIATE_ENCRYPT_PASSWORDS == 0;
        let _user_security = security_mode & NEGOTIATE_USER_SECURITY != 0;
        if !plaintext_allowed {
            return CheckOutcome::ProtocolError;
        }

        if write_all(&mut stream, &session_setup_request(&auth.username, &auth.password), deadline)
            .await
            .is_err()
        {
            return CheckOutcome::ConnectionFailed;
        }
        let setup_reply = match read_some(&mut stream, 512, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if setup_reply.len() < 9 {
            return CheckOutcome::ProtocolError;
        }

        let nt_status = u32::from_le_bytes([setup_reply[5], setup_reply[6], setup_reply[7], setup_reply[8]]);
        match nt_status {
            0x0000_0000 => CheckOutcome::Success,
            0xc000_006d | 0xc000_0064 | 0xc000_0072 => CheckOutcome::AuthFailed, // LOGON_FAILURE / NO_SUCH_USER / ACCOUNT_DISABLED
            _ => CheckOutcome::ProtocolError,
        }
    }
}
