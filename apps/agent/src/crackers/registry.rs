// [apps/agent/src/crackers/registry.rs]
//! Catálogo estático de los 14 adapters: resuelve por nombre de
//! protocolo y enumera el conjunto completo para el Dictionary Manager
//! y el Brute Scanner.

use super::clickhouse::ClickhouseCracker;
use super::elasticsearch::ElasticsearchCracker;
use super::ftp::FtpCracker;
use super::mongodb::MongodbCracker;
use super::mssql::MssqlCracker;
use super::mysql::MysqlCracker;
use super::oracle::OracleCracker;
use super::postgres::PostgresCracker;
use super::rdp::RdpCracker;
use super::redis::RedisCracker;
use super::smb::SmbCracker;
use super::snmp::SnmpCracker;
use super::ssh::SshCracker;
use super::telnet::TelnetCracker;
use super::Cracker;
use once_cell::sync::Lazy;
use std::sync::Arc;

static REGISTRY: Lazy<Vec<Arc<dyn Cracker>>> = Lazy::new(|| {
    vec![
        Arc::new(SshCracker),
        Arc::new(RdpCracker),
        Arc::new(SmbCracker),
        Arc::new(TelnetCracker),
        Arc::new(FtpCracker),
        Arc::new(SnmpCracker),
        Arc::new(MysqlCracker),
        Arc::new(PostgresCracker),
        Arc::new(MssqlCracker),
        Arc::new(OracleCracker),
        Arc::new(MongodbCracker),
        Arc::new(RedisCracker),
        Arc::new(ClickhouseCracker),
        Arc::new(ElasticsearchCracker),
    ]
});

/// Busca un cracker por nombre de protocolo (case-insensitive).
pub fn lookup(protocol: &str) -> Option<Arc<dyn Cracker>> {
    REGISTRY
        .iter()
        .find(|cracker| cracker.name().eq_ignore_ascii_case(protocol))
        .cloned()
}

/// Enumera todos los protocolos soportados.
pub fn all() -> &'static [Arc<dyn Cracker>] {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup("SSH").is_some());
        assert!(lookup("ssh").is_some());
    }

    #[test]
    fn lookup_unknown_protocol_returns_none() {
        assert!(lookup("gopher").is_none());
    }

    #[test]
    fn all_returns_fourteen_adapters() {
        assert_eq!(all().len(), 14);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = all().iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 14);
    }
}
