// [apps/agent/src/dictionary.rs]
/*!
 * APARATO: DICTIONARY MANAGER
 * CLASIFICACIÓN: GENERADOR PURO
 * RESPONSABILIDAD: EXPANSIÓN CARTESIANA ORDENADA DE CANDIDATOS DE CREDENCIAL
 *
 * Sin E/S, sin estado oculto: dada la misma entrada produce siempre la
 * misma lista, en el mismo orden.
 */

use neoscan_domain::AuthMode;

const BUILTIN_USERS: &[&str] = &["admin", "root", "administrator", "user", "guest", "test"];
const BUILTIN_PASSWORDS: &[&str] = &[
    "admin", "password", "123456", "root", "toor", "changeme", "letmein", "guest", "",
];

/// Cómo se deben expandir los overrides provistos por el Task.
#[derive(Debug, Clone, Default)]
pub struct DictionaryOverrides {
    pub users: Option<Vec<String>>,
    pub passwords: Option<Vec<String>>,
}

impl DictionaryOverrides {
    /// Acepta tanto una lista ya partida como una cadena separada por comas.
    pub fn from_csv(users_csv: Option<&str>, passwords_csv: Option<&str>) -> Self {
        Self {
            users: users_csv.map(split_csv),
            passwords: passwords_csv.map(split_csv),
        }
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Un único intento de credencial a probar contra el target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub username: String,
    pub password: String,
}

/// Expansión Cartesiana ordenada usuario×contraseña según el `AuthMode` del adapter.
pub fn expand(mode: AuthMode, overrides: &DictionaryOverrides) -> Vec<Candidate> {
    match mode {
        AuthMode::None => vec![Candidate { username: String::new(), password: String::new() }],
        AuthMode::OnlyPass => {
            let passwords = overrides.passwords.clone().unwrap_or_else(|| owned(BUILTIN_PASSWORDS));
            passwords
                .into_iter()
                .map(|password| Candidate { username: "admin".to_string(), password })
                .collect()
        }
        AuthMode::UserPass => {
            let users = overrides.users.clone().unwrap_or_else(|| owned(BUILTIN_USERS));
            let passwords = overrides.passwords.clone().unwrap_or_else(|| owned(BUILTIN_PASSWORDS));
            let mut candidates = Vec::with_capacity(users.len() * passwords.len());
            for username in &users {
                for password in &passwords {
                    candidates.push(Candidate {
                        username: username.clone(),
                        password: template(password, username),
                    });
                }
            }
            candidates
        }
    }
}

fn template(password: &str, username: &str) -> String {
    password.replace("%user%", username)
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_mode_produces_single_empty_attempt() {
        let candidates = expand(AuthMode::None, &DictionaryOverrides::default());
        assert_eq!(candidates, vec![Candidate { username: String::new(), password: String::new() }]);
    }

    #[test]
    fn only_pass_mode_uses_deterministic_username() {
        let overrides = DictionaryOverrides { users: None, passwords: Some(vec!["public".into()]) };
        let candidates = expand(AuthMode::OnlyPass, &overrides);
        assert_eq!(candidates, vec![Candidate { username: "admin".into(), password: "public".into() }]);
    }

    #[test]
    fn user_pass_mode_is_ordered_cartesian_product() {
        let overrides = DictionaryOverrides {
            users: Some(vec!["alice".into(), "bob".into()]),
            passwords: Some(vec!["p1".into(), "p2".into()]),
        };
        let candidates = expand(AuthMode::UserPass, &overrides);
        assert_eq!(
            candidates,
            vec![
                Candidate { username: "alice".into(), password: "p1".into() },
                Candidate { username: "alice".into(), password: "p2".into() },
                Candidate { username: "bob".into(), password: "p1".into() },
                Candidate { username: "bob".into(), password: "p2".into() },
            ]
        );
    }

    #[test]
    fn percent_user_template_substitutes_attempted_username() {
        let overrides = DictionaryOverrides {
            users: Some(vec!["svc".into()]),
            passwords: Some(vec!["%user%123".into()]),
        };
        let candidates = expand(AuthMode::UserPass, &overrides);
        assert_eq!(candidates, vec![Candidate { username: "svc".into(), password: "svc123".into() }]);
    }

    #[test]
    fn csv_overrides_split_and_trim() {
        let overrides = DictionaryOverrides::from_csv(Some("alice, bob ,,charlie"), None);
        assert_eq!(overrides.users, Some(vec!["alice".to_string(), "bob".to_string(), "charlie".to_string()]));
    }

    #[test]
    fn generator_is_pure_same_input_same_output() {
        let overrides = DictionaryOverrides::default();
        assert_eq!(expand(AuthMode::UserPass, &overrides), expand(AuthMode::UserPass, &overrides));
    }
}
