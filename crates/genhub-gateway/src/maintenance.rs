//! One-shot maintenance commands run against the store instead of the server.
//!
//! ```text
//! genhub-gateway --create-identity <id> [--admin] [--activated]
//! genhub-gateway --add-serial <serial>
//! genhub-gateway --issue-session <identity-id>
//! genhub-gateway --set-feature <TIER> <capability> <on|off>
//! ```

use genhub_core::{Backend, ClaimToken, Identity, SledBackend, Tier};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateIdentity {
        id: String,
        admin: bool,
        activated: bool,
    },
    AddSerial(String),
    IssueSession(String),
    SetFeature {
        tier: Tier,
        capability: String,
        enabled: bool,
    },
}

impl Command {
    /// `Ok(None)` when no command was given and the server should start.
    pub fn parse(args: &[String]) -> Result<Option<Self>, BoxError> {
        let Some((flag, rest)) = args.split_first() else {
            return Ok(None);
        };
        let command = match flag.as_str() {
            "--create-identity" => {
                let (id, flags) = rest
                    .split_first()
                    .ok_or("usage: --create-identity <id> [--admin] [--activated]")?;
                let mut admin = false;
                let mut activated = false;
                for flag in flags {
                    match flag.as_str() {
                        "--admin" => admin = true,
                        "--activated" => activated = true,
                        other => {
                            return Err(format!("unknown flag for --create-identity: {}", other).into())
                        }
                    }
                }
                Command::CreateIdentity {
                    id: non_blank(id, "identity id")?,
                    admin,
                    activated,
                }
            }
            "--add-serial" => match rest {
                [serial] => Command::AddSerial(non_blank(serial, "serial")?),
                _ => return Err("usage: --add-serial <serial>".into()),
            },
            "--issue-session" => match rest {
                [id] => Command::IssueSession(non_blank(id, "identity id")?),
                _ => return Err("usage: --issue-session <identity-id>".into()),
            },
            "--set-feature" => {
                let usage = "usage: --set-feature <TIER> <capability> <on|off>";
                let [tier, capability, state] = rest else {
                    return Err(usage.into());
                };
                let enabled = match state.as_str() {
                    "on" | "true" => true,
                    "off" | "false" => false,
                    _ => return Err(usage.into()),
                };
                Command::SetFeature {
                    tier: tier.parse()?,
                    capability: non_blank(capability, "capability")?,
                    enabled,
                }
            }
            other => return Err(format!("unknown argument: {}", other).into()),
        };
        Ok(Some(command))
    }

    /// Applies the command and returns the line to print.
    pub fn run(&self, store: &SledBackend) -> Result<String, BoxError> {
        match self {
            Command::CreateIdentity {
                id,
                admin,
                activated,
            } => {
                if store.identity(id)?.is_some() {
                    return Err(format!("identity {} already exists", id).into());
                }
                let mut identity = Identity::new(id.as_str());
                identity.is_admin = *admin;
                identity.activated = *activated;
                store.put_identity(&identity)?;
                tracing::info!(identity = %id, admin, activated, "identity created");
                Ok(format!("created {}", id))
            }
            Command::AddSerial(serial) => {
                if store.token(serial)?.is_some() {
                    return Err(format!("serial {} already exists", serial).into());
                }
                store.put_token(&ClaimToken::unclaimed(serial.as_str()))?;
                tracing::info!(serial = %serial, "serial registered");
                Ok(format!("added {}", serial))
            }
            Command::IssueSession(id) => {
                if store.identity(id)?.is_none() {
                    return Err(format!("identity {} does not exist", id).into());
                }
                Ok(store.issue_session(id)?)
            }
            Command::SetFeature {
                tier,
                capability,
                enabled,
            } => {
                let mut table = store.feature_overrides()?;
                table.set(*tier, capability.as_str(), *enabled);
                store.put_feature_overrides(&table)?;
                Ok(format!("{} {} = {}", tier, capability, enabled))
            }
        }
    }
}

fn non_blank(value: &str, what: &str) -> Result<String, BoxError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} may not be blank", what).into());
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use genhub_core::{ClaimOutcome, IdentityProvider};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn store() -> (tempfile::TempDir, SledBackend) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledBackend::open(Some(dir.path())).unwrap();
        (dir, store)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(&[]).unwrap(), None);
        assert_eq!(
            Command::parse(&args(&["--create-identity", "a1", "--admin", "--activated"])).unwrap(),
            Some(Command::CreateIdentity {
                id: "a1".into(),
                admin: true,
                activated: true,
            })
        );
        assert_eq!(
            Command::parse(&args(&["--add-serial", "GT-1"])).unwrap(),
            Some(Command::AddSerial("GT-1".into()))
        );
        assert_eq!(
            Command::parse(&args(&["--set-feature", "premium", "sso", "on"])).unwrap(),
            Some(Command::SetFeature {
                tier: Tier::Premium,
                capability: "sso".into(),
                enabled: true,
            })
        );
        assert!(Command::parse(&args(&["--create-identity"])).is_err());
        assert!(Command::parse(&args(&["--create-identity", "a1", "--root"])).is_err());
        assert!(Command::parse(&args(&["--add-serial"])).is_err());
        assert!(Command::parse(&args(&["--set-feature", "GOLD", "sso", "on"])).is_err());
        assert!(Command::parse(&args(&["--serve"])).is_err());
    }

    #[test]
    fn fresh_store_can_be_bootstrapped() {
        let (_dir, store) = store();
        Command::parse(&args(&["--create-identity", "admin", "--admin", "--activated"]))
            .unwrap()
            .unwrap()
            .run(&store)
            .unwrap();
        Command::AddSerial("GT-1".into()).run(&store).unwrap();

        let admin = store.identity("admin").unwrap().unwrap();
        assert!(admin.is_admin && admin.activated);
        let token = Command::IssueSession("admin".into()).run(&store).unwrap();
        assert_eq!(store.authenticate(&token).unwrap().unwrap().id, "admin");
        assert!(matches!(
            store.claim_serial("GT-1", "admin", chrono::Utc::now()).unwrap(),
            ClaimOutcome::Claimed(_)
        ));
    }

    #[test]
    fn duplicates_and_unknown_identities_are_rejected() {
        let (_dir, store) = store();
        let create = Command::CreateIdentity {
            id: "u1".into(),
            admin: false,
            activated: false,
        };
        create.run(&store).unwrap();
        assert!(create.run(&store).is_err());
        assert!(!store.identity("u1").unwrap().unwrap().is_admin);

        Command::AddSerial("GT-1".into()).run(&store).unwrap();
        store.claim_serial("GT-1", "u1", chrono::Utc::now()).unwrap();
        assert!(Command::AddSerial("GT-1".into()).run(&store).is_err());
        assert!(store.token("GT-1").unwrap().unwrap().claimed);

        assert!(Command::IssueSession("ghost".into()).run(&store).is_err());
    }

    #[test]
    fn set_feature_persists_override() {
        let (_dir, store) = store();
        Command::SetFeature {
            tier: Tier::Free,
            capability: "ai_bio".into(),
            enabled: true,
        }
        .run(&store)
        .unwrap();
        assert_eq!(store.feature_overrides().unwrap().get(Tier::Free, "ai_bio"), Some(true));
    }
}
